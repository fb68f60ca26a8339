//! URI search compilation. URI matching is always case-sensitive.
//!
//! A value ending in `/` without a modifier searches `:below`. URNs cannot be
//! combined with a modifier.

use fhirqb_core::{Result, ValidationError};

use crate::parameters::SearchModifier;
use crate::predicate::{PatternKind, Predicate};
use crate::sanitize::sanitize_string;

/// The modifier actually applied to `value`, after implicit `:below` inference.
pub fn effective_modifier<'a>(
    name: &str,
    value: &str,
    modifier: Option<&'a SearchModifier>,
) -> Result<Option<&'a SearchModifier>> {
    if value.starts_with("urn") && modifier.is_some() {
        return Err(ValidationError::ModifierConflict {
            field: name.to_string(),
        });
    }
    if modifier.is_none() && value.ends_with('/') {
        return Ok(Some(&SearchModifier::Below));
    }
    Ok(modifier)
}

pub fn compile(
    name: &str,
    field: &str,
    raw: &str,
    modifier: Option<&SearchModifier>,
) -> Result<Predicate> {
    let value = sanitize_string(raw);
    let predicate = match effective_modifier(name, &value, modifier)? {
        Some(SearchModifier::Above) => Predicate::pattern(field, PatternKind::EndsWith, value, true),
        Some(SearchModifier::Below) => {
            Predicate::pattern(field, PatternKind::StartsWith, value, true)
        }
        _ => Predicate::equals(field, value),
    };
    Ok(predicate)
}
