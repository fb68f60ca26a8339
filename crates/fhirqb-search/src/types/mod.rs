//! Type-specific predicate compilation.
//!
//! - Date: implicit ranges from the written precision, `ap` fuzzing around "now"
//! - Number: ranges from the significant digits of the literal
//! - Quantity: number rules applied after SI conversion
//! - String: accent- and case-insensitive prefix or substring match
//! - Token: dispatch on the token's FHIR datatype
//! - Uri: case-sensitive equality or hierarchical match
//! - Reference: `Type/id` equality on `<field>.reference`
//!
//! Each compiler handles one comma-separated atom of a request value.

pub mod date;
pub mod number;
pub mod quantity;
pub mod reference;
pub mod string;
pub mod token;
pub mod uri;

use fhirqb_core::Result;
use time::OffsetDateTime;

use crate::parameters::{SearchModifier, SearchParameterType};
use crate::predicate::Predicate;
use crate::sanitize::sanitize_boolean;

/// Everything needed to compile one atom of one parameter.
#[derive(Debug, Clone)]
pub struct AtomContext<'a> {
    /// Parameter name as requested, used in error messages
    pub name: &'a str,
    /// Field the predicate targets
    pub field: &'a str,
    pub param_type: SearchParameterType,
    pub subtype: Option<&'a str>,
    pub modifier: Option<&'a SearchModifier>,
    /// Reference point for `ap` on dates
    pub now: OffsetDateTime,
}

/// Compile one atom into a predicate.
///
/// `:missing` wins over every type rule; its boolean is passed through as the
/// `exists` flag of the predicate.
pub fn compile_atom(ctx: &AtomContext<'_>, raw: &str) -> Result<Predicate> {
    if matches!(ctx.modifier, Some(SearchModifier::Missing)) {
        let exists = sanitize_boolean(ctx.name, raw)?;
        return Ok(Predicate::exists(ctx.field, exists));
    }

    match ctx.param_type {
        SearchParameterType::Date => date::compile(ctx.name, ctx.field, raw, ctx.now),
        SearchParameterType::Number => number::compile(ctx.name, ctx.field, raw),
        SearchParameterType::Quantity => quantity::compile(ctx.name, ctx.field, raw),
        SearchParameterType::String => Ok(string::compile(ctx.field, raw, ctx.modifier)),
        SearchParameterType::Token => {
            token::compile(ctx.name, ctx.field, ctx.subtype, raw, ctx.modifier)
        }
        SearchParameterType::Uri => uri::compile(ctx.name, ctx.field, raw, ctx.modifier),
        SearchParameterType::Reference => Ok(reference::compile(ctx.field, raw, ctx.modifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn ctx<'a>(param_type: SearchParameterType, modifier: Option<&'a SearchModifier>) -> AtomContext<'a> {
        AtomContext {
            name: "p",
            field: "f",
            param_type,
            subtype: None,
            modifier,
            now: datetime!(2020-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn test_missing_short_circuits_type_rules() {
        let missing = SearchModifier::Missing;
        let c = ctx(SearchParameterType::Date, Some(&missing));
        assert_eq!(compile_atom(&c, "true").unwrap(), Predicate::exists("f", true));
        assert_eq!(compile_atom(&c, "FALSE").unwrap(), Predicate::exists("f", false));
        assert!(compile_atom(&c, "2020").is_err());
    }

    #[test]
    fn test_dispatch_by_type() {
        let c = ctx(SearchParameterType::Reference, None);
        assert_eq!(
            compile_atom(&c, "Patient/1").unwrap(),
            Predicate::equals("f.reference", "Patient/1")
        );
    }
}
