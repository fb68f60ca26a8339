//! Forward chaining for reference parameters.
//!
//! Chaining filters on a field of the referenced resource. It needs a join
//! before the predicate can be evaluated, and the predicate is rewritten to
//! target the joined alias.
//!
//! Examples:
//! - `Observation?subject.name=Smith` - target taken from the definition's only target
//! - `Observation?subject:Patient.name=Smith` - explicit target type
//! - `Observation?subject:Patient.name:exact=Smith` - modifier on the chained parameter
//!
//! Only one level is supported; `subject.organization.name` is rejected.

use fhirqb_core::{Result, ValidationError};
use std::sync::Arc;

use crate::parameters::{ParameterDefinition, SearchModifier, SearchParameterType};
use crate::plan::JoinSpec;
use crate::registry::ParameterRegistry;

/// A resolved one-hop chained parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainedParameter {
    /// The reference parameter on the searched resource (`subject`)
    pub reference: Arc<ParameterDefinition>,
    /// Resource type the reference is followed to
    pub target_type: String,
    /// The parameter evaluated on the target (`name`)
    pub target: Arc<ParameterDefinition>,
    /// Modifier on the target parameter, already checked
    pub modifier: Option<SearchModifier>,
    pub join: JoinSpec,
}

impl ChainedParameter {
    /// Field the chained predicate matches, under the join alias.
    pub fn joined_field(&self) -> String {
        format!("{}.{}", self.join.alias, self.target.field())
    }
}

/// Check if a parameter key contains a chained reference (has a dot).
pub fn is_chained_parameter(key: &str) -> bool {
    // Result parameters such as `_sort` never chain
    !key.starts_with('_') && key.contains('.')
}

/// Resolve a chained key such as `subject:Patient.name:exact`.
///
/// `foreign_key` is the key on the target collection that `Type/id`
/// references point at.
pub fn parse_chained_parameter(
    key: &str,
    registry: &ParameterRegistry,
    resource_type: &str,
    foreign_key: &str,
) -> Result<ChainedParameter> {
    let unsupported = || ValidationError::UnsupportedChain {
        name: key.to_string(),
    };

    let (link, final_part) = key.split_once('.').ok_or_else(unsupported)?;
    if final_part.contains('.') {
        return Err(unsupported());
    }

    let (reference_name, explicit_type) = split_part(link);
    let reference = registry
        .get(resource_type, reference_name)
        .ok_or_else(|| ValidationError::unknown_parameter(reference_name))?;
    if reference.param_type != SearchParameterType::Reference {
        return Err(unsupported());
    }

    let target_type = match explicit_type {
        Some(t) if reference.targets.is_empty() || reference.targets.iter().any(|r| r == t) => {
            t.to_string()
        }
        Some(_) => return Err(unsupported()),
        None => reference.single_target().ok_or_else(unsupported)?.to_string(),
    };

    let (target_name, modifier) = split_part(final_part);
    let target = registry
        .get(&target_type, target_name)
        .ok_or_else(|| ValidationError::unknown_parameter(format!("{target_type}.{target_name}")))?;
    let modifier = target.check_modifier(modifier)?;

    let join = JoinSpec::new(
        target_type.as_str(),
        format!("{}.reference", reference.field()),
        foreign_key,
    );

    tracing::debug!(
        key = %key,
        target_type = %target_type,
        local_field = %join.local_field,
        "Resolved chained parameter"
    );

    Ok(ChainedParameter {
        reference,
        target_type,
        target,
        modifier,
        join,
    })
}

fn split_part(part: &str) -> (&str, Option<&str>) {
    match part.split_once(':') {
        Some((name, rest)) => (name, Some(rest)),
        None => (part, None),
    }
}
