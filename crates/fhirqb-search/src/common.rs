//! Common search parameters that apply to all FHIR resources.
//!
//! Registered as global parameters when a parameter file does not declare
//! its own.

use crate::parameters::{ParameterDefinition, SearchParameterType};
use crate::registry::ParameterRegistry;

/// Search-result parameters. They shape the result set and never filter.
pub const RESULT_PARAMETERS: [&str; 6] = ["_count", "_offset", "_sort", "_summary", "_elements", "_total"];

/// Register all common (Resource-level) search parameters.
pub fn register_common_parameters(registry: &mut ParameterRegistry) {
    for param in common_parameters() {
        registry.register_global(param);
    }
}

pub fn common_parameters() -> Vec<ParameterDefinition> {
    vec![
        // _id - logical id of the resource
        ParameterDefinition::new("_id", SearchParameterType::Token, "Resource.id").with_subtype("string"),
        // _lastUpdated - when the resource was last changed
        ParameterDefinition::new("_lastUpdated", SearchParameterType::Date, "Resource.meta.lastUpdated"),
        ParameterDefinition::new("_tag", SearchParameterType::Token, "Resource.meta.tag").with_subtype("Coding"),
        ParameterDefinition::new("_profile", SearchParameterType::Uri, "Resource.meta.profile"),
        ParameterDefinition::new("_security", SearchParameterType::Token, "Resource.meta.security")
            .with_subtype("Coding"),
        // _source - where the resource comes from (R4+)
        ParameterDefinition::new("_source", SearchParameterType::Uri, "Resource.meta.source"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_parameters_registered() {
        let mut registry = ParameterRegistry::new();
        register_common_parameters(&mut registry);
        assert_eq!(registry.global_count(), 6);

        let last_updated = registry.get("AnyType", "_lastUpdated").unwrap();
        assert_eq!(last_updated.param_type, SearchParameterType::Date);
        assert_eq!(last_updated.field(), "meta.lastUpdated");

        let tag = registry.get("Patient", "_tag").unwrap();
        assert_eq!(tag.subtype.as_deref(), Some("Coding"));
    }

    #[test]
    fn test_result_parameters_are_not_filters() {
        let registry = ParameterRegistry::with_common();
        for name in RESULT_PARAMETERS {
            assert!(registry.is_result_parameter(name));
            assert!(registry.get("Patient", name).is_none());
        }
    }
}
