//! Search parameter registry.
//!
//! Parameters are resolved in three buckets, in order:
//! - global parameters, available on every resource type (`_id`, `_lastUpdated`)
//! - resource parameters, keyed by resource type and code
//! - search-result parameters (`_count`, `_sort`, ...), which never compile to predicates
//!
//! The registry is filled once and then shared read-only (typically behind an
//! `Arc`) by every compilation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::common::{RESULT_PARAMETERS, register_common_parameters};
use crate::parameters::ParameterDefinition;

/// Where a request parameter name resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedParameter {
    Global(Arc<ParameterDefinition>),
    Resource(Arc<ParameterDefinition>),
    /// A search-result parameter, bypassing predicate compilation
    Result(String),
}

impl ResolvedParameter {
    pub fn definition(&self) -> Option<&Arc<ParameterDefinition>> {
        match self {
            Self::Global(def) | Self::Resource(def) => Some(def),
            Self::Result(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    global: HashMap<String, Arc<ParameterDefinition>>,
    /// Parameters indexed by (resource_type, code) as composite key
    by_resource: HashMap<(String, String), Arc<ParameterDefinition>>,
    result: HashSet<String>,
}

impl ParameterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in common and search-result parameters.
    pub fn with_common() -> Self {
        let mut registry = Self::new();
        register_common_parameters(&mut registry);
        registry.register_result_parameters();
        registry
    }

    pub fn register_global(&mut self, param: ParameterDefinition) {
        self.global.insert(param.name.clone(), Arc::new(param));
    }

    pub fn register(&mut self, resource_type: impl Into<String>, param: ParameterDefinition) {
        self.by_resource
            .insert((resource_type.into(), param.name.clone()), Arc::new(param));
    }

    pub fn register_result(&mut self, name: impl Into<String>) {
        self.result.insert(name.into());
    }

    /// Register the built-in search-result parameters.
    pub fn register_result_parameters(&mut self) {
        for name in RESULT_PARAMETERS {
            self.register_result(name);
        }
    }

    /// Resolve a parameter code for a resource type.
    pub fn resolve(&self, resource_type: &str, code: &str) -> Option<ResolvedParameter> {
        if let Some(def) = self.global.get(code) {
            return Some(ResolvedParameter::Global(def.clone()));
        }
        if let Some(def) = self
            .by_resource
            .get(&(resource_type.to_string(), code.to_string()))
        {
            return Some(ResolvedParameter::Resource(def.clone()));
        }
        self.result
            .contains(code)
            .then(|| ResolvedParameter::Result(code.to_string()))
    }

    /// A parameter definition usable for filtering (global or resource-specific).
    pub fn get(&self, resource_type: &str, code: &str) -> Option<Arc<ParameterDefinition>> {
        self.resolve(resource_type, code)
            .and_then(|resolved| resolved.definition().cloned())
    }

    pub fn is_result_parameter(&self, code: &str) -> bool {
        self.result.contains(code)
    }

    /// All resource-specific parameters of a type, sorted by code.
    pub fn resource_parameters(&self, resource_type: &str) -> Vec<Arc<ParameterDefinition>> {
        let mut params: Vec<_> = self
            .by_resource
            .iter()
            .filter(|((rt, _), _)| rt == resource_type)
            .map(|(_, def)| def.clone())
            .collect();
        params.sort_by(|a, b| a.name.cmp(&b.name));
        params
    }

    /// Parameters available on every resource type, sorted by code.
    pub fn global_parameters(&self) -> Vec<Arc<ParameterDefinition>> {
        let mut params: Vec<_> = self.global.values().cloned().collect();
        params.sort_by(|a, b| a.name.cmp(&b.name));
        params
    }

    /// Parameters that must be present on every search of `resource_type`.
    pub fn required_parameters(&self, resource_type: &str) -> Vec<Arc<ParameterDefinition>> {
        self.global_parameters()
            .into_iter()
            .chain(self.resource_parameters(resource_type))
            .filter(|def| def.required)
            .collect()
    }

    pub fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .by_resource
            .keys()
            .map(|(rt, _)| rt.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        types.sort();
        types
    }

    pub fn global_count(&self) -> usize {
        self.global.len()
    }

    /// Number of filtering parameters (global plus resource-specific).
    pub fn len(&self) -> usize {
        self.global.len() + self.by_resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.by_resource.is_empty() && self.result.is_empty()
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::SearchParameterType;

    fn patient_registry() -> ParameterRegistry {
        let mut registry = ParameterRegistry::with_common();
        registry.register(
            "Patient",
            ParameterDefinition::new("name", SearchParameterType::String, "Patient.name"),
        );
        registry.register(
            "Patient",
            ParameterDefinition::new("identifier", SearchParameterType::Token, "Patient.identifier")
                .with_subtype("Identifier")
                .required(),
        );
        registry
    }

    #[test]
    fn test_resolution_order() {
        let registry = patient_registry();
        assert!(matches!(
            registry.resolve("Patient", "_id"),
            Some(ResolvedParameter::Global(_))
        ));
        assert!(matches!(
            registry.resolve("Patient", "name"),
            Some(ResolvedParameter::Resource(_))
        ));
        assert_eq!(
            registry.resolve("Patient", "_count"),
            Some(ResolvedParameter::Result("_count".into()))
        );
        assert_eq!(registry.resolve("Observation", "name"), None);
        assert_eq!(registry.resolve("Patient", "bogus"), None);
    }

    #[test]
    fn test_global_shadows_resource() {
        let mut registry = patient_registry();
        registry.register(
            "Patient",
            ParameterDefinition::new("_id", SearchParameterType::String, "Patient.other"),
        );
        let def = registry.get("Patient", "_id").unwrap();
        assert_eq!(def.path, "Resource.id");
    }

    #[test]
    fn test_required_and_listing() {
        let registry = patient_registry();
        let required = registry.required_parameters("Patient");
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].name, "identifier");
        assert_eq!(registry.resource_types(), vec!["Patient".to_string()]);
        assert_eq!(registry.resource_parameters("Patient").len(), 2);
        let globals: Vec<_> = registry.global_parameters().iter().map(|d| d.name.clone()).collect();
        assert_eq!(globals[0], "_id");
        assert_eq!(globals.len(), 6);
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ParameterRegistry>();
    }
}
