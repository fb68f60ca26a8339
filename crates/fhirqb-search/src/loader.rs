//! Loading parameter definitions from TOML or JSON files.
//!
//! ```toml
//! [[global]]
//! name = "_id"
//! type = "token"
//! subtype = "string"
//! path = "Resource.id"
//!
//! [[result]]
//! name = "_include"
//!
//! [[resources.Patient]]
//! name = "name"
//! type = "string"
//! path = "Patient.name"
//! modifiers = ["exact", "contains"]
//! ```
//!
//! Without `[[global]]` entries the built-in common parameters are used. The
//! built-in search-result parameters are always registered.

use fhirqb_core::ValidationError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::register_common_parameters;
use crate::parameters::{ParameterDefinition, SearchModifier, SearchParameterType};
use crate::registry::ParameterRegistry;

/// Error type for parameter definition loading.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML parameter file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON parameter file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported parameter file format '{0}'")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Definition(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    Toml,
    Json,
}

impl DefinitionFormat {
    pub fn from_path(path: &Path) -> Result<Self, LoaderError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(LoaderError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterFile {
    #[serde(default)]
    global: Vec<ParameterEntry>,
    #[serde(default)]
    result: Vec<ResultEntry>,
    #[serde(default)]
    resources: BTreeMap<String, Vec<ParameterEntry>>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    name: String,
}

/// One definition as written in a file, before type checking.
#[derive(Debug, Deserialize)]
struct ParameterEntry {
    name: String,
    #[serde(rename = "type")]
    param_type: String,
    #[serde(default, alias = "fhirtype")]
    subtype: Option<String>,
    #[serde(alias = "xpath")]
    path: String,
    #[serde(default)]
    modifiers: Vec<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    targets: Vec<String>,
}

impl TryFrom<ParameterEntry> for ParameterDefinition {
    type Error = ValidationError;

    fn try_from(entry: ParameterEntry) -> Result<Self, Self::Error> {
        let param_type = SearchParameterType::parse(&entry.param_type).ok_or_else(|| {
            ValidationError::UnsupportedType {
                param_type: entry.param_type.clone(),
                field: entry.name.clone(),
            }
        })?;

        let modifiers = entry
            .modifiers
            .iter()
            .map(|m| {
                SearchModifier::parse(m)
                    .filter(|modifier| modifier.applicable_to(param_type))
                    .ok_or_else(|| ValidationError::unsupported_modifier(m.as_str(), &entry.name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut def = ParameterDefinition::new(entry.name, param_type, entry.path)
            .with_modifiers(modifiers)
            .with_targets(entry.targets);
        def.subtype = entry.subtype;
        def.required = entry.required;
        Ok(def)
    }
}

/// Build a registry from parameter file contents.
pub fn load_parameters_from_str(
    content: &str,
    format: DefinitionFormat,
) -> Result<ParameterRegistry, LoaderError> {
    let file: ParameterFile = match format {
        DefinitionFormat::Toml => toml::from_str(content)?,
        DefinitionFormat::Json => serde_json::from_str(content)?,
    };

    let mut registry = ParameterRegistry::new();

    if file.global.is_empty() {
        register_common_parameters(&mut registry);
    } else {
        for entry in file.global {
            registry.register_global(entry.try_into()?);
        }
    }

    registry.register_result_parameters();
    for entry in file.result {
        registry.register_result(entry.name);
    }

    for (resource_type, entries) in file.resources {
        let mut loaded = 0usize;
        for entry in entries {
            let def: ParameterDefinition = entry.try_into()?;
            tracing::debug!(
                resource_type = %resource_type,
                code = %def.name,
                param_type = %def.param_type,
                "Loaded search parameter"
            );
            registry.register(resource_type.as_str(), def);
            loaded += 1;
        }
        tracing::debug!(resource_type = %resource_type, count = loaded, "Loaded resource parameters");
    }

    tracing::info!(
        parameters = registry.len(),
        resource_types = registry.resource_types().len(),
        "Search parameter registry built"
    );
    Ok(registry)
}

/// Build a registry from a `.toml` or `.json` parameter file.
pub fn load_parameters_from_file(path: impl AsRef<Path>) -> Result<ParameterRegistry, LoaderError> {
    let path = path.as_ref();
    let format = DefinitionFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_parameters_from_str(&content, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PATIENT_TOML: &str = r#"
[[resources.Patient]]
name = "name"
type = "string"
path = "Patient.name"
modifiers = ["exact", "contains"]

[[resources.Patient]]
name = "general-practitioner"
type = "reference"
path = "Patient.generalPractitioner"
targets = ["Practitioner"]

[[resources.Observation]]
name = "code"
type = "token"
subtype = "CodeableConcept"
path = "Observation.code"
"#;

    #[test]
    fn test_load_toml_with_builtin_globals() {
        let registry = load_parameters_from_str(PATIENT_TOML, DefinitionFormat::Toml).unwrap();
        assert!(registry.get("Patient", "_id").is_some());
        assert!(registry.is_result_parameter("_count"));

        let name = registry.get("Patient", "name").unwrap();
        assert_eq!(name.modifiers, vec![SearchModifier::Exact, SearchModifier::Contains]);

        let gp = registry.get("Patient", "general-practitioner").unwrap();
        assert_eq!(gp.single_target(), Some("Practitioner"));

        let code = registry.get("Observation", "code").unwrap();
        assert_eq!(code.subtype.as_deref(), Some("CodeableConcept"));
    }

    #[test]
    fn test_explicit_globals_replace_builtins() {
        let content = r#"
[[global]]
name = "_id"
type = "token"
subtype = "code"
path = "Resource.id"

[[result]]
name = "_include"
"#;
        let registry = load_parameters_from_str(content, DefinitionFormat::Toml).unwrap();
        assert_eq!(registry.global_count(), 1);
        assert!(registry.get("Patient", "_lastUpdated").is_none());
        assert!(registry.is_result_parameter("_include"));
        assert!(registry.is_result_parameter("_sort"));
    }

    #[test]
    fn test_load_json_with_legacy_keys() {
        let content = r#"{
            "resources": {
                "Patient": [
                    {"name": "telecom", "type": "token", "fhirtype": "ContactPoint", "xpath": "Patient.telecom"}
                ]
            }
        }"#;
        let registry = load_parameters_from_str(content, DefinitionFormat::Json).unwrap();
        let telecom = registry.get("Patient", "telecom").unwrap();
        assert_eq!(telecom.subtype.as_deref(), Some("ContactPoint"));
        assert_eq!(telecom.field(), "telecom");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let content = r#"
[[resources.Patient]]
name = "near"
type = "special"
path = "Location.position"
"#;
        let err = load_parameters_from_str(content, DefinitionFormat::Toml).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Definition(ValidationError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_inapplicable_modifier_is_rejected() {
        let content = r#"
[[resources.Patient]]
name = "birthdate"
type = "date"
path = "Patient.birthDate"
modifiers = ["contains"]
"#;
        assert!(matches!(
            load_parameters_from_str(content, DefinitionFormat::Toml),
            Err(LoaderError::Definition(ValidationError::UnsupportedModifier { .. }))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(PATIENT_TOML.as_bytes()).unwrap();

        let registry = load_parameters_from_file(file.path()).unwrap();
        assert_eq!(registry.resource_types(), vec!["Observation", "Patient"]);

        assert!(matches!(
            load_parameters_from_file("params.yaml"),
            Err(LoaderError::UnsupportedFormat(_))
        ));
    }
}
