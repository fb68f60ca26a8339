use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning a FHIR search request into a search plan.
///
/// Per-parameter variants are accumulated so a caller sees every problem at
/// once; [`ValidationError::UnsupportedMethod`] aborts the whole compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationError {
    #[error("Type mismatch, expected {expected} for parameter {field}")]
    TypeMismatch { field: String, expected: String },

    #[error("Expected value: {parsed} does not equal given value: {given} for parameter {field}")]
    NumberMismatch {
        field: String,
        parsed: String,
        given: String,
    },

    #[error("Invalid prefix '{prefix}' for parameter {field}")]
    InvalidPrefix { prefix: String, field: String },

    #[error("Unknown parameter {name}")]
    UnknownParameter { name: String },

    #[error("Unsupported type '{param_type}' supplied for parameter '{field}'")]
    UnsupportedType { param_type: String, field: String },

    #[error("Unsupported modifier '{modifier}' for parameter '{field}'")]
    UnsupportedModifier { modifier: String, field: String },

    #[error("Unsupported fhirtype '{subtype}' supplied for token parameter '{field}'")]
    UnsupportedTokenSubtype { subtype: String, field: String },

    #[error("Search modifiers are not supported for parameter {field} as a URN of type uri")]
    ModifierConflict { field: String },

    #[error("Unsupported request method '{method}'")]
    UnsupportedMethod { method: String },

    #[error("{name} is required and missing")]
    MissingRequiredParameter { name: String },

    #[error("Unknown unit '{unit}' for parameter {field}")]
    UnknownUnit { unit: String, field: String },

    #[error("Invalid value for {param}: {message}")]
    InvalidValue { param: String, message: String },

    #[error("Unsupported chained parameter {name}")]
    UnsupportedChain { name: String },
}

impl ValidationError {
    pub fn type_mismatch(expected: impl Into<String>, field: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
        }
    }

    pub fn unknown_parameter(name: impl Into<String>) -> Self {
        Self::UnknownParameter { name: name.into() }
    }

    pub fn unsupported_modifier(modifier: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnsupportedModifier {
            modifier: modifier.into(),
            field: field.into(),
        }
    }

    pub fn invalid_value(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Structural errors abort the compilation before any parameter is read.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnsupportedMethod { .. })
    }

    /// Every variant except a broken parameter configuration is the caller's fault (4xx).
    pub fn is_client_error(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Configuration)
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TypeMismatch { .. }
            | Self::NumberMismatch { .. }
            | Self::InvalidPrefix { .. }
            | Self::UnknownUnit { .. }
            | Self::InvalidValue { .. }
            | Self::MissingRequiredParameter { .. } => ErrorCategory::Validation,
            Self::UnknownParameter { .. }
            | Self::UnsupportedModifier { .. }
            | Self::ModifierConflict { .. }
            | Self::UnsupportedChain { .. } => ErrorCategory::Parameter,
            Self::UnsupportedType { .. } | Self::UnsupportedTokenSubtype { .. } => {
                ErrorCategory::Configuration
            }
            Self::UnsupportedMethod { .. } => ErrorCategory::Request,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Parameter,
    Configuration,
    Request,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Parameter => write!(f, "parameter"),
            Self::Configuration => write!(f, "configuration"),
            Self::Request => write!(f, "request"),
        }
    }
}

/// The non-empty error list returned when a request cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{} search parameter error(s): {}", .0.len(), summarize(.0))]
#[serde(transparent)]
pub struct SearchErrors(pub Vec<ValidationError>);

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SearchErrors {
    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_client_error(&self) -> bool {
        self.0.iter().all(ValidationError::is_client_error)
    }
}

impl From<ValidationError> for SearchErrors {
    fn from(error: ValidationError) -> Self {
        Self::single(error)
    }
}

/// Convenience result type for sanitizing and compiling a single value
pub type Result<T> = std::result::Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message() {
        let err = ValidationError::type_mismatch("date", "birthdate");
        assert_eq!(
            err.to_string(),
            "Type mismatch, expected date for parameter birthdate"
        );
        assert!(err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_unknown_parameter_message() {
        let err = ValidationError::unknown_parameter("foo");
        assert_eq!(err.to_string(), "Unknown parameter foo");
        assert_eq!(err.category(), ErrorCategory::Parameter);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_configuration_errors_are_not_client_errors() {
        let err = ValidationError::UnsupportedTokenSubtype {
            subtype: "Money".into(),
            field: "price".into(),
        };
        assert!(!err.is_client_error());
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_method_error_is_fatal() {
        let err = ValidationError::UnsupportedMethod {
            method: "DELETE".into(),
        };
        assert!(err.is_fatal());
        assert_eq!(err.category(), ErrorCategory::Request);
        assert_eq!(err.to_string(), "Unsupported request method 'DELETE'");
    }

    #[test]
    fn test_search_errors_display_lists_all() {
        let errors = SearchErrors(vec![
            ValidationError::unknown_parameter("a"),
            ValidationError::unknown_parameter("b"),
        ]);
        let text = errors.to_string();
        assert!(text.starts_with("2 search parameter error(s)"));
        assert!(text.contains("Unknown parameter a; Unknown parameter b"));
        assert!(errors.is_client_error());
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let err = ValidationError::ModifierConflict {
            field: "url".into(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "modifierConflict");
        assert_eq!(value["field"], "url");
    }
}
