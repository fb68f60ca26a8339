//! SMART on FHIR v1 scope checks for search requests.
//!
//! A request for `name` with `action` is allowed when any of the granted
//! scopes matches `{user|patient}/{*|name}.{*|action}` exactly.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("Invalid name '{0}'. This parameter should be an asterisk or valid resource type.")]
    InvalidResource(String),

    #[error("Invalid action '{0}'. This parameter should be (read | write | *).")]
    InvalidAction(String),

    #[error("None of the provided scopes matched an allowed scope.")]
    InsufficientScope,
}

/// Access level requested on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeAction {
    Read,
    Write,
    Any,
}

impl ScopeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Any => "*",
        }
    }
}

impl fmt::Display for ScopeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeAction {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "*" => Ok(Self::Any),
            other => Err(ScopeError::InvalidAction(other.to_string())),
        }
    }
}

const CONTEXTS: [&str; 2] = ["user", "patient"];

/// Every scope string that would grant `action` on `resource`.
pub fn allowed_scopes(resource: &str, action: ScopeAction) -> Vec<String> {
    let mut scopes = Vec::with_capacity(8);
    for context in CONTEXTS {
        for name in ["*", resource] {
            for act in ["*", action.as_str()] {
                scopes.push(format!("{context}/{name}.{act}"));
            }
        }
    }
    scopes
}

/// Check that `granted` carries a scope allowing `action` on `resource`.
pub fn check_scope<S: AsRef<str>>(
    resource: &str,
    action: &str,
    granted: &[S],
) -> Result<(), ScopeError> {
    if !(resource == "*" || resource.chars().count() > 1) {
        return Err(ScopeError::InvalidResource(resource.to_string()));
    }
    let action: ScopeAction = action.parse()?;

    let expected = allowed_scopes(resource, action);
    let permitted = granted
        .iter()
        .any(|scope| expected.iter().any(|e| e == scope.as_ref()));

    if permitted {
        Ok(())
    } else {
        tracing::debug!(resource, action = %action, "no granted scope matched");
        Err(ScopeError::InsufficientScope)
    }
}
