pub mod error;
pub mod scopes;
pub mod time;

pub use error::{ErrorCategory, Result, SearchErrors, ValidationError};
pub use scopes::{ScopeAction, ScopeError, allowed_scopes, check_scope};
pub use time::{DatePrecision, FhirDateTime, format_instant, now_utc};
