//! Reference search compilation.
//!
//! Values may be written as:
//! - `Type/id`
//! - `id` (with a `:Type` modifier it becomes `Type/id`)
//! - an absolute URL, of which the last two segments are kept
//!
//! The predicate matches `<field>.reference`.

use crate::parameters::SearchModifier;
use crate::predicate::Predicate;
use crate::sanitize::sanitize_string;

/// Reduce a reference value to the `Type/id` form stored in the backend.
pub fn normalize_reference(value: &str, modifier: Option<&SearchModifier>) -> String {
    if value.starts_with("http") {
        let segments: Vec<&str> = value.trim_end_matches('/').rsplitn(3, '/').collect();
        if let [id, resource_type, _] = segments.as_slice() {
            return format!("{resource_type}/{id}");
        }
        return value.to_string();
    }

    match modifier {
        Some(SearchModifier::Type(resource_type)) if !value.contains('/') => {
            format!("{resource_type}/{value}")
        }
        _ => value.to_string(),
    }
}

pub fn compile(field: &str, raw: &str, modifier: Option<&SearchModifier>) -> Predicate {
    let value = sanitize_string(raw);
    Predicate::equals(
        format!("{field}.reference"),
        normalize_reference(&value, modifier),
    )
}
