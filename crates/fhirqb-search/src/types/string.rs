//! String search compilation.
//!
//! `:exact` is a plain equality on the cleaned value. Otherwise the value is
//! stripped of diacritics and matched case-insensitively as a prefix, or as a
//! substring under `:contains`.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::parameters::SearchModifier;
use crate::predicate::{PatternKind, Predicate};
use crate::sanitize::sanitize_string;

/// Decompose and drop combining marks: `Évë` becomes `Eve`. Case is kept.
pub fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

pub fn compile(field: &str, raw: &str, modifier: Option<&SearchModifier>) -> Predicate {
    let value = sanitize_string(raw);
    match modifier {
        Some(SearchModifier::Exact) => Predicate::equals(field, value),
        Some(SearchModifier::Contains) => {
            Predicate::pattern(field, PatternKind::Contains, strip_diacritics(&value), false)
        }
        _ => Predicate::pattern(field, PatternKind::StartsWith, strip_diacritics(&value), false),
    }
}

/// Exact match used by token parameters backed by plain strings and codes.
pub fn compile_exact(field: &str, value: &str) -> Predicate {
    compile(field, value, Some(&SearchModifier::Exact))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_keeps_accents() {
        assert_eq!(
            compile("name", "Evë", Some(&SearchModifier::Exact)),
            Predicate::equals("name", "Evë")
        );
    }

    #[test]
    fn test_default_is_accent_insensitive_prefix() {
        assert_eq!(
            compile("name", "Evë", None),
            Predicate::pattern("name", PatternKind::StartsWith, "Eve", false)
        );
    }

    #[test]
    fn test_contains() {
        assert_eq!(
            compile("name", "Ché", Some(&SearchModifier::Contains)),
            Predicate::pattern("name", PatternKind::Contains, "Che", false)
        );
    }

    #[test]
    fn test_markup_is_removed() {
        assert_eq!(
            compile("name", "<i>Smith</i>", None),
            Predicate::pattern("name", PatternKind::StartsWith, "Smith", false)
        );
    }

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(strip_diacritics("Évê Ångström"), "Eve Angstrom");
    }
}
