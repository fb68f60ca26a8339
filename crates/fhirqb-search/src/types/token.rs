//! Token search compilation.
//!
//! The token's FHIR datatype decides which sub-fields are compared:
//! - Coding: `system` and `code`
//! - CodeableConcept: `coding.system` and `coding.code`
//! - Identifier: `system` and `value`
//! - ContactPoint: any of `system|value|use|rank|period` equal to the code
//! - uri: URI rules on the code
//! - string, boolean, code: exact match on the code
//!
//! System is always compared before code.

use fhirqb_core::{Result, ValidationError};

use crate::parameters::{SearchModifier, TokenSubtype};
use crate::predicate::{PatternKind, Predicate, PredicateValue};
use crate::sanitize::{TokenValue, sanitize_token};
use crate::types::{string, uri};

const CONTACT_POINT_FIELDS: [&str; 5] = ["system", "value", "use", "rank", "period"];

pub fn compile(
    name: &str,
    field: &str,
    subtype: Option<&str>,
    raw: &str,
    modifier: Option<&SearchModifier>,
) -> Result<Predicate> {
    let subtype = subtype
        .and_then(TokenSubtype::parse)
        .ok_or_else(|| ValidationError::UnsupportedTokenSubtype {
            subtype: subtype.unwrap_or_default().to_string(),
            field: name.to_string(),
        })?;

    // :text searches the display text rather than the coded parts.
    if matches!(modifier, Some(SearchModifier::Text)) {
        let text = string::strip_diacritics(&crate::sanitize::sanitize_string(raw));
        let text_field = match subtype {
            TokenSubtype::Coding => format!("{field}.display"),
            TokenSubtype::Identifier => format!("{field}.type.text"),
            _ => format!("{field}.text"),
        };
        return Ok(Predicate::pattern(text_field, PatternKind::StartsWith, text, false));
    }

    let token = sanitize_token(name, raw, subtype == TokenSubtype::Boolean)?;
    let code = || {
        token
            .code
            .clone()
            .ok_or_else(|| ValidationError::type_mismatch("token", name))
    };

    let predicate = match subtype {
        TokenSubtype::Coding => system_and_code(name, field, "system", "code", &token)?,
        TokenSubtype::CodeableConcept => {
            system_and_code(name, field, "coding.system", "coding.code", &token)?
        }
        TokenSubtype::Identifier => system_and_code(name, field, "system", "value", &token)?,
        TokenSubtype::ContactPoint => {
            let code = code()?;
            Predicate::or(
                CONTACT_POINT_FIELDS
                    .iter()
                    .map(|attr| Predicate::equals(format!("{field}.{attr}"), code.as_str()))
                    .collect(),
            )
        }
        TokenSubtype::Uri => uri::compile(name, field, &code()?, modifier)?,
        TokenSubtype::Boolean => {
            Predicate::equals(field, PredicateValue::Boolean(code()? == "true"))
        }
        TokenSubtype::String | TokenSubtype::Code => string::compile_exact(field, &code()?),
    };
    Ok(predicate)
}

/// `And` of the parts that were supplied, system first.
fn system_and_code(
    name: &str,
    field: &str,
    system_key: &str,
    code_key: &str,
    token: &TokenValue,
) -> Result<Predicate> {
    let mut parts = Vec::with_capacity(2);
    if let Some(system) = &token.system {
        parts.push(Predicate::equals(format!("{field}.{system_key}"), system.as_str()));
    }
    if let Some(code) = &token.code {
        parts.push(Predicate::equals(format!("{field}.{code_key}"), code.as_str()));
    }
    if parts.is_empty() {
        return Err(ValidationError::type_mismatch("token", name));
    }
    Ok(Predicate::and(parts))
}
