//! Sanitizing raw search values.
//!
//! Every function takes untrusted request text and returns a typed value or a
//! [`ValidationError`]. Markup and control characters are stripped before any
//! value reaches the compiler.

use fhirqb_core::{FhirDateTime, Result, ValidationError};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::parameters::SearchPrefix;

/// Leading lowercase run followed by a digit: `ge2020`, `lt5.0`
static PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+)(\d.*)$").expect("Invalid prefix regex"));

static SCRIPT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>").expect("Invalid script regex")
});

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

static STRICT_NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("Invalid number regex")
});

static LEADING_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)").expect("Invalid number regex"));

/// A date value with its comparison prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateValue {
    pub prefix: SearchPrefix,
    pub date: FhirDateTime,
}

/// A number with its prefix and the number of digits written after the decimal point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberValue {
    pub prefix: SearchPrefix,
    pub value: Decimal,
    pub decimals: u32,
    /// The literal as given, after prefix and markup removal
    pub literal: String,
}

/// `[system|]code`. Empty parts are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenValue {
    pub system: Option<String>,
    pub code: Option<String>,
}

/// `number[|system|code]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityValue {
    pub number: NumberValue,
    pub system: Option<String>,
    pub code: Option<String>,
}

/// Remove HTML tags, script bodies and control characters.
pub fn strip_markup(raw: &str) -> String {
    let without_scripts = SCRIPT_REGEX.replace_all(raw, "");
    let without_tags = TAG_REGEX.replace_all(&without_scripts, "");
    without_tags
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Strings always sanitize; only the cleaned text is kept.
pub fn sanitize_string(raw: &str) -> String {
    strip_markup(raw)
}

/// Split the comparison prefix from the value. Defaults to `eq`.
pub fn split_prefix(field: &str, raw: &str) -> Result<(SearchPrefix, String)> {
    let cleaned = strip_markup(raw);
    let Some(caps) = PREFIX_REGEX.captures(&cleaned) else {
        return Ok((SearchPrefix::Eq, cleaned));
    };
    let prefix = &caps[1];
    let prefix = SearchPrefix::parse(prefix).ok_or_else(|| ValidationError::InvalidPrefix {
        prefix: prefix.to_string(),
        field: field.to_string(),
    })?;
    Ok((prefix, caps[2].to_string()))
}

pub fn sanitize_boolean(field: &str, raw: &str) -> Result<bool> {
    let value = strip_markup(raw);
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ValidationError::type_mismatch("boolean", field))
    }
}

pub fn sanitize_date(field: &str, raw: &str) -> Result<DateValue> {
    let (prefix, value) = split_prefix(field, raw)?;
    let date = FhirDateTime::from_str(&value)
        .map_err(|_| ValidationError::type_mismatch("date", field))?;
    Ok(DateValue { prefix, date })
}

pub fn sanitize_number(field: &str, raw: &str) -> Result<NumberValue> {
    let (prefix, literal) = split_prefix(field, raw)?;
    let value = parse_decimal(field, &literal)?;
    Ok(NumberValue {
        prefix,
        decimals: value.scale(),
        value,
        literal,
    })
}

/// Parse a decimal literal, rejecting anything a lenient parser would only partially read.
fn parse_decimal(field: &str, literal: &str) -> Result<Decimal> {
    if !STRICT_NUMBER_REGEX.is_match(literal) {
        return Err(match LEADING_NUMBER_REGEX.find(literal) {
            Some(parsed) => ValidationError::NumberMismatch {
                field: field.to_string(),
                parsed: parsed.as_str().to_string(),
                given: literal.to_string(),
            },
            None => ValidationError::type_mismatch("number", field),
        });
    }

    let unsigned = literal.strip_prefix('+').unwrap_or(literal);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => (&unsigned[..pos], Some(&unsigned[pos + 1..])),
        None => (unsigned, None),
    };
    let mantissa = mantissa.strip_suffix('.').unwrap_or(mantissa);
    let mantissa = match mantissa.strip_prefix('-') {
        Some(rest) if rest.starts_with('.') => format!("-0{rest}"),
        _ if mantissa.starts_with('.') => format!("0{mantissa}"),
        _ => mantissa.to_string(),
    };

    let parsed = match exponent {
        Some(exp) => Decimal::from_scientific(&format!("{mantissa}e{exp}")),
        None => Decimal::from_str(&mantissa),
    }
    .map_err(|_| ValidationError::type_mismatch("number", field))?;

    // Decimal rounds literals beyond its 28 fractional digits instead of failing.
    let written = mantissa.split_once('.').map_or(0, |(_, fraction)| fraction.len()) as i64;
    let shift = exponent.and_then(|exp| exp.parse::<i64>().ok()).unwrap_or(0);
    if i64::from(parsed.scale()) != (written - shift).max(0) {
        return Err(ValidationError::NumberMismatch {
            field: field.to_string(),
            parsed: parsed.to_string(),
            given: literal.to_string(),
        });
    }
    Ok(parsed)
}

/// Split `[system|]code`. More than one `|` is a mismatch.
///
/// With `is_boolean` the code must be `true` or `false` and is lowercased.
pub fn sanitize_token(field: &str, raw: &str, is_boolean: bool) -> Result<TokenValue> {
    let chunks: Vec<&str> = raw.split('|').collect();
    let (system, code) = match chunks.as_slice() {
        [code] => ("", *code),
        [system, code] => (*system, *code),
        _ => return Err(ValidationError::type_mismatch("token", field)),
    };

    let non_empty = |s: &str| {
        let cleaned = strip_markup(s);
        (!cleaned.is_empty()).then_some(cleaned)
    };
    let mut token = TokenValue {
        system: non_empty(system),
        code: non_empty(code),
    };

    if is_boolean {
        let code = token.code.as_deref().unwrap_or_default();
        token.code = Some(sanitize_boolean(field, code)?.to_string());
    }
    Ok(token)
}

/// `number|system|code`, `number||code` or a bare number.
pub fn sanitize_quantity(field: &str, raw: &str) -> Result<QuantityValue> {
    let (number, unit) = match raw.split_once('|') {
        Some((number, rest)) => (number, Some(rest)),
        None => (raw, None),
    };

    let number = sanitize_number(field, number).map_err(|err| match err {
        ValidationError::TypeMismatch { .. } => ValidationError::type_mismatch("quantity", field),
        other => other,
    })?;

    let token = match unit {
        Some(rest) if !rest.is_empty() => sanitize_token(field, rest, false)
            .map_err(|_| ValidationError::type_mismatch("quantity", field))?,
        _ => TokenValue::default(),
    };

    Ok(QuantityValue {
        number,
        system: token.system,
        code: token.code,
    })
}
