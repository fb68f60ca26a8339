//! Number search compilation.
//!
//! `eq`, `ne` and `ap` search a range around the value. For `eq`/`ne` the range
//! reflects the precision of the literal: `100` matches [99.5, 100.5] and
//! `100.000` matches [99.9995, 100.0005]. `ap` widens it to 10% of the value.

use fhirqb_core::{Result, ValidationError};
use rust_decimal::Decimal;

use crate::parameters::SearchPrefix;
use crate::predicate::{ComparatorOp, Predicate};
use crate::sanitize::{NumberValue, sanitize_number};

pub fn compile(name: &str, field: &str, raw: &str) -> Result<Predicate> {
    let number = sanitize_number(name, raw)?;
    build_number_predicate(name, field, &number, |v| Ok(v))
}

/// Build the predicate for `number`, passing every emitted value through `convert`.
///
/// Quantity search reuses this with an SI conversion.
pub fn build_number_predicate(
    name: &str,
    field: &str,
    number: &NumberValue,
    convert: impl Fn(Decimal) -> Result<Decimal>,
) -> Result<Predicate> {
    match ComparatorOp::from_prefix(number.prefix) {
        Some(op) if number.prefix != SearchPrefix::Ne => {
            Ok(Predicate::comparator(field, convert(number.value)?, op))
        }
        _ => {
            let (lower, upper) = numeric_bounds(name, number)?;
            Ok(Predicate::range(
                field,
                convert(lower)?,
                convert(upper)?,
                number.prefix == SearchPrefix::Ne,
            ))
        }
    }
}

/// Range around the value implied by the prefix and the literal's precision.
pub fn numeric_bounds(name: &str, number: &NumberValue) -> Result<(Decimal, Decimal)> {
    let padding = match number.prefix {
        SearchPrefix::Ap => number.value.abs() * Decimal::new(1, 1),
        // 10^-d / 2
        _ => Decimal::try_new(5, number.decimals + 1).map_err(|_| {
            ValidationError::invalid_value(
                name,
                format!("'{}' is too precise for a search range", number.literal),
            )
        })?,
    };
    let overflow = || ValidationError::type_mismatch("number", name);
    let lower = number.value.checked_sub(padding).ok_or_else(overflow)?;
    let upper = number.value.checked_add(padding).ok_or_else(overflow)?;
    Ok((lower, upper))
}
