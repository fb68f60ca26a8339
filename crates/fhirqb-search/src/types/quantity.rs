//! Quantity search compilation.
//!
//! Values are compared on `<field>.value` after conversion to SI units, so
//! `20||mg` and `0.02||g` compile to the same predicate. A system, when given,
//! must also match `<field>.system`.

use fhirqb_core::{Result, ValidationError};

use crate::predicate::Predicate;
use crate::sanitize::sanitize_quantity;
use crate::types::number::build_number_predicate;
use crate::units;

pub fn compile(name: &str, field: &str, raw: &str) -> Result<Predicate> {
    let quantity = sanitize_quantity(name, raw)?;
    let value_field = format!("{field}.value");

    let unit = quantity.code.as_deref();
    if let Some(code) = unit.filter(|code| units::lookup(code).is_none()) {
        return Err(ValidationError::UnknownUnit {
            unit: code.to_string(),
            field: name.to_string(),
        });
    }

    let predicate = build_number_predicate(name, &value_field, &quantity.number, |v| match unit {
        Some(code) => {
            units::to_si(v, code).ok_or_else(|| ValidationError::type_mismatch("quantity", name))
        }
        None => Ok(v),
    })?;

    Ok(match quantity.system {
        Some(system) => Predicate::and(vec![
            predicate,
            Predicate::equals(format!("{field}.system"), system),
        ]),
        None => predicate,
    })
}
