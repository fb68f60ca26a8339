//! Conversion of quantity values to SI base units.
//!
//! Covers the UCUM codes that show up in clinical searches. Arithmetic is
//! exact decimal so bounds like `19.995 mg` convert without float noise.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Mass,
    Length,
    Volume,
    Time,
    Amount,
    Temperature,
    Dimensionless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// `si = value * factor`
    Multiplicative { factor: Decimal },
    /// `si = (value + offset) * numerator / denominator`
    Affine {
        offset: Decimal,
        numerator: Decimal,
        denominator: Decimal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDef {
    pub dimension: Dimension,
    pub kind: UnitKind,
}

impl UnitDef {
    const fn scaled(dimension: Dimension, factor: Decimal) -> Self {
        Self {
            dimension,
            kind: UnitKind::Multiplicative { factor },
        }
    }

    pub fn to_si(&self, value: Decimal) -> Option<Decimal> {
        match self.kind {
            UnitKind::Multiplicative { factor } => value.checked_mul(factor),
            UnitKind::Affine {
                offset,
                numerator,
                denominator,
            } => value
                .checked_add(offset)?
                .checked_mul(numerator)?
                .checked_div(denominator),
        }
    }
}

/// `10^-scale`
fn pow10_neg(scale: u32) -> Decimal {
    Decimal::new(1, scale)
}

static UNITS: LazyLock<HashMap<&'static str, UnitDef>> = LazyLock::new(|| {
    use Dimension::*;
    let mut units = HashMap::new();

    // Mass, base kg
    units.insert("kg", UnitDef::scaled(Mass, Decimal::ONE));
    units.insert("g", UnitDef::scaled(Mass, pow10_neg(3)));
    units.insert("mg", UnitDef::scaled(Mass, pow10_neg(6)));
    units.insert("ug", UnitDef::scaled(Mass, pow10_neg(9)));
    units.insert("ng", UnitDef::scaled(Mass, pow10_neg(12)));
    units.insert("pg", UnitDef::scaled(Mass, pow10_neg(15)));
    units.insert("[lb_av]", UnitDef::scaled(Mass, Decimal::new(45_359_237, 8)));
    units.insert("[oz_av]", UnitDef::scaled(Mass, Decimal::new(28_349_523_125, 12)));

    // Length, base m
    units.insert("m", UnitDef::scaled(Length, Decimal::ONE));
    units.insert("km", UnitDef::scaled(Length, Decimal::ONE_THOUSAND));
    units.insert("cm", UnitDef::scaled(Length, pow10_neg(2)));
    units.insert("mm", UnitDef::scaled(Length, pow10_neg(3)));
    units.insert("um", UnitDef::scaled(Length, pow10_neg(6)));
    units.insert("nm", UnitDef::scaled(Length, pow10_neg(9)));
    units.insert("[in_i]", UnitDef::scaled(Length, Decimal::new(254, 4)));
    units.insert("[ft_i]", UnitDef::scaled(Length, Decimal::new(3048, 4)));

    // Volume, base m3
    for (code, scale) in [("L", 3), ("dL", 4), ("cL", 5), ("mL", 6), ("uL", 9), ("nL", 12)] {
        units.insert(code, UnitDef::scaled(Volume, pow10_neg(scale)));
    }
    for (code, scale) in [("l", 3), ("dl", 4), ("cl", 5), ("ml", 6), ("ul", 9)] {
        units.insert(code, UnitDef::scaled(Volume, pow10_neg(scale)));
    }
    units.insert("m3", UnitDef::scaled(Volume, Decimal::ONE));

    // Time, base s
    units.insert("s", UnitDef::scaled(Time, Decimal::ONE));
    units.insert("ms", UnitDef::scaled(Time, pow10_neg(3)));
    units.insert("us", UnitDef::scaled(Time, pow10_neg(6)));
    units.insert("min", UnitDef::scaled(Time, Decimal::new(60, 0)));
    units.insert("h", UnitDef::scaled(Time, Decimal::new(3_600, 0)));
    units.insert("d", UnitDef::scaled(Time, Decimal::new(86_400, 0)));
    units.insert("wk", UnitDef::scaled(Time, Decimal::new(604_800, 0)));

    // Amount of substance, base mol
    units.insert("mol", UnitDef::scaled(Amount, Decimal::ONE));
    units.insert("mmol", UnitDef::scaled(Amount, pow10_neg(3)));
    units.insert("umol", UnitDef::scaled(Amount, pow10_neg(6)));
    units.insert("nmol", UnitDef::scaled(Amount, pow10_neg(9)));
    units.insert("pmol", UnitDef::scaled(Amount, pow10_neg(12)));

    // Temperature, base K
    units.insert("K", UnitDef::scaled(Temperature, Decimal::ONE));
    units.insert(
        "Cel",
        UnitDef {
            dimension: Temperature,
            kind: UnitKind::Affine {
                offset: Decimal::new(27_315, 2),
                numerator: Decimal::ONE,
                denominator: Decimal::ONE,
            },
        },
    );
    units.insert(
        "[degF]",
        UnitDef {
            dimension: Temperature,
            kind: UnitKind::Affine {
                offset: Decimal::new(45_967, 2),
                numerator: Decimal::new(5, 0),
                denominator: Decimal::new(9, 0),
            },
        },
    );

    // Dimensionless
    units.insert("1", UnitDef::scaled(Dimensionless, Decimal::ONE));
    units.insert("%", UnitDef::scaled(Dimensionless, pow10_neg(2)));

    units
});

pub fn lookup(code: &str) -> Option<&'static UnitDef> {
    UNITS.get(code)
}

/// Convert `value` expressed in `code` to its SI base unit.
///
/// `None` when the unit is unknown or the result overflows.
pub fn to_si(value: Decimal, code: &str) -> Option<Decimal> {
    lookup(code)?.to_si(value)
}
