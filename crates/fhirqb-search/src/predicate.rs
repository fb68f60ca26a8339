//! Backend-agnostic predicate tree produced by the compiler.
//!
//! Fields are dotted paths relative to the searched resource (or to a join
//! alias for chained parameters). Renderers translate each node 1:1 into
//! their own operators.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::parameters::SearchPrefix;

/// Comparison operators shared by every renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparatorOp {
    Gt,
    Ge,
    Lt,
    Le,
    Ne,
}

impl ComparatorOp {
    /// Map a value prefix to its comparator. `sa` reads as `gt`, `eb` as `lt`.
    ///
    /// `eq` and `ap` are range prefixes and have no comparator.
    pub fn from_prefix(prefix: SearchPrefix) -> Option<Self> {
        match prefix {
            SearchPrefix::Gt | SearchPrefix::Sa => Some(Self::Gt),
            SearchPrefix::Ge => Some(Self::Ge),
            SearchPrefix::Lt | SearchPrefix::Eb => Some(Self::Lt),
            SearchPrefix::Le => Some(Self::Le),
            SearchPrefix::Ne => Some(Self::Ne),
            SearchPrefix::Eq | SearchPrefix::Ap => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternKind {
    StartsWith,
    EndsWith,
    Contains,
}

/// A literal compared against a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateValue {
    Text(String),
    Number(Decimal),
    Boolean(bool),
    /// UTC instant formatted as `YYYY-MM-DDTHH:MM:SS.mmmZ`
    Date(String),
}

impl PredicateValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// JSON form used by document renderers. Numbers become JSON numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) | Self::Date(s) => serde_json::Value::String(s.clone()),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Number(d) => d
                .normalize()
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Date(s) => f.write_str(s),
            Self::Number(d) => write!(f, "{}", d.normalize()),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for PredicateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for PredicateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PredicateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for PredicateValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for PredicateValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// One node of the predicate tree. Built bottom-up and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Predicate {
    Equals {
        field: String,
        value: PredicateValue,
        invert: bool,
    },
    /// Inclusive on both ends.
    Range {
        field: String,
        lower: PredicateValue,
        upper: PredicateValue,
        invert: bool,
    },
    Comparator {
        field: String,
        value: PredicateValue,
        op: ComparatorOp,
    },
    Exists {
        field: String,
        exists: bool,
    },
    #[serde(rename_all = "camelCase")]
    Pattern {
        field: String,
        kind: PatternKind,
        value: String,
        case_sensitive: bool,
    },
    And {
        children: Vec<Predicate>,
    },
    Or {
        children: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
            invert: false,
        }
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
            invert: true,
        }
    }

    /// Inclusive range. A negated range is expressed as `lower > field OR field > upper`
    /// so no renderer has to negate a range operator.
    pub fn range(
        field: impl Into<String>,
        lower: impl Into<PredicateValue>,
        upper: impl Into<PredicateValue>,
        invert: bool,
    ) -> Self {
        let field = field.into();
        if invert {
            return Self::or(vec![
                Self::comparator(field.clone(), lower, ComparatorOp::Lt),
                Self::comparator(field, upper, ComparatorOp::Gt),
            ]);
        }
        Self::Range {
            field,
            lower: lower.into(),
            upper: upper.into(),
            invert: false,
        }
    }

    pub fn comparator(
        field: impl Into<String>,
        value: impl Into<PredicateValue>,
        op: ComparatorOp,
    ) -> Self {
        Self::Comparator {
            field: field.into(),
            value: value.into(),
            op,
        }
    }

    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        Self::Exists {
            field: field.into(),
            exists,
        }
    }

    pub fn pattern(
        field: impl Into<String>,
        kind: PatternKind,
        value: impl Into<String>,
        case_sensitive: bool,
    ) -> Self {
        Self::Pattern {
            field: field.into(),
            kind,
            value: value.into(),
            case_sensitive,
        }
    }

    pub fn and(children: Vec<Predicate>) -> Self {
        Self::And { children }
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Self::Or { children }
    }

    /// Matches every document. Fills groups that compiled to nothing.
    pub fn match_all() -> Self {
        Self::And {
            children: Vec::new(),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Self::And { children } if children.is_empty())
    }
}
