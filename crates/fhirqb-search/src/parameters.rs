use fhirqb_core::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// FHIR search parameter types the compiler knows how to turn into predicates.
/// See: https://hl7.org/fhir/R4/search.html#table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParameterType {
    Date,
    Number,
    Quantity,
    String,
    Token,
    Uri,
    Reference,
}

impl SearchParameterType {
    /// Parse a search parameter type from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "date" => Some(Self::Date),
            "number" => Some(Self::Number),
            "quantity" => Some(Self::Quantity),
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "uri" => Some(Self::Uri),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Number => "number",
            Self::Quantity => "quantity",
            Self::String => "string",
            Self::Token => "token",
            Self::Uri => "uri",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for SearchParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The FHIR datatype behind a token parameter; decides which sub-fields are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSubtype {
    Coding,
    CodeableConcept,
    Identifier,
    ContactPoint,
    #[serde(rename = "uri")]
    Uri,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "code")]
    Code,
}

impl TokenSubtype {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Coding" => Some(Self::Coding),
            // Both spellings show up in published parameter tables.
            "CodeableConcept" | "CodableConcept" => Some(Self::CodeableConcept),
            "Identifier" => Some(Self::Identifier),
            "ContactPoint" => Some(Self::ContactPoint),
            "uri" => Some(Self::Uri),
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "code" => Some(Self::Code),
            _ => None,
        }
    }
}

/// Search modifiers, applied as a suffix to the parameter name: `name:modifier`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchModifier {
    Missing,
    Exact,
    Contains,
    Text,
    Above,
    Below,
    In,
    NotIn,
    /// Resource type restriction on a reference, e.g. `subject:Patient`
    Type(String),
}

impl SearchModifier {
    /// Parse a search modifier from a string.
    ///
    /// Capitalized names are resource type restrictions.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "missing" => Some(Self::Missing),
            "exact" => Some(Self::Exact),
            "contains" => Some(Self::Contains),
            "text" => Some(Self::Text),
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            "in" => Some(Self::In),
            "not-in" => Some(Self::NotIn),
            t if t.starts_with(|c: char| c.is_ascii_uppercase())
                && t.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                Some(Self::Type(t.to_string()))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Missing => "missing",
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::Text => "text",
            Self::Above => "above",
            Self::Below => "below",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::Type(t) => t,
        }
    }

    /// Check if this modifier is applicable to the given parameter type.
    pub fn applicable_to(&self, param_type: SearchParameterType) -> bool {
        match self {
            Self::Missing => true, // All types support :missing
            Self::Exact | Self::Contains => matches!(param_type, SearchParameterType::String),
            Self::Text => matches!(
                param_type,
                SearchParameterType::String | SearchParameterType::Token
            ),
            Self::In | Self::NotIn => matches!(param_type, SearchParameterType::Token),
            Self::Below | Self::Above => matches!(
                param_type,
                SearchParameterType::Token | SearchParameterType::Uri
            ),
            Self::Type(_) => matches!(param_type, SearchParameterType::Reference),
        }
    }
}

impl fmt::Display for SearchModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefixes for number/date/quantity search values
/// e.g., `ge2020-01-01`, `lt5.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrefix {
    #[default]
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Sa, // starts after
    Eb, // ends before
    Ap, // approximately
}

impl fmt::Display for SearchPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchPrefix::Eq => "eq",
            SearchPrefix::Ne => "ne",
            SearchPrefix::Gt => "gt",
            SearchPrefix::Lt => "lt",
            SearchPrefix::Ge => "ge",
            SearchPrefix::Le => "le",
            SearchPrefix::Sa => "sa",
            SearchPrefix::Eb => "eb",
            SearchPrefix::Ap => "ap",
        };
        f.write_str(s)
    }
}

impl SearchPrefix {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            "sa" => Some(Self::Sa),
            "eb" => Some(Self::Eb),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }
}

/// A search parameter definition: how a request parameter maps onto a stored field.
///
/// Definitions are immutable once registered and shared across requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterDefinition {
    /// The code used in search queries (e.g., "name", "identifier")
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: SearchParameterType,
    /// Token datatype. Kept as written so an unsupported value is reported per request.
    pub subtype: Option<String>,
    /// Dotted element path, usually starting with the resource type (`Patient.name.family`)
    pub path: String,
    /// Allowed modifiers; empty means the type's defaults
    pub modifiers: Vec<SearchModifier>,
    pub required: bool,
    /// Target resource types for reference parameters
    pub targets: Vec<String>,
}

impl ParameterDefinition {
    pub fn new(
        name: impl Into<String>,
        param_type: SearchParameterType,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            subtype: None,
            path: path.into(),
            modifiers: Vec::new(),
            required: false,
            targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Vec<SearchModifier>) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// The backend field this parameter matches: the path minus its resource segment.
    pub fn field(&self) -> &str {
        match self.path.split_once('.') {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => &self.path,
        }
    }

    /// Whether `modifier` may be used with this parameter.
    pub fn allows_modifier(&self, modifier: &SearchModifier) -> bool {
        if !modifier.applicable_to(self.param_type) {
            return false;
        }
        if self.modifiers.is_empty() {
            return true;
        }
        match modifier {
            // Type restrictions are checked against the targets instead.
            SearchModifier::Type(t) => self.targets.is_empty() || self.targets.contains(t),
            other => self.modifiers.contains(other),
        }
    }

    /// Parse a requested modifier and check it against this parameter.
    pub fn check_modifier(&self, raw: Option<&str>) -> Result<Option<SearchModifier>, ValidationError> {
        let Some(raw) = raw.filter(|m| !m.is_empty()) else {
            return Ok(None);
        };
        SearchModifier::parse(raw)
            .filter(|modifier| self.allows_modifier(modifier))
            .map(Some)
            .ok_or_else(|| ValidationError::unsupported_modifier(raw, &self.name))
    }

    /// The single resource type a reference can point to, if unambiguous.
    pub fn single_target(&self) -> Option<&str> {
        match self.targets.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_drops_resource_segment() {
        let def = ParameterDefinition::new("family", SearchParameterType::String, "Patient.name.family");
        assert_eq!(def.field(), "name.family");

        let bare = ParameterDefinition::new("x", SearchParameterType::String, "status");
        assert_eq!(bare.field(), "status");
    }

    #[test]
    fn test_default_modifiers_follow_type() {
        let def = ParameterDefinition::new("name", SearchParameterType::String, "Patient.name");
        assert!(def.allows_modifier(&SearchModifier::Exact));
        assert!(def.allows_modifier(&SearchModifier::Missing));
        assert!(!def.allows_modifier(&SearchModifier::Below));
    }

    #[test]
    fn test_explicit_modifier_list_is_exclusive() {
        let def = ParameterDefinition::new("name", SearchParameterType::String, "Patient.name")
            .with_modifiers(vec![SearchModifier::Exact]);
        assert!(def.allows_modifier(&SearchModifier::Exact));
        assert!(!def.allows_modifier(&SearchModifier::Contains));
    }

    #[test]
    fn test_check_modifier() {
        let def = ParameterDefinition::new("birthdate", SearchParameterType::Date, "Patient.birthDate");
        assert_eq!(def.check_modifier(None), Ok(None));
        assert_eq!(def.check_modifier(Some("")), Ok(None));
        assert_eq!(def.check_modifier(Some("missing")), Ok(Some(SearchModifier::Missing)));
        assert_eq!(
            def.check_modifier(Some("exact")),
            Err(ValidationError::unsupported_modifier("exact", "birthdate"))
        );
    }

    #[test]
    fn test_type_modifier_parsing() {
        assert_eq!(
            SearchModifier::parse("Patient"),
            Some(SearchModifier::Type("Patient".into()))
        );
        assert_eq!(SearchModifier::parse("not-in"), Some(SearchModifier::NotIn));
        assert_eq!(SearchModifier::parse("bogus"), None);

        let def = ParameterDefinition::new("subject", SearchParameterType::Reference, "Observation.subject")
            .with_targets(vec!["Patient".into(), "Group".into()]);
        assert!(def.allows_modifier(&SearchModifier::Type("Patient".into())));
        assert_eq!(def.single_target(), None);
    }

    #[test]
    fn test_prefix_display_round_trip() {
        for p in ["eq", "ne", "gt", "lt", "ge", "le", "sa", "eb", "ap"] {
            assert_eq!(SearchPrefix::parse(p).unwrap().to_string(), p);
        }
        assert_eq!(SearchPrefix::parse("xx"), None);
        assert_eq!(SearchPrefix::default(), SearchPrefix::Eq);
    }

    #[test]
    fn test_token_subtype_accepts_both_spellings() {
        assert_eq!(TokenSubtype::parse("CodableConcept"), Some(TokenSubtype::CodeableConcept));
        assert_eq!(TokenSubtype::parse("CodeableConcept"), Some(TokenSubtype::CodeableConcept));
        assert_eq!(TokenSubtype::parse("Money"), None);
    }
}
