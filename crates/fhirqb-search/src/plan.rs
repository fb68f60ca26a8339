//! The compiled search plan handed to a renderer.
//!
//! Renderers apply `joins` first, then every match group (OR inside a group,
//! AND across groups), then the result transforms.

use indexmap::IndexMap;
use serde::Serialize;

use crate::predicate::Predicate;

/// One-hop lookup needed before a chained predicate can be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    /// Name the joined document is matched under, unique per reference and target
    pub alias: String,
    /// Referenced collection
    pub from_collection: String,
    /// Reference field on the searched resource (`subject.reference`)
    pub local_field: String,
    /// Key on the referenced collection
    pub foreign_field: String,
}

impl JoinSpec {
    /// The alias is derived from the reference path and the target, so
    /// `subject.reference` into `Patient` is joined as `subject_Patient`.
    pub fn new(
        from_collection: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        let from_collection = from_collection.into();
        let local_field = local_field.into();
        let reference = local_field.strip_suffix(".reference").unwrap_or(&local_field);
        Self {
            alias: format!("{}_{from_collection}", reference.replace('.', "_")),
            from_collection,
            local_field,
            foreign_field: foreign_field.into(),
        }
    }

    /// `field` relative to the joined document, when it is prefixed with this join's alias.
    pub fn strip_alias<'f>(&self, field: &'f str) -> Option<&'f str> {
        field
            .split_once('.')
            .filter(|(alias, _)| *alias == self.alias)
            .map(|(_, rest)| rest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// `_summary` modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    True,
    Text,
    Data,
    Count,
    False,
}

impl SummaryMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "true" => Some(Self::True),
            "text" => Some(Self::Text),
            "data" => Some(Self::Data),
            "count" => Some(Self::Count),
            "false" => Some(Self::False),
            _ => None,
        }
    }
}

/// `_total` modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalMode {
    None,
    Estimate,
    Accurate,
}

impl TotalMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "estimate" => Some(Self::Estimate),
            "accurate" => Some(Self::Accurate),
            _ => None,
        }
    }
}

/// A search-result parameter, applied after filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultTransform {
    Count(usize),
    Offset(usize),
    Sort(Vec<SortKey>),
    Summary(SummaryMode),
    Elements(Vec<String>),
    Total(TotalMode),
    /// A result parameter registered from a definition file, kept as written
    Passthrough(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPlan {
    pub joins: Vec<JoinSpec>,
    /// Each group is a disjunction; the groups are ANDed.
    pub match_groups: Vec<Vec<Predicate>>,
    /// Keyed by parameter name (`_count`, `_sort`, ...), in request order
    pub result_transforms: IndexMap<String, ResultTransform>,
}

impl SearchPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a join unless an identical one is already planned. Returns whether it was added.
    pub fn add_join(&mut self, join: JoinSpec) -> bool {
        if self.joins.contains(&join) {
            return false;
        }
        self.joins.push(join);
        true
    }

    /// Add an OR group. An empty group matches everything instead of nothing.
    pub fn add_group(&mut self, predicates: Vec<Predicate>) {
        if predicates.is_empty() {
            self.match_groups.push(vec![Predicate::match_all()]);
        } else {
            self.match_groups.push(predicates);
        }
    }

    pub fn set_transform(&mut self, name: impl Into<String>, transform: ResultTransform) {
        self.result_transforms.insert(name.into(), transform);
    }

    pub fn count(&self) -> Option<usize> {
        match self.result_transforms.get("_count") {
            Some(ResultTransform::Count(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self.result_transforms.get("_offset") {
            Some(ResultTransform::Offset(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn sort(&self) -> &[SortKey] {
        match self.result_transforms.get("_sort") {
            Some(ResultTransform::Sort(keys)) => keys,
            _ => &[],
        }
    }

    pub fn summary(&self) -> Option<SummaryMode> {
        match self.result_transforms.get("_summary") {
            Some(ResultTransform::Summary(mode)) => Some(*mode),
            _ => None,
        }
    }

    pub fn elements(&self) -> &[String] {
        match self.result_transforms.get("_elements") {
            Some(ResultTransform::Elements(fields)) => fields,
            _ => &[],
        }
    }
}
