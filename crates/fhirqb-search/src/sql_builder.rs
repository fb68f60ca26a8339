//! Relational rendering of a search plan into PostgreSQL JSONB queries.
//!
//! Each resource type lives in `<schema>.<type>` with an `id` column and a
//! JSONB `resource` column. Joins become `INNER JOIN`s against the referenced
//! table, every user value is a bind parameter (`$1`, `$2`, ...), and all
//! identifiers are validated before they reach the SQL text.

use std::fmt;
use thiserror::Error;

use crate::plan::{JoinSpec, SearchPlan, SortDirection, SummaryMode};
use crate::predicate::{ComparatorOp, PatternKind, Predicate, PredicateValue};

/// Maximum number of leaf predicates in one query
const MAX_CONDITIONS: usize = 100;

/// Maximum number of JOINs allowed
const MAX_JOINS: usize = 10;

/// Alias of the searched table
const BASE_ALIAS: &str = "r";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlBuilderError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Query too complex: {0}")]
    QueryTooComplex(String),
}

/// A validated dotted path inside a JSONB column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonbPath {
    segments: Vec<String>,
}

impl JsonbPath {
    pub fn new(segments: Vec<String>) -> Result<Self, SqlBuilderError> {
        for segment in &segments {
            validate_identifier(segment)?;
        }
        Ok(Self { segments })
    }

    /// Parse `name.family` into a path.
    pub fn parse(dotted: &str) -> Result<Self, SqlBuilderError> {
        Self::new(dotted.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn to_accessor(&self, resource_col: &str, as_text: bool) -> String {
        build_jsonb_accessor(resource_col, &self.segments, as_text)
    }
}

/// Only alphanumeric characters and underscores pass.
fn validate_identifier(name: &str) -> Result<(), SqlBuilderError> {
    if name.is_empty() {
        return Err(SqlBuilderError::InvalidIdentifier(
            "Empty identifier".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqlBuilderError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Escape a PostgreSQL identifier (table name, column name).
pub fn escape_identifier(name: &str) -> Result<String, SqlBuilderError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Build a JSONB accessor: `->` for traversal, `->>` on the last segment for text.
pub fn build_jsonb_accessor(resource_col: &str, path: &[String], as_text: bool) -> String {
    let mut result = resource_col.to_string();
    for (i, segment) in path.iter().enumerate() {
        if i == path.len() - 1 && as_text {
            result.push_str(&format!("->>'{segment}'"));
        } else {
            result.push_str(&format!("->'{segment}'"));
        }
    }
    result
}

/// Escape `%`, `_` and the escape character itself for LIKE.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// SQL value types for parameterized queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    /// Decimal literal, bound as text and cast to numeric
    Numeric(String),
    Boolean(bool),
    Timestamp(String),
}

impl SqlValue {
    pub fn as_display_str(&self) -> String {
        match self {
            Self::Text(s) | Self::Numeric(s) | Self::Timestamp(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
        }
    }
}

impl From<&PredicateValue> for SqlValue {
    fn from(value: &PredicateValue) -> Self {
        match value {
            PredicateValue::Text(s) => Self::Text(s.clone()),
            PredicateValue::Number(d) => Self::Numeric(d.normalize().to_string()),
            PredicateValue::Boolean(b) => Self::Boolean(*b),
            PredicateValue::Date(s) => Self::Timestamp(s.clone()),
        }
    }
}

/// A built SQL query with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

fn comparator_sql(op: ComparatorOp) -> &'static str {
    match op {
        ComparatorOp::Gt => ">",
        ComparatorOp::Ge => ">=",
        ComparatorOp::Lt => "<",
        ComparatorOp::Le => "<=",
        ComparatorOp::Ne => "!=",
    }
}

fn like_pattern(kind: PatternKind, value: &str) -> String {
    let escaped = escape_like(value);
    match kind {
        PatternKind::StartsWith => format!("{escaped}%"),
        PatternKind::EndsWith => format!("%{escaped}"),
        PatternKind::Contains => format!("%{escaped}%"),
    }
}

/// Renders `SearchPlan`s into PostgreSQL.
#[derive(Debug, Clone)]
pub struct SqlRenderer {
    schema: String,
}

impl Default for SqlRenderer {
    fn default() -> Self {
        Self::new("public")
    }
}

impl SqlRenderer {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn render(&self, resource_type: &str, plan: &SearchPlan) -> Result<BuiltQuery, SqlBuilderError> {
        if plan.joins.len() > MAX_JOINS {
            return Err(SqlBuilderError::QueryTooComplex(format!(
                "Too many JOINs: {} (max {})",
                plan.joins.len(),
                MAX_JOINS
            )));
        }
        let conditions: usize = plan.match_groups.iter().flatten().map(leaf_count).sum();
        if conditions > MAX_CONDITIONS {
            return Err(SqlBuilderError::QueryTooComplex(format!(
                "Too many conditions: {conditions} (max {MAX_CONDITIONS})"
            )));
        }

        let mut ctx = RenderContext {
            joins: &plan.joins,
            params: Vec::new(),
        };
        let count_only = plan.summary() == Some(SummaryMode::Count);

        let select_clause = if count_only {
            "COUNT(*) AS total".to_string()
        } else {
            format!("{BASE_ALIAS}.id, {}", self.projection(plan)?)
        };
        let from_clause = self.from_clause(resource_type, &plan.joins)?;

        let mut sql = format!("SELECT {select_clause} FROM {from_clause}");

        let groups = plan
            .match_groups
            .iter()
            .map(|group| ctx.render(&Predicate::or(group.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        if !groups.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&groups.join(" AND "));
        }

        if !count_only {
            let order = plan
                .sort()
                .iter()
                .map(|key| {
                    let accessor = ctx.accessor(&key.field, true)?;
                    let direction = match key.direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    Ok(format!("{accessor} {direction} NULLS LAST"))
                })
                .collect::<Result<Vec<_>, SqlBuilderError>>()?;
            if !order.is_empty() {
                sql.push_str(" ORDER BY ");
                sql.push_str(&order.join(", "));
            }
            if let Some(limit) = plan.count() {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            if let Some(offset) = plan.offset().filter(|o| *o > 0) {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }

        tracing::debug!(resource_type = %resource_type, params = ctx.params.len(), "Rendered SQL query");
        Ok(BuiltQuery {
            sql,
            params: ctx.params,
        })
    }

    fn from_clause(&self, resource_type: &str, joins: &[JoinSpec]) -> Result<String, SqlBuilderError> {
        let schema = escape_identifier(&self.schema)?;
        let table = escape_identifier(&resource_type.to_lowercase())?;
        let mut from = format!("{schema}.{table} AS {BASE_ALIAS}");

        for (i, join) in joins.iter().enumerate() {
            validate_identifier(&join.from_collection)?;
            let join_table = escape_identifier(&join.from_collection.to_lowercase())?;
            let join_alias = format!("j{i}");
            let foreign = escape_identifier(&join.foreign_field)?;
            let local = JsonbPath::parse(&join.local_field)?.to_accessor(&format!("{BASE_ALIAS}.resource"), true);
            from.push_str(&format!(
                " INNER JOIN {schema}.{join_table} AS {join_alias} ON ({local}) = CONCAT('{}/', {join_alias}.{foreign}::text)",
                join.from_collection
            ));
        }
        Ok(from)
    }

    /// `_elements` keeps the listed top-level elements plus the mandatory ones.
    fn projection(&self, plan: &SearchPlan) -> Result<String, SqlBuilderError> {
        let resource = format!("{BASE_ALIAS}.resource");
        let elements = plan.elements();
        if elements.is_empty() {
            return Ok(resource);
        }
        let mut pairs = Vec::new();
        for element in ["resourceType", "id", "meta"]
            .into_iter()
            .chain(elements.iter().map(String::as_str))
        {
            validate_identifier(element)?;
            let pair = format!("'{element}', {resource}->'{element}'");
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        Ok(format!("jsonb_build_object({}) AS resource", pairs.join(", ")))
    }
}

fn leaf_count(predicate: &Predicate) -> usize {
    match predicate {
        Predicate::And { children } | Predicate::Or { children } => {
            children.iter().map(leaf_count).sum()
        }
        _ => 1,
    }
}

struct RenderContext<'p> {
    joins: &'p [JoinSpec],
    params: Vec<SqlValue>,
}

impl RenderContext<'_> {
    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Accessor for a field on the base table or on the join it is prefixed with.
    fn accessor(&self, field: &str, as_text: bool) -> Result<String, SqlBuilderError> {
        for (i, join) in self.joins.iter().enumerate() {
            if let Some(rest) = join.strip_alias(field) {
                return Ok(JsonbPath::parse(rest)?.to_accessor(&format!("j{i}.resource"), as_text));
            }
        }
        Ok(JsonbPath::parse(field)?.to_accessor(&format!("{BASE_ALIAS}.resource"), as_text))
    }

    /// Left-hand side and bind placeholder, cast for the value's type.
    fn operands(&mut self, field: &str, value: &PredicateValue) -> Result<(String, String), SqlBuilderError> {
        let accessor = self.accessor(field, true)?;
        let placeholder = self.bind(value.into());
        Ok(match value {
            PredicateValue::Text(_) => (accessor, placeholder),
            PredicateValue::Number(_) => (format!("({accessor})::numeric"), format!("{placeholder}::numeric")),
            PredicateValue::Boolean(_) => (format!("({accessor})::boolean"), placeholder),
            PredicateValue::Date(_) => (
                format!("({accessor})::timestamptz"),
                format!("{placeholder}::timestamptz"),
            ),
        })
    }

    fn render(&mut self, predicate: &Predicate) -> Result<String, SqlBuilderError> {
        match predicate {
            Predicate::Equals { field, value, invert } => {
                let (lhs, rhs) = self.operands(field, value)?;
                let op = if *invert { "!=" } else { "=" };
                Ok(format!("({lhs} {op} {rhs})"))
            }
            Predicate::Range {
                field,
                lower,
                upper,
                invert,
            } => {
                let (lhs, low) = self.operands(field, lower)?;
                let (_, high) = self.operands(field, upper)?;
                if *invert {
                    Ok(format!("({lhs} < {low} OR {lhs} > {high})"))
                } else {
                    Ok(format!("({lhs} >= {low} AND {lhs} <= {high})"))
                }
            }
            Predicate::Comparator { field, value, op } => {
                let (lhs, rhs) = self.operands(field, value)?;
                Ok(format!("({lhs} {} {rhs})", comparator_sql(*op)))
            }
            Predicate::Exists { field, exists } => {
                let accessor = self.accessor(field, false)?;
                let check = if *exists { "IS NOT NULL" } else { "IS NULL" };
                Ok(format!("({accessor} {check})"))
            }
            Predicate::Pattern {
                field,
                kind,
                value,
                case_sensitive,
            } => {
                let accessor = self.accessor(field, true)?;
                let op = if *case_sensitive { "LIKE" } else { "ILIKE" };
                let placeholder = self.bind(SqlValue::Text(like_pattern(*kind, value)));
                Ok(format!("({accessor} {op} {placeholder})"))
            }
            Predicate::And { children } => self.join_children(children, " AND ", "TRUE"),
            Predicate::Or { children } => self.join_children(children, " OR ", "FALSE"),
        }
    }

    fn join_children(
        &mut self,
        children: &[Predicate],
        separator: &str,
        empty: &str,
    ) -> Result<String, SqlBuilderError> {
        match children {
            [] => Ok(empty.to_string()),
            [only] => self.render(only),
            _ => {
                let parts = children
                    .iter()
                    .map(|c| self.render(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", parts.join(separator)))
            }
        }
    }
}
