//! Document-store rendering of a search plan into an aggregation pipeline.
//!
//! Stage order:
//! 1. `$lookup` + `$unwind` per join, the joined document lands under the
//!    target collection's name
//! 2. one `$match` holding `$and` of `$or` groups
//! 3. `$project` removing the joined documents again
//! 4. `$sort`, `$skip`, `$limit`
//! 5. `_summary` / `_elements` projections, or `$count` for `_summary=count`

use serde_json::{Map, Value, json};

use crate::plan::{JoinSpec, SearchPlan, SortDirection, SummaryMode};
use crate::predicate::{ComparatorOp, PatternKind, Predicate};

/// Elements kept by `_summary=text` besides the narrative
const TEXT_SUMMARY_ELEMENTS: [&str; 3] = ["text", "id", "meta"];

fn comparator_operator(op: ComparatorOp) -> &'static str {
    match op {
        ComparatorOp::Gt => "$gt",
        ComparatorOp::Ge => "$gte",
        ComparatorOp::Lt => "$lt",
        ComparatorOp::Le => "$lte",
        ComparatorOp::Ne => "$ne",
    }
}

/// Anchored, escaped regular expression for a pattern kind.
fn pattern_regex(kind: PatternKind, value: &str) -> String {
    let escaped = regex::escape(value);
    match kind {
        PatternKind::StartsWith => format!("^{escaped}"),
        PatternKind::EndsWith => format!("{escaped}$"),
        PatternKind::Contains => escaped,
    }
}

fn field_condition(field: &str, condition: Value) -> Value {
    let mut doc = Map::new();
    doc.insert(field.to_string(), condition);
    Value::Object(doc)
}

/// Render one predicate into a query document.
pub fn render_predicate(predicate: &Predicate) -> Value {
    if predicate.is_match_all() {
        return json!({});
    }
    match predicate {
        Predicate::Equals {
            field,
            value,
            invert,
        } => {
            if *invert {
                field_condition(field, json!({ "$ne": value.to_json() }))
            } else {
                field_condition(field, value.to_json())
            }
        }
        Predicate::Range {
            field,
            lower,
            upper,
            invert,
        } => {
            if *invert {
                json!({ "$or": [
                    field_condition(field, json!({ "$lt": lower.to_json() })),
                    field_condition(field, json!({ "$gt": upper.to_json() })),
                ]})
            } else {
                field_condition(field, json!({ "$gte": lower.to_json(), "$lte": upper.to_json() }))
            }
        }
        Predicate::Comparator { field, value, op } => {
            let mut condition = Map::new();
            condition.insert(comparator_operator(*op).to_string(), value.to_json());
            field_condition(field, Value::Object(condition))
        }
        Predicate::Exists { field, exists } => field_condition(field, json!({ "$exists": exists })),
        Predicate::Pattern {
            field,
            kind,
            value,
            case_sensitive,
        } => {
            let mut condition = Map::new();
            condition.insert("$regex".into(), Value::String(pattern_regex(*kind, value)));
            if !case_sensitive {
                condition.insert("$options".into(), Value::String("i".into()));
            }
            field_condition(field, Value::Object(condition))
        }
        Predicate::And { children } => {
            json!({ "$and": children.iter().map(render_predicate).collect::<Vec<_>>() })
        }
        Predicate::Or { children } => {
            json!({ "$or": children.iter().map(render_predicate).collect::<Vec<_>>() })
        }
    }
}

/// Renders `SearchPlan`s into aggregation pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineRenderer;

impl PipelineRenderer {
    pub fn render(&self, plan: &SearchPlan) -> Vec<Value> {
        let mut stages = Vec::new();

        for join in &plan.joins {
            stages.extend(lookup_stages(join));
        }

        if !plan.match_groups.is_empty() {
            let groups: Vec<Value> = plan
                .match_groups
                .iter()
                .map(|group| json!({ "$or": group.iter().map(render_predicate).collect::<Vec<_>>() }))
                .collect();
            stages.push(json!({ "$match": { "$and": groups } }));
        }

        if !plan.joins.is_empty() {
            let mut hidden = Map::new();
            for join in &plan.joins {
                hidden.insert(join.alias.clone(), json!(0));
            }
            stages.push(json!({ "$project": hidden }));
        }

        if plan.summary() == Some(SummaryMode::Count) {
            stages.push(json!({ "$count": "total" }));
            tracing::debug!(stages = stages.len(), "Rendered count pipeline");
            return stages;
        }

        let sort = plan.sort();
        if !sort.is_empty() {
            let mut keys = Map::new();
            for key in sort {
                let direction = match key.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                keys.insert(key.field.clone(), json!(direction));
            }
            stages.push(json!({ "$sort": keys }));
        }
        if let Some(offset) = plan.offset().filter(|o| *o > 0) {
            stages.push(json!({ "$skip": offset }));
        }
        if let Some(limit) = plan.count() {
            stages.push(json!({ "$limit": limit }));
        }

        match plan.summary() {
            Some(SummaryMode::Text) => {
                let kept: Map<String, Value> = TEXT_SUMMARY_ELEMENTS
                    .iter()
                    .map(|e| (e.to_string(), json!(1)))
                    .collect();
                stages.push(json!({ "$project": kept }));
            }
            Some(SummaryMode::Data) => stages.push(json!({ "$project": { "text": 0 } })),
            _ => {}
        }

        let elements = plan.elements();
        if !elements.is_empty() {
            let mut kept = Map::new();
            for element in ["resourceType", "id", "meta"]
                .into_iter()
                .chain(elements.iter().map(String::as_str))
            {
                kept.insert(element.to_string(), json!(1));
            }
            stages.push(json!({ "$project": kept }));
        }

        tracing::debug!(stages = stages.len(), "Rendered aggregation pipeline");
        stages
    }
}

/// `Type/id` references are matched against `<Type>/` + the foreign key.
fn lookup_stages(join: &JoinSpec) -> [Value; 2] {
    [
        json!({ "$lookup": {
            "from": join.from_collection,
            "let": { "reference": format!("${}", join.local_field) },
            "pipeline": [{ "$match": { "$expr": { "$eq": [
                "$$reference",
                { "$concat": [format!("{}/", join.from_collection), format!("${}", join.foreign_field)] }
            ]}}}],
            "as": join.alias,
        }}),
        json!({ "$unwind": format!("${}", join.alias) }),
    ]
}
