//! End-to-end compilation of search requests against a loaded registry.

use fhirqb_core::ValidationError;
use fhirqb_search::{
    ComparatorOp, DefinitionFormat, JoinSpec, PatternKind, PipelineRenderer, Predicate,
    PredicateValue, QueryBuilder, SearchConfig, SearchPlan, SearchRequest, SqlRenderer,
    load_parameters_from_str,
};
use rust_decimal_macros::dec;
use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;

const PARAMETERS: &str = r#"
[[resources.Patient]]
name = "name"
type = "string"
path = "Patient.name"

[[resources.Patient]]
name = "birthdate"
type = "date"
path = "Patient.birthDate"

[[resources.Patient]]
name = "gender"
type = "token"
subtype = "code"
path = "Patient.gender"

[[resources.Observation]]
name = "code"
type = "token"
subtype = "Coding"
path = "Observation.code"

[[resources.Observation]]
name = "value-quantity"
type = "quantity"
path = "Observation.valueQuantity"

[[resources.Observation]]
name = "value-integer"
type = "number"
path = "Observation.valueInteger"

[[resources.Observation]]
name = "subject"
type = "reference"
path = "Observation.subject"
targets = ["Patient"]

[[resources.Observation]]
name = "performer"
type = "reference"
path = "Observation.performer"
targets = ["Patient", "Practitioner"]

[[resources.Observation]]
name = "instantiates"
type = "uri"
path = "Observation.instantiates"
"#;

const NOW: OffsetDateTime = datetime!(2020-01-01 00:00:00 UTC);

fn builder() -> QueryBuilder {
    let registry = load_parameters_from_str(PARAMETERS, DefinitionFormat::Toml).unwrap();
    QueryBuilder::new(registry.into_shared(), SearchConfig::default())
}

fn compile(resource_type: &str, query: &str) -> SearchPlan {
    builder()
        .compile_at(resource_type, &SearchRequest::get(query), NOW)
        .unwrap()
}

fn only_predicate(plan: &SearchPlan) -> &Predicate {
    assert_eq!(plan.match_groups.len(), 1);
    assert_eq!(plan.match_groups[0].len(), 1);
    &plan.match_groups[0][0]
}

fn date(s: &str) -> PredicateValue {
    PredicateValue::Date(s.to_string())
}

#[test]
fn number_eq_pads_by_written_precision() {
    let plan = compile("Observation", "value-integer=eq100");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::range("valueInteger", dec!(99.5), dec!(100.5), false)
    );

    let plan = compile("Observation", "value-integer=eq100.000");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::range("valueInteger", dec!(99.9995), dec!(100.0005), false)
    );
}

#[test]
fn date_eq_year_spans_the_year() {
    let plan = compile("Patient", "birthdate=eq2018");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::range(
            "birthDate",
            date("2018-01-01T00:00:00.000Z"),
            date("2018-12-31T23:59:59.999Z"),
            false
        )
    );
}

#[test]
fn date_ne_is_a_disjunction_of_comparators() {
    let plan = compile("Patient", "birthdate=ne2018-06");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::or(vec![
            Predicate::comparator("birthDate", date("2018-06-01T00:00:00.000Z"), ComparatorOp::Lt),
            Predicate::comparator("birthDate", date("2018-06-30T23:59:59.999Z"), ComparatorOp::Gt),
        ])
    );
}

#[test]
fn quantity_is_bounded_in_si_units() {
    let plan = compile("Observation", "value-quantity=eq20.00||mg");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::range(
            "valueQuantity.value",
            dec!(0.000019995),
            dec!(0.000020005),
            false
        )
    );
}

#[test]
fn quantity_ne_excludes_the_si_range() {
    let plan = compile("Observation", "value-quantity=ne5||g");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::or(vec![
            Predicate::comparator("valueQuantity.value", dec!(0.0045), ComparatorOp::Lt),
            Predicate::comparator("valueQuantity.value", dec!(0.0055), ComparatorOp::Gt),
        ])
    );

    let query = SqlRenderer::default().render("Observation", &plan).unwrap();
    assert_eq!(
        query.sql,
        "SELECT r.id, r.resource FROM \"public\".\"observation\" AS r \
         WHERE (((r.resource->'valueQuantity'->>'value')::numeric < $1::numeric) OR \
         ((r.resource->'valueQuantity'->>'value')::numeric > $2::numeric)) LIMIT 10"
    );
}

#[test]
fn quantity_ap_pads_ten_percent_before_conversion() {
    let plan = compile("Observation", "value-quantity=ap100||mg");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::range("valueQuantity.value", dec!(0.00009), dec!(0.00011), false)
    );
}

#[test]
fn coding_token_puts_system_first() {
    let plan = compile("Observation", "code=bar|baz");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::and(vec![
            Predicate::equals("code.system", "bar"),
            Predicate::equals("code.code", "baz"),
        ])
    );
}

#[test]
fn string_exact_keeps_accents_and_default_strips_them() {
    let plan = compile("Patient", "name:exact=Ev%C3%AB");
    assert_eq!(only_predicate(&plan), &Predicate::equals("name", "Evë"));

    let plan = compile("Patient", "name=Ev%C3%AB");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::pattern("name", PatternKind::StartsWith, "Eve", false)
    );
}

#[test]
fn absolute_and_relative_references_match_the_same() {
    let absolute = compile("Observation", "subject=http://x/y/Patient/123");
    let relative = compile("Observation", "subject=Patient/123");
    assert_eq!(absolute.match_groups, relative.match_groups);
    assert_eq!(
        only_predicate(&relative),
        &Predicate::equals("subject.reference", "Patient/123")
    );
}

#[test]
fn unknown_parameter_yields_exactly_one_error() {
    let errors = builder()
        .compile_at("Patient", &SearchRequest::get("nickname=al&gender=female"), NOW)
        .unwrap_err();
    assert_eq!(errors.errors(), &[ValidationError::unknown_parameter("nickname")]);
}

#[test]
fn empty_groups_keep_and_arity() {
    let plan = compile("Patient", "name=,&gender=female");
    assert_eq!(plan.match_groups.len(), 2);
    assert_eq!(plan.match_groups[0], vec![Predicate::match_all()]);
}

#[test]
fn uri_trailing_slash_and_urn_modifier() {
    let plan = compile("Observation", "instantiates=http://acme.org/fhir/");
    assert_eq!(
        only_predicate(&plan),
        &Predicate::pattern("instantiates", PatternKind::StartsWith, "http://acme.org/fhir/", true)
    );

    let errors = builder()
        .compile_at(
            "Observation",
            &SearchRequest::get("instantiates:below=urn:oid:1.2.3"),
            NOW,
        )
        .unwrap_err();
    assert_eq!(
        errors.errors(),
        &[ValidationError::ModifierConflict {
            field: "instantiates".into()
        }]
    );
}

#[test]
fn chained_search_plans_a_join() {
    let plan = compile("Observation", "subject:Patient.name=smith&subject.gender=female");
    assert_eq!(plan.joins, vec![JoinSpec::new("Patient", "subject.reference", "id")]);
    assert_eq!(
        plan.match_groups[1],
        vec![Predicate::equals("subject_Patient.gender", "female")]
    );
}

#[test]
fn chains_to_one_target_through_two_references() {
    let plan = compile("Observation", "subject.name=alice&performer:Patient.name=bob");
    assert_eq!(
        plan.joins,
        vec![
            JoinSpec::new("Patient", "subject.reference", "id"),
            JoinSpec::new("Patient", "performer.reference", "id"),
        ]
    );
    assert_eq!(
        plan.match_groups,
        vec![
            vec![Predicate::pattern("subject_Patient.name", PatternKind::StartsWith, "alice", false)],
            vec![Predicate::pattern("performer_Patient.name", PatternKind::StartsWith, "bob", false)],
        ]
    );

    let query = SqlRenderer::default().render("Observation", &plan).unwrap();
    assert!(query.sql.contains("AS j0 ON (r.resource->'subject'->>'reference')"));
    assert!(query.sql.contains("AS j1 ON (r.resource->'performer'->>'reference')"));
    assert!(query.sql.contains("WHERE (j0.resource->>'name' ILIKE $1) AND (j1.resource->>'name' ILIKE $2)"));

    let pipeline = PipelineRenderer.render(&plan);
    assert_eq!(pipeline[0]["$lookup"]["as"], "subject_Patient");
    assert_eq!(pipeline[1], json!({"$unwind": "$subject_Patient"}));
    assert_eq!(pipeline[2]["$lookup"]["as"], "performer_Patient");
    assert_eq!(pipeline[3], json!({"$unwind": "$performer_Patient"}));
    assert_eq!(pipeline[5], json!({"$project": {"subject_Patient": 0, "performer_Patient": 0}}));
}

#[test]
fn post_body_and_path_parameters() {
    let request = SearchRequest::post_json(&json!({"gender": "male", "name": ["ann", "bob"]}))
        .unwrap()
        .with_path_param("gender", "female");
    let plan = builder().compile_at("Patient", &request, NOW).unwrap();
    assert_eq!(plan.match_groups.len(), 3);
    assert_eq!(plan.match_groups[0], vec![Predicate::equals("gender", "female")]);
}

#[test]
fn plan_renders_to_both_backends() {
    let plan = compile("Patient", "gender=female&birthdate=ge2000&_sort=-birthdate&_count=5");

    let pipeline = PipelineRenderer.render(&plan);
    assert_eq!(
        pipeline,
        vec![
            json!({"$match": {"$and": [
                {"$or": [{"gender": "female"}]},
                {"$or": [{"birthDate": {"$gte": "2000-01-01T00:00:00.000Z"}}]}
            ]}}),
            json!({"$sort": {"birthDate": -1}}),
            json!({"$limit": 5}),
        ]
    );

    let query = SqlRenderer::default().render("Patient", &plan).unwrap();
    assert_eq!(
        query.sql,
        "SELECT r.id, r.resource FROM \"public\".\"patient\" AS r \
         WHERE (r.resource->>'gender' = $1) AND \
         ((r.resource->>'birthDate')::timestamptz >= $2::timestamptz) \
         ORDER BY r.resource->>'birthDate' DESC NULLS LAST LIMIT 5"
    );
}

#[test]
fn pattern_predicates_serialize_their_kind() {
    let plan = compile("Patient", "name:contains=smi");
    assert_eq!(
        serde_json::to_value(&plan).unwrap()["matchGroups"],
        json!([[{
            "type": "pattern",
            "field": "name",
            "kind": "contains",
            "value": "smi",
            "caseSensitive": false
        }]])
    );
}

#[test]
fn plan_serializes_in_camel_case() {
    let plan = compile("Observation", "value-integer=gt5&_total=accurate");
    assert_eq!(
        serde_json::to_value(&plan).unwrap(),
        json!({
            "joins": [],
            "matchGroups": [[{"type": "comparator", "field": "valueInteger", "value": 5.0, "op": "gt"}]],
            "resultTransforms": {"_total": "accurate", "_count": 10}
        })
    );
}
