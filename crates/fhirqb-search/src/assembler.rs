//! Request plan assembly.
//!
//! Walks the request parameters in order and turns each into either a match
//! group (plus a join for chained parameters) or a result transform. Errors
//! are collected per parameter so a caller sees every problem at once; any
//! error means no plan is returned.

use fhirqb_core::{Result, SearchErrors, ValidationError};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::chaining::{is_chained_parameter, parse_chained_parameter};
use crate::engine::SearchConfig;
use crate::parameters::{ParameterDefinition, SearchModifier};
use crate::parser::{RawParameters, RawValue, split_name_and_modifier};
use crate::plan::{ResultTransform, SearchPlan, SortKey, SummaryMode, TotalMode};
use crate::predicate::Predicate;
use crate::registry::{ParameterRegistry, ResolvedParameter};
use crate::types::{AtomContext, compile_atom};

/// Builds one `SearchPlan` for one resource type.
pub struct PlanAssembler<'a> {
    registry: &'a ParameterRegistry,
    config: &'a SearchConfig,
    resource_type: &'a str,
    now: OffsetDateTime,
}

/// A filtering parameter after resolution, ready for its values.
struct Target<'d> {
    name: &'d str,
    field: String,
    definition: &'d ParameterDefinition,
    modifier: Option<SearchModifier>,
}

impl<'a> PlanAssembler<'a> {
    pub fn new(
        registry: &'a ParameterRegistry,
        config: &'a SearchConfig,
        resource_type: &'a str,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            registry,
            config,
            resource_type,
            now,
        }
    }

    pub fn assemble(&self, params: &RawParameters) -> std::result::Result<SearchPlan, SearchErrors> {
        let mut plan = SearchPlan::new();
        let mut errors = Vec::new();

        for (key, raw) in params {
            let before = errors.len();
            self.assemble_parameter(&mut plan, key, raw, &mut errors);
            for error in &errors[before..] {
                warn!(parameter = %key, error = %error, "Search parameter rejected");
            }
        }

        for def in self.registry.required_parameters(self.resource_type) {
            let present = params
                .keys()
                .any(|key| split_name_and_modifier(key).0 == def.name);
            if !present {
                let error = ValidationError::MissingRequiredParameter {
                    name: def.name.clone(),
                };
                warn!(error = %error, "Search parameter rejected");
                errors.push(error);
            }
        }

        if plan.count().is_none() {
            plan.set_transform("_count", ResultTransform::Count(self.config.default_count));
        }

        info!(
            resource_type = %self.resource_type,
            groups = plan.match_groups.len(),
            joins = plan.joins.len(),
            transforms = plan.result_transforms.len(),
            errors = errors.len(),
            "Search request compiled"
        );

        if errors.is_empty() {
            Ok(plan)
        } else {
            Err(SearchErrors(errors))
        }
    }

    fn assemble_parameter(
        &self,
        plan: &mut SearchPlan,
        key: &str,
        raw: &RawValue,
        errors: &mut Vec<ValidationError>,
    ) {
        if is_chained_parameter(key) {
            let chained = match parse_chained_parameter(
                key,
                self.registry,
                self.resource_type,
                &self.config.join_foreign_key,
            ) {
                Ok(chained) => chained,
                Err(e) => return errors.push(e),
            };
            if plan.add_join(chained.join.clone()) {
                debug!(
                    from = %chained.join.from_collection,
                    local = %chained.join.local_field,
                    foreign = %chained.join.foreign_field,
                    "Planned join"
                );
            }
            let target = Target {
                name: key,
                field: chained.joined_field(),
                definition: &chained.target,
                modifier: chained.modifier.clone(),
            };
            return self.compile_groups(plan, &target, raw, errors);
        }

        let (name, modifier) = split_name_and_modifier(key);
        let definition = match self.registry.resolve(self.resource_type, name) {
            None => return errors.push(ValidationError::unknown_parameter(name)),
            Some(ResolvedParameter::Result(name)) => {
                if let Some(modifier) = modifier {
                    return errors.push(ValidationError::unsupported_modifier(modifier, name));
                }
                match self.result_transform(&name, raw) {
                    Ok(transform) => plan.set_transform(name, transform),
                    Err(e) => errors.push(e),
                }
                return;
            }
            Some(ResolvedParameter::Global(def)) | Some(ResolvedParameter::Resource(def)) => def,
        };

        let modifier = match definition.check_modifier(modifier) {
            Ok(modifier) => modifier,
            Err(e) => return errors.push(e),
        };
        debug!(
            parameter = %name,
            param_type = %definition.param_type,
            modifier = ?modifier,
            "Resolved search parameter"
        );

        let target = Target {
            name,
            field: definition.field().to_string(),
            definition: &definition,
            modifier,
        };
        self.compile_groups(plan, &target, raw, errors);
    }

    /// One OR group per value; atoms inside a value are comma separated.
    fn compile_groups(
        &self,
        plan: &mut SearchPlan,
        target: &Target<'_>,
        raw: &RawValue,
        errors: &mut Vec<ValidationError>,
    ) {
        let ctx = AtomContext {
            name: target.name,
            field: &target.field,
            param_type: target.definition.param_type,
            subtype: target.definition.subtype.as_deref(),
            modifier: target.modifier.as_ref(),
            now: self.now,
        };

        for value in raw.values() {
            let mut group: Vec<Predicate> = Vec::new();
            for atom in value.split(',').map(str::trim).filter(|a| !a.is_empty()) {
                match compile_atom(&ctx, atom) {
                    Ok(predicate) => group.push(predicate),
                    Err(e) => errors.push(e),
                }
            }
            plan.add_group(group);
        }
    }

    fn result_transform(&self, name: &str, raw: &RawValue) -> Result<ResultTransform> {
        let value = raw.first().unwrap_or_default().trim();
        match name {
            "_count" => {
                let count: usize = value
                    .parse()
                    .map_err(|_| ValidationError::invalid_value(name, "must be a positive integer"))?;
                if count == 0 {
                    return Err(ValidationError::invalid_value(name, "must be >= 1"));
                }
                if count > self.config.max_count {
                    return Err(ValidationError::invalid_value(
                        name,
                        format!("must be <= {}", self.config.max_count),
                    ));
                }
                Ok(ResultTransform::Count(count))
            }
            "_offset" => value
                .parse()
                .map(ResultTransform::Offset)
                .map_err(|_| ValidationError::invalid_value(name, "must be a non-negative integer")),
            "_sort" => {
                let keys: Vec<SortKey> = split_list(value)
                    .map(|item| match item.strip_prefix('-') {
                        Some(field) => SortKey::desc(self.sort_field(field)),
                        None => SortKey::asc(self.sort_field(item)),
                    })
                    .collect();
                if keys.is_empty() {
                    return Err(ValidationError::invalid_value(name, "must name at least one field"));
                }
                Ok(ResultTransform::Sort(keys))
            }
            "_summary" => SummaryMode::parse(value)
                .map(ResultTransform::Summary)
                .ok_or_else(|| ValidationError::invalid_value(name, format!("unsupported mode '{value}'"))),
            "_total" => TotalMode::parse(value)
                .map(ResultTransform::Total)
                .ok_or_else(|| ValidationError::invalid_value(name, format!("unsupported mode '{value}'"))),
            "_elements" => Ok(ResultTransform::Elements(
                split_list(value).map(str::to_string).collect(),
            )),
            _ => Ok(ResultTransform::Passthrough(raw.values().to_vec())),
        }
    }

    /// Sort on a known parameter's field, or on the name as given.
    fn sort_field(&self, name: &str) -> String {
        self.registry
            .get(self.resource_type, name)
            .map(|def| def.field().to_string())
            .unwrap_or_else(|| name.to_string())
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}
