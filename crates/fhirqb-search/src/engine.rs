use fhirqb_core::{SearchErrors, now_utc};
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::assembler::PlanAssembler;
use crate::parser::SearchRequest;
use crate::plan::SearchPlan;
use crate::registry::ParameterRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// `_count` applied when the request has none
    pub default_count: usize,
    pub max_count: usize,
    /// Key on a referenced collection that `Type/id` references resolve to
    pub join_foreign_key: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_count: 10,
            max_count: 100,
            join_foreign_key: "id".to_string(),
        }
    }
}

/// Compiles search requests against a shared parameter registry.
///
/// Cheap to clone; every compilation is independent and needs no locking.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    registry: Arc<ParameterRegistry>,
    config: SearchConfig,
}

impl QueryBuilder {
    pub fn new(registry: Arc<ParameterRegistry>, config: SearchConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn compile(
        &self,
        resource_type: &str,
        request: &SearchRequest,
    ) -> Result<SearchPlan, SearchErrors> {
        self.compile_at(resource_type, request, now_utc())
    }

    /// Compile with an explicit "now", the anchor for `ap` on dates.
    pub fn compile_at(
        &self,
        resource_type: &str,
        request: &SearchRequest,
        now: OffsetDateTime,
    ) -> Result<SearchPlan, SearchErrors> {
        let params = request.parameters().map_err(|e| {
            tracing::warn!(method = %request.method, error = %e, "Search request rejected");
            SearchErrors::single(e)
        })?;
        PlanAssembler::new(&self.registry, &self.config, resource_type, now).assemble(&params)
    }
}
