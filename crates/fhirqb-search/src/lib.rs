//! FHIR search compilation.
//!
//! A request's parameters are sanitized, compiled into predicates per FHIR
//! type and assembled into a [`SearchPlan`]: joins, an AND of OR groups and
//! result transforms. [`PipelineRenderer`] and [`SqlRenderer`] turn a plan
//! into a backend query.

pub mod assembler;
pub mod chaining;
pub mod common;
pub mod engine;
pub mod loader;
pub mod parameters;
pub mod parser;
pub mod pipeline;
pub mod plan;
pub mod predicate;
pub mod registry;
pub mod sanitize;
pub mod sql_builder;
pub mod types;
pub mod units;

pub use engine::{QueryBuilder, SearchConfig};
pub use loader::{DefinitionFormat, LoaderError, load_parameters_from_file, load_parameters_from_str};
pub use parameters::{
    ParameterDefinition, SearchModifier, SearchParameterType, SearchPrefix, TokenSubtype,
};
pub use parser::{RawParameters, RawValue, RequestMethod, SearchRequest, parse_query};
pub use pipeline::PipelineRenderer;
pub use plan::{JoinSpec, ResultTransform, SearchPlan, SortDirection, SortKey, SummaryMode, TotalMode};
pub use predicate::{ComparatorOp, PatternKind, Predicate, PredicateValue};
pub use registry::{ParameterRegistry, ResolvedParameter};
pub use sql_builder::{BuiltQuery, SqlBuilderError, SqlRenderer, SqlValue};
