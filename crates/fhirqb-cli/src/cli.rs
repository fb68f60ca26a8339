use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fhirqb")]
#[command(about = "Compile FHIR search requests into backend queries")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./fhirqb.toml when present)
    #[arg(short, long, global = true, env = "FHIRQB_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a search request and print the plan or a rendered query
    Plan(PlanArgs),
    /// List the search parameters a resource type accepts
    Params(ParamsArgs),
    /// Check a resource/action against granted SMART scopes
    Scope(ScopeArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    /// The backend-agnostic search plan
    #[default]
    Plan,
    /// Document-store aggregation pipeline
    Pipeline,
    /// PostgreSQL query with bind parameters
    Sql,
}

#[derive(clap::Args)]
pub struct PlanArgs {
    /// Resource type (e.g. Patient)
    pub resource_type: String,
    /// Query string (e.g. "name=Smith&birthdate=ge1990"); the form body for POST
    #[arg(default_value = "")]
    pub query: String,
    /// HTTP method of the search request
    #[arg(short, long, default_value = "GET")]
    pub method: String,
    /// JSON object body for a POST search, replaces the form body
    #[arg(long)]
    pub json_body: Option<PathBuf>,
    /// Path parameters as key=value, these win over query and body
    #[arg(long = "path-param")]
    pub path_params: Vec<String>,
    /// Search parameter definitions (.toml or .json)
    #[arg(long)]
    pub params: Option<PathBuf>,
    /// Output rendering
    #[arg(short, long, value_enum, default_value_t = RenderFormat::Plan)]
    pub render: RenderFormat,
}

#[derive(clap::Args)]
pub struct ParamsArgs {
    /// Resource type (e.g. Patient)
    pub resource_type: String,
    /// Search parameter definitions (.toml or .json)
    #[arg(long)]
    pub params: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ScopeArgs {
    /// Resource type, or * for any
    pub resource: String,
    /// read, write or *
    pub action: String,
    /// Granted scopes (e.g. patient/Observation.read)
    pub scopes: Vec<String>,
}
