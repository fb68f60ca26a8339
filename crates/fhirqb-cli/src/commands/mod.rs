pub mod params;
pub mod plan;
pub mod scope;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fhirqb_search::{ParameterRegistry, load_parameters_from_file};

/// Load definitions from `--params`, the configured file, or the built-in common set.
pub fn load_registry(cli_params: Option<&Path>, configured: Option<&Path>) -> Result<Arc<ParameterRegistry>> {
    let registry = match cli_params.or(configured) {
        Some(path) => load_parameters_from_file(path)
            .with_context(|| format!("loading search parameters from {}", path.display()))?,
        None => ParameterRegistry::with_common(),
    };
    Ok(registry.into_shared())
}
