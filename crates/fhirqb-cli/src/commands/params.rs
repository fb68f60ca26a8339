use anyhow::Result;

use super::load_registry;
use crate::cli::ParamsArgs;
use crate::config::AppConfig;
use crate::output::print_parameter_table;

pub fn params(args: &ParamsArgs, config: &AppConfig) -> Result<()> {
    let registry = load_registry(args.params.as_deref(), config.parameters.as_deref())?;
    let mut params = registry.global_parameters();
    params.extend(registry.resource_parameters(&args.resource_type));
    print_parameter_table(&args.resource_type, &params);
    Ok(())
}
