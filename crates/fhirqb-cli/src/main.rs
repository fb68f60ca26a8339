mod cli;
mod commands;
mod config;
mod observability;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Scope checks need no configuration.
    if let Commands::Scope(args) = &cli.command {
        return Ok(commands::scope::scope(args));
    }

    let config = config::load_config(cli.config.as_deref())?;
    observability::init_tracing_with_level(&config.logging.level);
    tracing::debug!(?config, "Configuration loaded");

    match &cli.command {
        Commands::Plan(args) => commands::plan::plan(args, &config),
        Commands::Params(args) => {
            commands::params::params(args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Scope(args) => Ok(commands::scope::scope(args)),
    }
}
