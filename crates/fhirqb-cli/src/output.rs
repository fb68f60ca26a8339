use anyhow::Result;
use colored::Colorize;
use fhirqb_core::SearchErrors;
use fhirqb_search::ParameterDefinition;
use serde::Serialize;
use std::sync::Arc;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// One line per error, tagged with its category.
pub fn print_search_errors(errors: &SearchErrors) {
    for error in errors.errors() {
        eprintln!("{} [{}] {}", "✗".red(), error.category(), error);
    }
}

pub fn print_parameter_table(resource_type: &str, params: &[Arc<ParameterDefinition>]) {
    if params.is_empty() {
        println!("No search parameters for {resource_type}.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Name", "Type", "Subtype", "Field", "Modifiers", "Targets"]);
    for def in params {
        let modifiers = def
            .modifiers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let targets = def.targets.join(", ");
        builder.push_record([
            def.name.as_str(),
            def.param_type.as_str(),
            def.subtype.as_deref().unwrap_or("-"),
            def.field(),
            if modifiers.is_empty() { "(defaults)" } else { modifiers.as_str() },
            targets.as_str(),
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
    println!("{}: {}", resource_type.cyan(), params.len());
}
