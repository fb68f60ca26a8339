use std::process::ExitCode;

use anyhow::{Context, Result};
use fhirqb_search::parser::parse_json_params;
use fhirqb_search::{
    PipelineRenderer, QueryBuilder, RequestMethod, SearchRequest, SqlRenderer, parse_query,
};

use super::load_registry;
use crate::cli::{PlanArgs, RenderFormat};
use crate::config::AppConfig;
use crate::output::{print_json, print_search_errors};

pub fn plan(args: &PlanArgs, config: &AppConfig) -> Result<ExitCode> {
    let registry = load_registry(args.params.as_deref(), config.parameters.as_deref())?;
    let request = build_request(args)?;
    let builder = QueryBuilder::new(registry, config.search.clone());

    let plan = match builder.compile(&args.resource_type, &request) {
        Ok(plan) => plan,
        Err(errors) => {
            print_search_errors(&errors);
            return Ok(if errors.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            });
        }
    };

    match args.render {
        RenderFormat::Plan => print_json(&plan)?,
        RenderFormat::Pipeline => print_json(&PipelineRenderer.render(&plan))?,
        RenderFormat::Sql => {
            let query = SqlRenderer::new(config.sql.schema.as_str())
                .render(&args.resource_type, &plan)
                .context("rendering SQL")?;
            println!("{};", query.sql);
            for (i, param) in query.params.iter().enumerate() {
                println!("-- ${} = {}", i + 1, param.as_display_str());
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn build_request(args: &PlanArgs) -> Result<SearchRequest> {
    let method = RequestMethod::parse(&args.method);
    let mut request = SearchRequest::new(method.clone());
    match method {
        RequestMethod::Post => match &args.json_body {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let body: serde_json::Value = serde_json::from_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))?;
                request.body = parse_json_params(&body)?;
            }
            None => request.body = parse_query(&args.query),
        },
        _ => request.query = parse_query(&args.query),
    }

    for pair in &args.path_params {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("path parameter '{pair}' must be key=value"))?;
        request = request.with_path_param(name, value);
    }
    Ok(request)
}
