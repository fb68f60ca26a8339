use std::process::ExitCode;

use fhirqb_core::check_scope;

use crate::cli::ScopeArgs;
use crate::output::{print_error, print_success};

pub fn scope(args: &ScopeArgs) -> ExitCode {
    match check_scope(&args.resource, &args.action, &args.scopes) {
        Ok(()) => {
            print_success(&format!("{} access to {} granted", args.action, args.resource));
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(&e.to_string());
            ExitCode::from(2)
        }
    }
}
