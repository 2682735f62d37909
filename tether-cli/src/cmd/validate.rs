use std::path::Path;

use serde::Serialize;
use tether_core::document::validate_document;

use super::config::read_document;
use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::OutputArgs;

#[derive(Serialize)]
struct ValidateResult {
    valid: bool,
    format: String,
    nodes: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

pub fn validate_cmd(path: &Path, output: OutputArgs) -> i32 {
    let parsed = match read_document(path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let doc = &parsed.document;
    let nodes = doc.resources.len() + doc.actions.len();

    match validate_document(doc) {
        Ok(()) => {
            let result = ValidateResult {
                valid: true,
                format: format!("{:?}", parsed.format),
                nodes,
                errors: vec![],
            };
            if output.format == OutputFormat::Json {
                print_result(output.format, output.quiet, &result);
            } else if !output.quiet {
                println!("ok: plan {} is valid ({nodes} nodes, {:?})", doc.name, parsed.format);
            }
            exit_codes::SUCCESS
        }
        Err(err) => {
            let errors: Vec<String> = err
                .violations
                .iter()
                .map(|v| format!("{}: {}", v.path, v.message))
                .collect();
            if output.format == OutputFormat::Json {
                let result = ValidateResult {
                    valid: false,
                    format: format!("{:?}", parsed.format),
                    nodes,
                    errors,
                };
                print_result(output.format, output.quiet, &result);
            } else if !output.quiet {
                eprintln!("error: validation failed");
                for e in &errors {
                    eprintln!("- {e}");
                }
            }
            exit_codes::VALIDATION_FAILED
        }
    }
}
