use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tether_core::config::{EnvSource, FileSource, LayeredSource, MapSource};
use tether_core::{
    parse_plan_str, BuildError, ConfigError, ConfigSource, DocumentFormat, FsKeyLoader,
    ParsedDocument, Plan, PlanBuilder, PlanDocument, ValueStore,
};
use tether_exec::{CommandProvider, ExecutorConfig, ProviderRegistry};

use crate::exit_codes;
use crate::output::print_error;
use crate::{ConcurrencyArgs, ConfigArgs, OutputArgs};

pub fn read_document(path: &Path, output: &OutputArgs) -> Result<ParsedDocument, i32> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        print_error(
            output.format,
            output.quiet,
            &format!("failed to read {}: {e}", path.display()),
        );
        exit_codes::RUNTIME_ERROR
    })?;
    parse_plan_str(&content, DocumentFormat::Auto).map_err(|e| {
        print_error(output.format, output.quiet, &format!("{e}"));
        exit_codes::VALIDATION_FAILED
    })
}

pub fn build_store(args: &ConfigArgs, doc: &PlanDocument) -> Result<ValueStore, ConfigError> {
    let mut layers: Vec<Box<dyn ConfigSource>> = vec![Box::new(MapSource::from_pairs(
        args.set_values.iter().map(String::as_str),
    ))];
    if let Some(path) = &args.config {
        let file = FileSource::load(path)?;
        tracing::debug!(path = %file.path().display(), "loaded configuration file");
        layers.push(Box::new(file));
    }
    layers.push(Box::new(EnvSource::with_prefix(args.env_prefix.clone())));
    Ok(ValueStore::new(Box::new(LayeredSource::new(layers))).with_defaults(doc.config.clone()))
}

/// Reads, validates and builds the plan, reporting any failure in the requested format.
pub fn load_plan(
    path: &Path,
    config: &ConfigArgs,
    output: &OutputArgs,
) -> Result<(PlanDocument, Plan), i32> {
    let parsed = read_document(path, output)?;
    let store = build_store(config, &parsed.document).map_err(|e| {
        print_error(output.format, output.quiet, &e.to_string());
        exit_codes::VALIDATION_FAILED
    })?;

    match PlanBuilder::new(&store, &FsKeyLoader).build(&parsed.document) {
        Ok(plan) => Ok((parsed.document, plan)),
        Err(BuildError::Validation(err)) => {
            let details: Vec<String> = err
                .violations
                .iter()
                .map(|v| format!("{}: {}", v.path, v.message))
                .collect();
            print_error(
                output.format,
                output.quiet,
                &format!("{err}: {}", details.join("; ")),
            );
            Err(exit_codes::VALIDATION_FAILED)
        }
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            Err(exit_codes::VALIDATION_FAILED)
        }
    }
}

pub fn parse_host_limits(pairs: &[String]) -> Result<BTreeMap<String, usize>, String> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let (host, n) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected HOST=N, got {pair}"))?;
        let n: usize = n
            .trim()
            .parse()
            .map_err(|_| format!("invalid limit for host {host}: {n}"))?;
        if n == 0 {
            return Err(format!("limit for host {host} must be at least 1"));
        }
        out.insert(host.trim().to_string(), n);
    }
    Ok(out)
}

pub fn build_executor_config(args: &ConcurrencyArgs) -> Result<ExecutorConfig, String> {
    if args.max_concurrency == Some(0) {
        return Err("--max-concurrency must be at least 1".to_string());
    }
    Ok(ExecutorConfig {
        max_concurrency: args.max_concurrency,
        per_host_concurrency: parse_host_limits(&args.max_concurrency_host)?,
        deadline: args.timeout.map(Duration::from_secs),
    })
}

pub fn build_providers(doc: &PlanDocument, timeout: Duration) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (prefix, spec) in &doc.providers {
        let provider = CommandProvider::new(spec.command.clone())
            .args(spec.args.iter().cloned())
            .timeout(timeout);
        registry.register(prefix.clone(), Arc::new(provider));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_limits_parse() {
        let limits =
            parse_host_limits(&["10.0.0.1=2".to_string(), "db = 1".to_string()]).unwrap();
        assert_eq!(limits.get("10.0.0.1"), Some(&2));
        assert_eq!(limits.get("db"), Some(&1));
    }

    #[test]
    fn host_limits_reject_garbage() {
        assert!(parse_host_limits(&["nohost".to_string()]).is_err());
        assert!(parse_host_limits(&["h=x".to_string()]).is_err());
        assert!(parse_host_limits(&["h=0".to_string()]).is_err());
    }

    #[test]
    fn set_values_take_precedence_over_defaults() {
        let doc = parse_plan_str(
            "name: p\nconfig:\n  region: us-east\n  image: debian\nactions:\n  - name: a\n    command: echo\n",
            DocumentFormat::Yaml,
        )
        .unwrap()
        .document;
        let args = ConfigArgs {
            config: None,
            set_values: vec!["region=eu-central".to_string()],
            env_prefix: "TETHER_TEST_UNSET_".to_string(),
        };
        let store = build_store(&args, &doc).unwrap();
        assert_eq!(store.require("region").unwrap().expose_text(), "eu-central");
        assert_eq!(store.require("image").unwrap().expose_text(), "debian");
        assert!(store.require_secret("root").is_err());
    }
}
