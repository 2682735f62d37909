use std::path::PathBuf;

use thiserror::Error;

use crate::template::TemplateError;

/// Any error raised while turning a plan description into a validated [`crate::Plan`].
///
/// Every variant is a construction-time failure: no resource or command has been touched when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unable to auto-detect document format (neither valid JSON nor valid YAML)")]
    UnknownFormat,
}

#[derive(Debug, Error)]
#[error("plan document failed validation ({violations_len} violations)")]
pub struct ValidationError {
    pub violations: Vec<Violation>,
    violations_len: usize,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        let violations_len = violations.len();
        Self {
            violations,
            violations_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Missing or unreadable configuration. Messages name keys and paths, never values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key: {key}")]
    Missing { key: String },
    #[error("failed to read key material from {}: {message}", path.display())]
    KeyMaterial { path: PathBuf, message: String },
    #[error("configuration source {source_name} is unusable: {message}")]
    Source { source_name: String, message: String },
}

impl ConfigError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("unknown node: {name}")]
    UnknownNode { name: String },
    #[error("duplicate node name: {name}")]
    DuplicateNode { name: String },
    #[error("node {node} does not declare output {key}")]
    UnknownOutput { node: String, key: String },
    #[error("input {key} of node {node} is bound more than once")]
    DuplicateInput { node: String, key: String },
    #[error("placeholder {placeholder} in node {node} has no input bound to it")]
    UnboundPlaceholder { node: String, placeholder: String },
    #[error("export {name} refers to {node}.{key}, which is not a declared output")]
    UnknownExport {
        name: String,
        node: String,
        key: String,
    },
    #[error("invalid template in node {node}: {source}")]
    Template {
        node: String,
        #[source]
        source: TemplateError,
    },
}
