#![forbid(unsafe_code)]

pub mod build;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod template;
pub mod value;

pub use crate::build::{plan_from_str, PlanBuilder};
pub use crate::config::{ConfigSource, FsKeyLoader, KeyLoader, ValueStore};
pub use crate::document::{parse_plan_str, DocumentFormat, ParsedDocument, PlanDocument};
pub use crate::error::{
    BuildError, ConfigError, ParseError, StructuralError, ValidationError, Violation,
};
pub use crate::graph::{
    ActionNode, DependencyEdge, DependencyGraph, Export, Node, NodeKind, OrderingEdge, Plan,
    PlanSummary, RemoteTarget, ResourceNode, Target,
};
pub use crate::template::{Rendered, Template, TemplateError};
pub use crate::value::{Datum, Redactor, SecretValue, Value, ValueState, REDACTED};
