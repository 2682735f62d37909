use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tether_core::{NodeKind, Value, ValueState};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
    TimedOut,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    UpstreamFailed { node: String },
    Timeout,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UpstreamFailed { node } => write!(f, "upstream {node} failed"),
            SkipReason::Timeout => f.write_str("timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Resource created.
    Created,
    /// Action ran and exited zero.
    Completed,
    Failed { error: String },
    Skipped { skip: SkipReason },
}

impl NodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NodeOutcome::Created | NodeOutcome::Completed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeOutcome::Created => "created",
            NodeOutcome::Completed => "completed",
            NodeOutcome::Failed { .. } => "failed",
            NodeOutcome::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub kind: NodeKind,
    #[serde(flatten)]
    pub outcome: NodeOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Sensitive outputs serialize as `<redacted>`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportedValue {
    /// Sensitive unless the export was declared `reveal`; serializes redacted if so.
    Value(Value),
    Unavailable { reason: String },
}

impl ExportedValue {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ExportedValue::Value(v) => Some(v),
            ExportedValue::Unavailable { .. } => None,
        }
    }
}

/// Outcome of one run: every node, every output slot and every export.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub plan: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Declaration order.
    pub nodes: Vec<NodeReport>,
    /// Nodes in the order they actually started.
    pub start_order: Vec<String>,
    /// `node.output` to final state.
    pub slots: BTreeMap<String, ValueState>,
    pub exports: BTreeMap<String, ExportedValue>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn outcome(&self, name: &str) -> Option<&NodeOutcome> {
        self.node(name).map(|n| &n.outcome)
    }

    pub fn export(&self, name: &str) -> Option<&ExportedValue> {
        self.exports.get(name)
    }

    pub fn failed(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.outcome, NodeOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.outcome, NodeOutcome::Skipped { .. }))
    }

    /// Human-readable summary. Contains only redacted renderings.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "run {} of plan {}: {}",
            self.run_id,
            self.plan,
            self.status.as_str()
        );
        for n in &self.nodes {
            let _ = write!(out, "  {:<24} {:<9}", n.name, n.outcome.label());
            if let Some(ms) = n.duration_ms {
                let _ = write!(out, " {ms}ms");
            }
            match &n.outcome {
                NodeOutcome::Failed { error } => {
                    let _ = write!(out, "  {error}");
                }
                NodeOutcome::Skipped { skip } => {
                    let _ = write!(out, "  ({skip})");
                }
                _ => {}
            }
            out.push('\n');
        }
        if !self.exports.is_empty() {
            out.push_str("exports:\n");
            for (name, e) in &self.exports {
                match e {
                    ExportedValue::Value(v) => {
                        let _ = writeln!(out, "  {name} = {}", v.display_text());
                    }
                    ExportedValue::Unavailable { reason } => {
                        let _ = writeln!(out, "  {name} unavailable ({reason})");
                    }
                }
            }
        }
        out
    }
}
