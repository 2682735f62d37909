use async_trait::async_trait;
use serde::Serialize;
use tether_core::NodeKind;
use uuid::Uuid;

use crate::executor::report::RunStatus;

/// Run lifecycle notifications. Every string field is already redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "run.started")]
    RunStarted {
        run_id: Uuid,
        plan: String,
        nodes: usize,
    },
    #[serde(rename = "run.finished")]
    RunFinished { run_id: Uuid, status: RunStatus },
    #[serde(rename = "node.started")]
    NodeStarted {
        run_id: Uuid,
        node: String,
        kind: NodeKind,
    },
    #[serde(rename = "node.succeeded")]
    NodeSucceeded {
        run_id: Uuid,
        node: String,
        duration_ms: u64,
    },
    #[serde(rename = "node.failed")]
    NodeFailed {
        run_id: Uuid,
        node: String,
        error: String,
    },
    #[serde(rename = "node.skipped")]
    NodeSkipped {
        run_id: Uuid,
        node: String,
        reason: String,
    },
}

impl Event {
    pub fn node(&self) -> Option<&str> {
        match self {
            Event::NodeStarted { node, .. }
            | Event::NodeSucceeded { node, .. }
            | Event::NodeFailed { node, .. }
            | Event::NodeSkipped { node, .. } => Some(node),
            Event::RunStarted { .. } | Event::RunFinished { .. } => None,
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct CompositeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// One JSON object per line on stdout.
pub struct StdoutEventSink;

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        println!("{}", serde_json::to_string(&event).unwrap_or_default());
    }
}

/// Forwards events to `tracing` under the `tether::events` target.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        match &event {
            Event::RunStarted { run_id, plan, nodes } => {
                tracing::info!(target: "tether::events", %run_id, %plan, nodes, "run started");
            }
            Event::RunFinished { run_id, status } => {
                tracing::info!(target: "tether::events", %run_id, status = status.as_str(), "run finished");
            }
            Event::NodeStarted { node, kind, .. } => {
                tracing::info!(target: "tether::events", %node, ?kind, "node started");
            }
            Event::NodeSucceeded {
                node, duration_ms, ..
            } => {
                tracing::info!(target: "tether::events", %node, duration_ms, "node succeeded");
            }
            Event::NodeFailed { node, error, .. } => {
                tracing::error!(target: "tether::events", %node, %error, "node failed");
            }
            Event::NodeSkipped { node, reason, .. } => {
                tracing::warn!(target: "tether::events", %node, %reason, "node skipped");
            }
        }
    }
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}
