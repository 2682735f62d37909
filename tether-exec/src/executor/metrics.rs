use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::executor::report::RunStatus;
use crate::executor::{Event, EventSink};

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub run_id: Option<uuid::Uuid>,
    pub plan: String,
    pub status: Option<RunStatus>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub total_duration: Option<Duration>,
    pub nodes_total: usize,
    pub nodes_started: usize,
    pub nodes_succeeded: usize,
    pub nodes_failed: usize,
    pub nodes_skipped: usize,
    /// Highest number of nodes observed running at the same time.
    pub peak_in_flight: usize,
    in_flight: usize,
}

impl RunMetrics {
    fn record(&mut self, event: &Event) {
        match event {
            Event::RunStarted {
                run_id,
                plan,
                nodes,
            } => {
                self.run_id = Some(*run_id);
                self.plan = plan.clone();
                self.nodes_total = *nodes;
                self.started_at = Some(Instant::now());
            }
            Event::NodeStarted { .. } => {
                self.nodes_started += 1;
                self.in_flight += 1;
                self.peak_in_flight = self.peak_in_flight.max(self.in_flight);
            }
            Event::NodeSucceeded { .. } => {
                self.nodes_succeeded += 1;
                self.in_flight = self.in_flight.saturating_sub(1);
            }
            Event::NodeFailed { .. } => {
                self.nodes_failed += 1;
                self.in_flight = self.in_flight.saturating_sub(1);
            }
            Event::NodeSkipped { .. } => {
                self.nodes_skipped += 1;
            }
            Event::RunFinished { status, .. } => {
                self.status = Some(*status);
                let finished = Instant::now();
                self.finished_at = Some(finished);
                self.total_duration = self.started_at.map(|s| finished.duration_since(s));
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id.map(|id| id.to_string()),
            "plan": self.plan,
            "status": self.status.map(|s| s.as_str()),
            "duration_ms": self.total_duration.map(|d| d.as_millis() as u64),
            "nodes": {
                "total": self.nodes_total,
                "started": self.nodes_started,
                "succeeded": self.nodes_succeeded,
                "failed": self.nodes_failed,
                "skipped": self.nodes_skipped,
                "peak_in_flight": self.peak_in_flight,
            },
        })
    }
}

/// Aggregates [`RunMetrics`] from the event stream and forwards every event to `base`.
pub struct MetricsCollector {
    metrics: Arc<Mutex<RunMetrics>>,
    base: Arc<dyn EventSink>,
}

impl MetricsCollector {
    pub fn new(base: Arc<dyn EventSink>) -> Self {
        Self {
            metrics: Arc::new(Mutex::new(RunMetrics::default())),
            base,
        }
    }

    pub async fn get_metrics(&self) -> RunMetrics {
        self.metrics.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for MetricsCollector {
    async fn emit(&self, event: Event) {
        self.metrics.lock().await.record(&event);
        self.base.emit(event).await;
    }
}
