pub mod concurrency;
pub mod events;
pub mod metrics;
mod report;
mod scheduler;
mod types;

pub use events::{
    CompositeEventSink, Event, EventSink, NoOpEventSink, StdoutEventSink, TracingEventSink,
};
pub use metrics::{MetricsCollector, RunMetrics};
pub use report::{
    ExecutionReport, ExportedValue, NodeOutcome, NodeReport, RunStatus, SkipReason,
};
pub use scheduler::Executor;
pub use types::ExecutorConfig;
