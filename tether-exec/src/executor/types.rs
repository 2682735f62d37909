use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Nodes running at once. `None` is unbounded.
    pub max_concurrency: Option<usize>,
    /// Remote actions running at once per host.
    pub per_host_concurrency: BTreeMap<String, usize>,
    /// Once elapsed, no further node starts.
    pub deadline: Option<Duration>,
}

impl ExecutorConfig {
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn with_host_limit(mut self, host: impl Into<String>, limit: usize) -> Self {
        self.per_host_concurrency.insert(host.into(), limit);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
