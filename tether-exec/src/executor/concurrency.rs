use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Optional global and per-host limits. Missing limits never block.
pub struct ConcurrencyLimits {
    global: Option<Arc<Semaphore>>,
    per_host: HashMap<String, Arc<Semaphore>>,
}

impl ConcurrencyLimits {
    pub fn new(global_limit: Option<usize>, per_host_limits: &BTreeMap<String, usize>) -> Self {
        Self {
            global: global_limit.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            per_host: per_host_limits
                .iter()
                .map(|(k, v)| (k.clone(), Arc::new(Semaphore::new((*v).max(1)))))
                .collect(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None, &BTreeMap::new())
    }

    pub async fn acquire(&self) -> Result<ConcurrencyPermit, AcquireError> {
        let permit = match &self.global {
            Some(sem) => Some(sem.clone().acquire_owned().await?),
            None => None,
        };
        Ok(ConcurrencyPermit { _permit: permit })
    }

    pub async fn acquire_host(&self, host: Option<&str>) -> Result<ConcurrencyPermit, AcquireError> {
        let permit = match host.and_then(|h| self.per_host.get(h)) {
            Some(sem) => Some(sem.clone().acquire_owned().await?),
            None => None,
        };
        Ok(ConcurrencyPermit { _permit: permit })
    }
}

pub struct ConcurrencyPermit {
    _permit: Option<OwnedSemaphorePermit>,
}
