use std::collections::BTreeMap;

use crate::config::ConfigSource;
use crate::error::ConfigError;
use crate::value::{Datum, Value};

/// Configuration and secret lookup used during plan construction.
///
/// Plain keys fall back to the plan's declared defaults; secrets never do, so a secret can
/// only come from a configuration source.
pub struct ValueStore {
    source: Box<dyn ConfigSource>,
    defaults: BTreeMap<String, Datum>,
}

impl ValueStore {
    pub fn new(source: Box<dyn ConfigSource>) -> Self {
        Self {
            source,
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: BTreeMap<String, Datum>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.source
            .get(key)
            .map(Value::plain)
            .or_else(|| self.defaults.get(key).cloned().map(Value::plain))
    }

    pub fn require(&self, key: &str) -> Result<Value, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::missing(key))
    }

    pub fn require_secret(&self, key: &str) -> Result<Value, ConfigError> {
        self.source
            .get_secret(key)
            .map(Value::from_secret)
            .ok_or_else(|| ConfigError::missing(key))
    }
}
