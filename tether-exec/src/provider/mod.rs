mod command;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tether_core::Value;

use crate::error::ProviderError;

pub use command::CommandProvider;

/// Creates external infrastructure.
///
/// `args` may hold sensitive values; an implementation must not put their raw content into an
/// error. Returned outputs keep whatever sensitivity the provider gives them.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn create(
        &self,
        kind: &str,
        name: &str,
        args: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, ProviderError>;
}

/// Routes by the kind prefix before the first `:` (`linode:instance` goes to `linode`).
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ResourceProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, prefix: impl Into<String>, provider: Arc<dyn ResourceProvider>) {
        self.providers.insert(prefix.into(), provider);
    }

    pub fn with(mut self, prefix: impl Into<String>, provider: Arc<dyn ResourceProvider>) -> Self {
        self.register(prefix, provider);
        self
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    fn lookup(&self, kind: &str) -> Option<&Arc<dyn ResourceProvider>> {
        let prefix = kind.split_once(':').map(|(p, _)| p).unwrap_or(kind);
        self.providers.get(prefix)
    }
}

#[async_trait]
impl ResourceProvider for ProviderRegistry {
    async fn create(
        &self,
        kind: &str,
        name: &str,
        args: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, ProviderError> {
        let provider = self.lookup(kind).ok_or_else(|| ProviderError::UnknownKind {
            kind: kind.to_string(),
        })?;
        provider.create(kind, name, args).await
    }
}
