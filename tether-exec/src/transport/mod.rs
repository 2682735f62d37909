mod shell;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::error::TransportError;

pub use shell::{ShellTransport, ShellTransportConfig};

/// Where a rendered command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    Local,
    Remote {
        host: String,
        port: u16,
        user: String,
        identity: Option<String>,
    },
}

impl ResolvedTarget {
    pub fn host(&self) -> Option<&str> {
        match self {
            ResolvedTarget::Local => None,
            ResolvedTarget::Remote { host, .. } => Some(host),
        }
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedTarget::Local => f.write_str("local"),
            ResolvedTarget::Remote {
                host, port, user, ..
            } => write!(f, "{user}@{host}:{port}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Runs one command string. Implementations must not retry.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn run(
        &self,
        target: &ResolvedTarget,
        command: &str,
        env: &BTreeMap<String, Zeroizing<String>>,
    ) -> Result<CommandOutput, TransportError>;
}
