#![forbid(unsafe_code)]

//! Runtime for tether plans: the concurrent scheduler, the action runner, and the provider and
//! transport seams they call through.

mod error;
pub mod executor;
pub mod provider;
pub mod runner;
mod subprocess;
pub mod transport;

pub use crate::error::{NodeError, ProviderError, TransportError};
pub use crate::executor::{ExecutionReport, Executor, ExecutorConfig, NodeOutcome, RunStatus};
pub use crate::provider::{CommandProvider, ProviderRegistry, ResourceProvider};
pub use crate::runner::{ActionRunner, PreparedAction};
pub use crate::transport::{CommandOutput, CommandTransport, ResolvedTarget, ShellTransport};
