/// Failure reported by a [`crate::provider::ResourceProvider`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("no provider registered for kind {kind}")]
    UnknownKind { kind: String },
    #[error("provider rejected {kind} {name}: {message}")]
    Rejected {
        kind: String,
        name: String,
        message: String,
    },
    #[error("provider process failed: {0}")]
    Process(String),
    #[error("provider returned malformed output: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn rejected(kind: &str, name: &str, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind: kind.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// The command could not be delivered or did not finish. A command that ran and exited non-zero
/// is not a transport error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("i/o error while running command: {0}")]
    Io(String),
    #[error("command timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// Why a node failed during a run. Stored in the report after scrubbing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("command exited with status {exit_code}: {stderr}")]
    Execution { exit_code: i32, stderr: String },
    #[error("internal error: input {input} of node {node} was not resolved")]
    UnresolvedInput { node: String, input: String },
    #[error("provider did not return declared output {key} of node {node}")]
    MissingOutput { node: String, key: String },
    #[error("internal error: {0}")]
    Internal(String),
}
