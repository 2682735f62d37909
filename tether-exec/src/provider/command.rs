use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tether_core::{Datum, Redactor, Value};
use tokio::process::Command;
use zeroize::Zeroizing;

use super::ResourceProvider;
use crate::error::ProviderError;
use crate::subprocess::run_process;

/// Delegates creation to an external program.
///
/// The program receives `{"kind": .., "name": .., "args": {..}}` as JSON on stdin, with
/// sensitive args in clear text, and must print a JSON object of outputs on stdout. A non-zero
/// exit is a rejection; its stderr becomes the error message.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ResourceProvider for CommandProvider {
    async fn create(
        &self,
        kind: &str,
        name: &str,
        args: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, ProviderError> {
        let mut redactor = Redactor::new();
        let mut exposed = serde_json::Map::new();
        for (k, v) in args {
            redactor.track(v);
            let json = match v.as_datum() {
                Some(d) => serde_json::to_value(d)
                    .map_err(|e| ProviderError::Malformed(e.to_string()))?,
                None => serde_json::Value::String(v.expose_text().into_owned()),
            };
            exposed.insert(k.clone(), json);
        }
        let payload = serde_json::json!({ "kind": kind, "name": name, "args": exposed });
        let stdin = Zeroizing::new(
            serde_json::to_vec(&payload).map_err(|e| ProviderError::Malformed(e.to_string()))?,
        );

        tracing::debug!(program = %self.program, kind, name, "invoking provider");
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        let out = run_process(&mut cmd, Some(stdin), self.timeout)
            .await
            .map_err(|e| ProviderError::Process(e.to_string()))?;

        if out.exit_code != 0 {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(ProviderError::rejected(
                kind,
                name,
                redactor.scrub(stderr.trim()),
            ));
        }

        let outputs: BTreeMap<String, Datum> = serde_json::from_slice(&out.stdout)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(outputs
            .into_iter()
            .map(|(k, d)| (k, Value::plain(d)))
            .collect())
    }
}
