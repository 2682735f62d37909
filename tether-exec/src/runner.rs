use std::collections::BTreeMap;
use std::sync::Arc;

use tether_core::{ActionNode, Redactor, Target, Template, TemplateError, Value};
use zeroize::Zeroizing;

use crate::error::NodeError;
use crate::transport::{CommandTransport, ResolvedTarget};

/// An action with every template rendered, ready to hand to a transport.
pub struct PreparedAction {
    pub node: String,
    pub target: ResolvedTarget,
    /// The target with sensitive host or user values replaced by `<redacted>`.
    pub target_display: String,
    command: Zeroizing<String>,
    /// The command with sensitive substitutions replaced by `<redacted>`.
    pub display: String,
    env: BTreeMap<String, Zeroizing<String>>,
    sensitive_output: bool,
    redactor: Redactor,
}

impl std::fmt::Debug for PreparedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedAction")
            .field("node", &self.node)
            .field("target", &self.target_display)
            .field("display", &self.display)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Executes action nodes: renders, invokes the transport once, captures stdout.
#[derive(Clone)]
pub struct ActionRunner {
    transport: Arc<dyn CommandTransport>,
}

impl ActionRunner {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self { transport }
    }

    pub fn prepare(
        &self,
        action: &ActionNode,
        inputs: &BTreeMap<String, Value>,
    ) -> Result<PreparedAction, NodeError> {
        let unresolved = |e: TemplateError| {
            let input = match e {
                TemplateError::Unresolved(name) => name,
                other => other.to_string(),
            };
            tracing::error!(node = %action.name, %input, "action started with an unresolved input");
            NodeError::UnresolvedInput {
                node: action.name.clone(),
                input,
            }
        };
        let render = |t: &Template| t.render(inputs).map_err(unresolved);

        let rendered = action.command.render(inputs).map_err(unresolved)?;
        let mut env = BTreeMap::new();
        for (k, t) in &action.env {
            let r = t.render(inputs).map_err(unresolved)?;
            env.insert(k.clone(), Zeroizing::new(r.expose().to_string()));
        }

        let (target, target_display) = match &action.target {
            Target::Local => (ResolvedTarget::Local, ResolvedTarget::Local.to_string()),
            Target::Remote(r) => {
                let host = render(&r.host)?;
                let user = render(&r.user)?;
                let identity = r.identity.as_ref().map(render).transpose()?;
                let display = format!("{}@{}:{}", user.display(), host.display(), r.port);
                let target = ResolvedTarget::Remote {
                    host: host.expose().to_string(),
                    port: r.port,
                    user: user.expose().to_string(),
                    identity: identity.map(|i| i.expose().to_string()),
                };
                (target, display)
            }
        };

        let mut redactor = Redactor::new();
        for v in inputs.values() {
            redactor.track(v);
        }

        Ok(PreparedAction {
            node: action.name.clone(),
            target,
            target_display,
            command: Zeroizing::new(rendered.expose().to_string()),
            display: rendered.display().to_string(),
            env,
            sensitive_output: action.sensitive_output,
            redactor,
        })
    }

    /// Runs a prepared action and returns its captured stdout.
    pub async fn invoke(&self, prepared: &PreparedAction) -> Result<Value, NodeError> {
        tracing::info!(
            node = %prepared.node,
            target = %prepared.target_display,
            command = %prepared.display,
            "running command"
        );
        let out = self
            .transport
            .run(&prepared.target, &prepared.command, &prepared.env)
            .await?;

        if out.exit_code != 0 {
            return Err(NodeError::Execution {
                exit_code: out.exit_code,
                stderr: prepared.redactor.scrub(out.stderr.trim_end()),
            });
        }

        let stdout = out.stdout.trim_end_matches(['\n', '\r']).to_string();
        Ok(if prepared.sensitive_output {
            Value::sensitive(stdout)
        } else {
            Value::plain(stdout)
        })
    }

    pub async fn execute(
        &self,
        action: &ActionNode,
        inputs: &BTreeMap<String, Value>,
    ) -> Result<Value, NodeError> {
        let prepared = self.prepare(action, inputs)?;
        self.invoke(&prepared).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tether_core::RemoteTarget;

    use super::*;
    use crate::error::TransportError;
    use crate::transport::CommandOutput;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(ResolvedTarget, String, BTreeMap<String, String>)>>,
        reply: CommandOutput,
    }

    #[async_trait]
    impl CommandTransport for Recorder {
        async fn run(
            &self,
            target: &ResolvedTarget,
            command: &str,
            env: &BTreeMap<String, Zeroizing<String>>,
        ) -> Result<CommandOutput, TransportError> {
            let env = env.iter().map(|(k, v)| (k.clone(), v.to_string())).collect();
            self.calls
                .lock()
                .unwrap()
                .push((target.clone(), command.to_string(), env));
            Ok(self.reply.clone())
        }
    }

    fn inputs() -> BTreeMap<String, Value> {
        let mut i = BTreeMap::new();
        i.insert("ip".to_string(), Value::plain("192.0.2.10"));
        i.insert("ts".to_string(), Value::sensitive("tskey-abc"));
        i
    }

    #[tokio::test]
    async fn renders_and_calls_transport_once() {
        let transport = Arc::new(Recorder {
            reply: CommandOutput {
                stdout: "ok\n".to_string(),
                ..CommandOutput::default()
            },
            ..Recorder::default()
        });
        let runner = ActionRunner::new(transport.clone());
        let action = ActionNode::new(
            "playbook",
            Template::parse("ansible-playbook -i {$ip}, main.yml").unwrap(),
        )
        .env("TS_AUTHKEY", Template::parse("{$ts}").unwrap())
        .remote(RemoteTarget::new(Template::parse("{$ip}").unwrap()));

        let out = runner.execute(&action, &inputs()).await.unwrap();
        assert_eq!(out, Value::plain("ok"));

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (target, command, env) = &calls[0];
        assert_eq!(target.host(), Some("192.0.2.10"));
        assert_eq!(command, "ansible-playbook -i 192.0.2.10, main.yml");
        assert_eq!(env["TS_AUTHKEY"], "tskey-abc");
    }

    #[tokio::test]
    async fn display_form_hides_secrets() {
        let runner = ActionRunner::new(Arc::new(Recorder::default()));
        let action = ActionNode::new("envs", Template::parse("login {$ts}").unwrap());
        let prepared = runner.prepare(&action, &inputs()).unwrap();
        assert_eq!(prepared.display, "login <redacted>");
        assert!(!format!("{prepared:?}").contains("tskey-abc"));
    }

    #[tokio::test]
    async fn sensitive_host_is_used_but_never_shown() {
        let runner = ActionRunner::new(Arc::new(Recorder::default()));
        let mut inputs = inputs();
        inputs.insert("ip".to_string(), Value::sensitive("10.9.8.7"));
        let action = ActionNode::new("install", Template::parse("hostname").unwrap())
            .remote(RemoteTarget::new(Template::parse("{$ip}").unwrap()));

        let prepared = runner.prepare(&action, &inputs).unwrap();
        assert_eq!(prepared.target.host(), Some("10.9.8.7"));
        assert_eq!(prepared.target_display, "root@<redacted>:22");
        assert!(!format!("{prepared:?}").contains("10.9.8.7"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_execution_error_with_scrubbed_stderr() {
        let runner = ActionRunner::new(Arc::new(Recorder {
            reply: CommandOutput {
                stdout: String::new(),
                stderr: "auth failed for tskey-abc\n".to_string(),
                exit_code: 2,
            },
            ..Recorder::default()
        }));
        let action = ActionNode::new("envs", Template::parse("login {$ts}").unwrap());
        let err = runner.execute(&action, &inputs()).await.unwrap_err();
        match err {
            NodeError::Execution { exit_code, stderr } => {
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "auth failed for <redacted>");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stdout_is_plain_unless_remarked() {
        let transport = Arc::new(Recorder {
            reply: CommandOutput {
                stdout: "derived-from-secret\n".to_string(),
                ..CommandOutput::default()
            },
            ..Recorder::default()
        });
        let runner = ActionRunner::new(transport);
        let action = ActionNode::new("envs", Template::parse("echo {$ts}").unwrap());
        let out = runner.execute(&action, &inputs()).await.unwrap();
        assert!(!out.is_sensitive());

        let action = action.sensitive_output(true);
        let out = runner.execute(&action, &inputs()).await.unwrap();
        assert!(out.is_sensitive());
    }

    #[tokio::test]
    async fn missing_input_is_unresolved_input() {
        let runner = ActionRunner::new(Arc::new(Recorder::default()));
        let action = ActionNode::new("a", Template::parse("echo {$nope}").unwrap());
        let err = runner.execute(&action, &inputs()).await.unwrap_err();
        assert!(matches!(err, NodeError::UnresolvedInput { ref input, .. } if input == "nope"));
    }
}
