use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use zeroize::Zeroizing;

use super::{CommandOutput, CommandTransport, ResolvedTarget};
use crate::error::TransportError;
use crate::subprocess::{run_process, shell_quote};

#[derive(Debug, Clone)]
pub struct ShellTransportConfig {
    pub shell: String,
    pub ssh_program: String,
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ShellTransportConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            ssh_program: "ssh".to_string(),
            command_timeout: Duration::from_secs(1800),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Local commands through `sh -c`; remote commands through the OpenSSH client in batch mode
/// with key authentication only.
#[derive(Debug, Clone, Default)]
pub struct ShellTransport {
    config: ShellTransportConfig,
}

impl ShellTransport {
    pub fn new(config: ShellTransportConfig) -> Self {
        Self { config }
    }

    fn local_command(&self, command: &str, env: &BTreeMap<String, Zeroizing<String>>) -> Command {
        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c").arg(command);
        for (k, v) in env {
            cmd.env(k, v.as_str());
        }
        cmd
    }

    fn remote_command(
        &self,
        host: &str,
        port: u16,
        user: &str,
        identity: Option<&str>,
        command: &str,
        env: &BTreeMap<String, Zeroizing<String>>,
    ) -> Result<Command, TransportError> {
        if host.is_empty() || host.starts_with('-') {
            return Err(TransportError::InvalidTarget(
                "host must be non-empty and must not start with '-'".to_string(),
            ));
        }
        if user.is_empty() || user.starts_with('-') {
            return Err(TransportError::InvalidTarget(
                "user must be non-empty and must not start with '-'".to_string(),
            ));
        }

        let mut cmd = Command::new(&self.config.ssh_program);
        cmd.arg("-p")
            .arg(port.to_string())
            .args(["-o", "BatchMode=yes"])
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .arg("-o")
            .arg(format!(
                "ConnectTimeout={}",
                self.config.connect_timeout.as_secs().max(1)
            ));
        if let Some(identity) = identity {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(format!("{user}@{host}"))
            .arg("--")
            .arg(remote_line(command, env).as_str());
        Ok(cmd)
    }
}

/// The remote side only sees a command line, so environment is passed as assignments in front
/// of a nested shell.
fn remote_line(command: &str, env: &BTreeMap<String, Zeroizing<String>>) -> Zeroizing<String> {
    if env.is_empty() {
        return Zeroizing::new(command.to_string());
    }
    let mut line = Zeroizing::new(String::new());
    for (k, v) in env {
        line.push_str(k);
        line.push('=');
        line.push_str(&shell_quote(v));
        line.push(' ');
    }
    line.push_str("sh -c ");
    line.push_str(&shell_quote(command));
    line
}

#[async_trait]
impl CommandTransport for ShellTransport {
    async fn run(
        &self,
        target: &ResolvedTarget,
        command: &str,
        env: &BTreeMap<String, Zeroizing<String>>,
    ) -> Result<CommandOutput, TransportError> {
        let mut cmd = match target {
            ResolvedTarget::Local => self.local_command(command, env),
            ResolvedTarget::Remote {
                host,
                port,
                user,
                identity,
            } => self.remote_command(host, *port, user, identity.as_deref(), command, env)?,
        };

        let out = run_process(&mut cmd, None, self.config.command_timeout).await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            exit_code: out.exit_code,
        })
    }
}
