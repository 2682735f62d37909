//! Child-process plumbing shared by the shell transport and command providers.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use zeroize::Zeroizing;

use crate::error::TransportError;

/// Cap on captured stdout or stderr per stream (10 MiB).
pub(crate) const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// Spawns `cmd`, feeds `stdin`, captures both output streams and enforces `timeout`.
///
/// The child is killed when the timeout fires. Output past [`MAX_OUTPUT_BYTES`] per stream is
/// discarded.
pub(crate) async fn run_process(
    cmd: &mut Command,
    stdin: Option<Zeroizing<Vec<u8>>>,
    timeout: Duration,
) -> Result<ProcessOutput, TransportError> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let start = Instant::now();
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let mut child = cmd.spawn().map_err(|e| TransportError::Spawn {
        program,
        message: e.to_string(),
    })?;

    // Written from its own task so a child that fills stdout before draining stdin cannot
    // deadlock us.
    let stdin_task = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(payload)) => Some(tokio::spawn(async move {
            let _ = pipe.write_all(&payload).await;
            drop(pipe);
        })),
        _ => None,
    };

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(read_capped(stdout_handle, MAX_OUTPUT_BYTES));
    let stderr_task = tokio::spawn(read_capped(stderr_handle, MAX_OUTPUT_BYTES));
    let mut helpers = vec![stdout_task.abort_handle(), stderr_task.abort_handle()];
    helpers.extend(stdin_task.as_ref().map(|t| t.abort_handle()));

    // The timeout covers draining the pipes too: a backgrounded grandchild can hold them open
    // long after the child itself has exited.
    let finished = tokio::time::timeout(timeout, async {
        let status = child
            .wait()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        if let Some(t) = stdin_task {
            let _ = t.await;
        }
        let (stdout, stderr) = tokio::join!(stdout_task, stderr_task);
        Ok::<_, TransportError>(ProcessOutput {
            stdout: stdout.unwrap_or_default(),
            stderr: stderr.unwrap_or_default(),
            exit_code: status.code().unwrap_or(-1),
        })
    })
    .await;

    match finished {
        Ok(result) => result,
        Err(_elapsed) => {
            for helper in &helpers {
                helper.abort();
            }
            Err(TransportError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Reads `handle` to EOF, keeping the first `cap` bytes. The rest is drained and discarded so
/// the writer never sees a closed pipe.
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>, cap: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(mut h) = handle else {
        return buf;
    };
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        match h.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    buf
}

/// Quotes `s` for a POSIX shell.
pub(crate) fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}
