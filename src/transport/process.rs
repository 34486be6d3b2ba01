//! Child-process transport for worker processes.
//!
//! Owns a `sessionbox-worker` child, communicating via length-prefixed JSON
//! on the child's stdin (requests) and stdout (responses). Mutex-guarded for
//! safe concurrent access, though in practice each worker is only ever
//! addressed by the single Session that owns it.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::protocol::{WorkerRequest, WorkerResponse};
use super::{recv_message, send_message, Transport};

/// Transport that communicates with a worker process via stdin/stdout pipes.
///
/// The worker is spawned once and kept alive for the session's lifetime.
/// Each `request()` call acquires both stdin and stdout mutexes to ensure
/// atomic send/receive (no interleaving from concurrent callers).
pub struct ProcessTransport {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<ChildStdout>,
    pid: Option<u32>,
    alive: AtomicBool,
}

impl ProcessTransport {
    /// Spawn the worker binary at `exec_path` and wait for its `Ready` message.
    pub async fn spawn(exec_path: &std::path::Path, ready_timeout: Duration) -> Result<Self> {
        debug!(exec = %exec_path.display(), "spawning worker process");

        let mut child = tokio::process::Command::new(exec_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn worker: {}", exec_path.display()))?;

        let pid = child.id();
        let stdin = child.stdin.take().context("failed to take worker stdin")?;
        let mut stdout = child
            .stdout
            .take()
            .context("failed to take worker stdout")?;

        let ready_result = tokio::time::timeout(ready_timeout, recv_message(&mut stdout)).await;

        let ready_bytes = ready_result
            .map_err(|_| anyhow::anyhow!("worker did not send Ready within {ready_timeout:?}"))?
            .context("failed to read worker Ready message")?;

        let ready_msg: WorkerResponse = serde_json::from_slice(&ready_bytes)
            .context("failed to parse worker Ready message")?;

        match ready_msg {
            WorkerResponse::Ready => {
                debug!(pid, "worker is ready");
            }
            other => {
                anyhow::bail!("expected Ready message, got: {other:?}");
            }
        }

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(stdout),
            pid,
            alive: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn request(&self, req: &WorkerRequest) -> Result<WorkerResponse> {
        if !self.alive.load(Ordering::Relaxed) {
            anyhow::bail!("worker process is not alive");
        }

        // Acquire both locks for atomic send/receive.
        let mut stdin = self.stdin.lock().await;
        let mut stdout = self.stdout.lock().await;

        let req_bytes = serde_json::to_vec(req).context("failed to serialize request")?;
        send_message(&mut *stdin, &req_bytes)
            .await
            .context("failed to send request to worker")?;

        let resp_bytes = recv_message(&mut *stdout)
            .await
            .context("failed to read response from worker")?;

        let resp: WorkerResponse =
            serde_json::from_slice(&resp_bytes).context("failed to parse worker response")?;

        Ok(resp)
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.alive.load(Ordering::Relaxed) {
            return Ok(());
        }

        if let Err(e) = self.request(&WorkerRequest::Shutdown).await {
            warn!(error = %e, "graceful shutdown failed, killing worker");
        }

        self.alive.store(false, Ordering::Relaxed);

        let mut child = self.child.lock().await;
        let _ = child.kill().await;
        let _ = child.wait().await;

        debug!("worker process shut down");
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    async fn kill(&self) -> Result<()> {
        self.alive.store(false, Ordering::Relaxed);
        let mut child = self.child.lock().await;
        let _ = child.kill().await;
        let _ = child.wait().await;
        Ok(())
    }
}
