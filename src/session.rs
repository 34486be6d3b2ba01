//! Sessions and the session registry.
//!
//! A [`Session`] binds an id to one [`Transport`]-backed worker plus the
//! bookkeeping needed to enforce single-flight execution and idle eviction.
//! [`SessionManager`] is the supervisor: it creates, looks up, evicts, and
//! destroys sessions, and enforces the global session cap.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SessionLimitsConfig;
use crate::memory;
use crate::outcome::{ErrorKind, Outcome};
use crate::transport::{ProcessTransport, Transport, WorkerRequest, WorkerResponse};

/// A Session's lifecycle state (spec §3). Tracked for observability; the
/// authoritative signal for "is this session still usable" is registry
/// membership — a `Dead` session is removed from the registry in the same
/// step that marks it dead, so a lookup miss and a `Dead` session are the
/// same event from a caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Busy,
    Dead,
}

/// One live interpreter session: an id, its worker, and bookkeeping.
pub struct Session {
    pub id: String,
    worker: Box<dyn Transport>,
    /// Serializes submissions against this session (spec §4.2 step 1).
    execute_lock: Mutex<()>,
    last_active: Mutex<Instant>,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(id: String, worker: Box<dyn Transport>) -> Self {
        Self {
            id,
            worker,
            execute_lock: Mutex::new(()),
            last_active: Mutex::new(Instant::now()),
            state: Mutex::new(SessionState::Idle),
        }
    }

    async fn spawn(
        id: String,
        worker_path: &std::path::Path,
        ready_timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        let transport = ProcessTransport::spawn(worker_path, ready_timeout).await?;
        Ok(Self::new(id, Box::new(transport)))
    }

    async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    async fn last_active(&self) -> Instant {
        *self.last_active.lock().await
    }

    async fn set_state(&self, state: SessionState) {
        *self.state.lock().await = state;
    }
}

/// The supervisor: owns the session registry, the reaper, and session
/// creation/dispatch.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    config: SessionLimitsConfig,
    worker_path: PathBuf,
}

impl SessionManager {
    pub fn new(config: SessionLimitsConfig, worker_path: PathBuf) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            worker_path,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// `execute(maybe_id, code) -> Outcome` (spec §4.1).
    pub async fn execute(&self, maybe_id: Option<String>, code: String) -> Outcome {
        match maybe_id {
            Some(id) => {
                let session = {
                    let sessions = self.sessions.read().await;
                    sessions.get(&id).cloned()
                };
                match session {
                    None => Outcome::error(id, ErrorKind::SessionNotFound),
                    Some(session) => self.dispatch(session, code).await,
                }
            }
            None => self.create_and_dispatch(code).await,
        }
    }

    async fn create_and_dispatch(&self, code: String) -> Outcome {
        let id = Uuid::new_v4().to_string();

        // Capacity check and insertion share one write-lock acquisition so
        // concurrent creations cannot both observe room and overshoot
        // MAX_SESSIONS (spec §4.1).
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.config.max_sessions {
            return Outcome::error(id, ErrorKind::MaxSessionsReached);
        }

        let session = match Session::spawn(
            id.clone(),
            &self.worker_path,
            self.config.worker_ready_timeout(),
        )
        .await
        {
            Ok(session) => Arc::new(session),
            Err(err) => {
                warn!(error = %err, "worker spawn failed, degrading to max_sessions_reached");
                return Outcome::error(id, ErrorKind::MaxSessionsReached);
            }
        };

        info!(session_id = %id, "session created");
        sessions.insert(id.clone(), Arc::clone(&session));
        drop(sessions);

        self.dispatch(session, code).await
    }

    /// `Session.submit(code)` (spec §4.2).
    async fn dispatch(&self, session: Arc<Session>, code: String) -> Outcome {
        let _guard = session.execute_lock.lock().await;
        session.set_state(SessionState::Busy).await;
        session.touch().await;

        let mut memory_signal = session.worker.pid().map(|pid| {
            memory::spawn_monitor(pid, self.config.memory_limit_bytes(), self.config.poll_interval())
        });

        let req = WorkerRequest::Execute { code };
        let request = session.worker.request(&req);
        tokio::pin!(request);

        tokio::select! {
            biased;

            result = &mut request => match result {
                Ok(WorkerResponse::Result { stdout, stderr }) => {
                    session.set_state(SessionState::Idle).await;
                    Outcome::success(session.id.clone(), stdout, stderr)
                }
                Ok(other) => {
                    warn!(session_id = %session.id, response = ?other, "unexpected worker response");
                    self.kill_and_remove(&session, ErrorKind::ExecutionTimeout).await
                }
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "worker died during execution");
                    self.kill_and_remove(&session, ErrorKind::ExecutionTimeout).await
                }
            },

            () = wait_for_memory_limit(&mut memory_signal) => {
                warn!(session_id = %session.id, "memory limit exceeded");
                self.kill_and_remove(&session, ErrorKind::MemoryLimitExceeded).await
            }

            () = tokio::time::sleep(self.config.timeout()) => {
                warn!(session_id = %session.id, "execution timeout");
                self.kill_and_remove(&session, ErrorKind::ExecutionTimeout).await
            }
        }
    }

    async fn kill_and_remove(&self, session: &Arc<Session>, kind: ErrorKind) -> Outcome {
        session.set_state(SessionState::Dead).await;
        let _ = session.worker.kill().await;
        self.sessions.write().await.remove(&session.id);
        Outcome::error(session.id.clone(), kind)
    }

    /// Tears down every session. Called once, at shutdown.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.write().await;
        for (id, session) in sessions.drain() {
            if let Err(err) = session.worker.shutdown().await {
                warn!(session_id = %id, error = %err, "error shutting down worker");
            }
        }
    }

    /// Spawns the background reaper. Wakes every `REAP_INTERVAL` and evicts
    /// sessions idle for at least `IDLE_TIMEOUT` (spec §4.1).
    pub fn start_reaper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(manager.config.reap_interval()).await;
                manager.sweep().await;
            }
        })
    }

    /// Snapshot-then-verify eviction sweep: never holds the registry lock
    /// across worker teardown (spec §4.1, §5).
    async fn sweep(&self) {
        let snapshot: Vec<(String, Instant)> = {
            let sessions = self.sessions.read().await;
            let mut entries = Vec::with_capacity(sessions.len());
            for (id, session) in sessions.iter() {
                entries.push((id.clone(), session.last_active().await));
            }
            entries
        };

        let idle_timeout = self.config.idle_timeout();
        let now = Instant::now();
        let expired: Vec<(String, Instant)> = snapshot
            .into_iter()
            .filter(|(_, last_active)| now.duration_since(*last_active) >= idle_timeout)
            .collect();

        if expired.is_empty() {
            return;
        }

        let mut reaped = Vec::new();
        {
            let mut sessions = self.sessions.write().await;
            for (id, observed_last_active) in expired {
                let still_expired = match sessions.get(&id) {
                    Some(session) => session.last_active().await == observed_last_active,
                    None => false,
                };
                if still_expired {
                    if let Some(session) = sessions.remove(&id) {
                        reaped.push(session);
                    }
                }
            }
        }

        for session in reaped {
            debug!(session_id = %session.id, "reaping idle session");
            let _ = session.worker.shutdown().await;
        }
    }
}

async fn wait_for_memory_limit(signal: &mut Option<tokio::sync::watch::Receiver<bool>>) {
    match signal {
        Some(rx) => {
            let _ = rx.changed().await;
        }
        None => std::future::pending::<()>().await,
    }
}
