//! End-to-end scenarios that spawn the real `sessionbox-worker` binary.
//!
//! Most of the ten scenarios are exercised with a fake worker in
//! `session.rs`'s unit tests, where timing and process scheduling can be
//! controlled precisely. Persistence, isolation, and sandboxing are only
//! meaningful with the real embedded interpreter, so they live here instead.

use std::path::PathBuf;
use std::time::Duration;

use sessionbox::config::SessionLimitsConfig;
use sessionbox::session::SessionManager;

fn worker_manager(config: SessionLimitsConfig) -> SessionManager {
    let worker_path = PathBuf::from(env!("CARGO_BIN_EXE_sessionbox-worker"));
    SessionManager::new(config, worker_path)
}

#[tokio::test]
async fn silent_success_has_no_streams_or_error() {
    let manager = worker_manager(SessionLimitsConfig::default());
    let outcome = manager.execute(None, "x = 1".to_string()).await;
    assert!(outcome.stdout.is_none());
    assert!(outcome.stderr.is_none());
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn captured_stdout_is_reported() {
    let manager = worker_manager(SessionLimitsConfig::default());
    let outcome = manager
        .execute(None, "print('Hello')".to_string())
        .await;
    assert_eq!(outcome.stdout.as_deref(), Some("Hello\n"));
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn user_exception_is_reported_as_stderr_not_error() {
    let manager = worker_manager(SessionLimitsConfig::default());
    let outcome = manager.execute(None, "error('boom')".to_string()).await;
    assert!(outcome.error.is_none());
    assert!(outcome.stderr.as_deref().unwrap_or_default().contains("boom"));
}

#[tokio::test]
async fn persistence_across_submissions_on_same_session() {
    let manager = worker_manager(SessionLimitsConfig::default());
    let first = manager.execute(None, "x = 42".to_string()).await;
    assert!(first.error.is_none());

    let second = manager
        .execute(Some(first.id.clone()), "print(x)".to_string())
        .await;
    assert_eq!(second.id, first.id);
    assert_eq!(second.stdout.as_deref(), Some("42\n"));
}

#[tokio::test]
async fn separate_sessions_do_not_share_namespace() {
    let manager = worker_manager(SessionLimitsConfig::default());
    let a = manager.execute(None, "x = 1".to_string()).await;
    assert!(a.error.is_none());

    let b = manager.execute(None, "print(x)".to_string()).await;
    assert_ne!(a.id, b.id);
    assert!(b
        .stdout
        .as_deref()
        .unwrap_or_default()
        .to_lowercase()
        .contains("nil"));
}

#[tokio::test]
async fn unknown_session_id_reports_not_found() {
    let manager = worker_manager(SessionLimitsConfig::default());
    let outcome = manager
        .execute(
            Some("00000000-0000-0000-0000-000000000000".to_string()),
            "x = 1".to_string(),
        )
        .await;
    assert_eq!(outcome.error.as_deref(), Some("session not found"));
    assert_eq!(outcome.id, "00000000-0000-0000-0000-000000000000");
}

#[tokio::test]
async fn sandbox_blocks_file_open() {
    let manager = worker_manager(SessionLimitsConfig::default());
    let outcome = manager
        .execute(None, "io.open('t.txt', 'w')".to_string())
        .await;
    assert!(outcome.error.is_none());
    assert!(outcome
        .stderr
        .as_deref()
        .unwrap_or_default()
        .contains("PermissionError"));
}

#[tokio::test]
async fn execution_timeout_evicts_the_session() {
    let mut config = SessionLimitsConfig::default();
    config.timeout_ms = 200;
    let manager = worker_manager(config);

    let outcome = manager
        .execute(None, "while true do end".to_string())
        .await;
    assert_eq!(outcome.error.as_deref(), Some("execution timeout"));

    let followup = manager.execute(Some(outcome.id), "x".to_string()).await;
    assert_eq!(followup.error.as_deref(), Some("session not found"));
}

#[tokio::test]
async fn capacity_limit_rejects_once_full() {
    let mut config = SessionLimitsConfig::default();
    config.max_sessions = 2;
    let manager = worker_manager(config);

    let first = manager.execute(None, "x = 1".to_string()).await;
    let second = manager.execute(None, "x = 1".to_string()).await;
    assert!(first.error.is_none());
    assert!(second.error.is_none());

    let third = manager.execute(None, "x = 1".to_string()).await;
    assert_eq!(third.error.as_deref(), Some("max sessions reached"));

    manager.close_all().await;
}

#[tokio::test]
async fn memory_limit_kills_the_worker() {
    let mut config = SessionLimitsConfig::default();
    config.memory_limit_mb = 20;
    config.poll_interval_ms = 10;
    config.timeout_ms = 5_000;
    let manager = worker_manager(config);

    let outcome = manager
        .execute(
            None,
            "local t = {} for i = 1, 6000000 do t[i] = i end".to_string(),
        )
        .await;
    assert_eq!(outcome.error.as_deref(), Some("memory limit exceeded"));

    tokio::time::sleep(Duration::from_millis(50)).await;
}
