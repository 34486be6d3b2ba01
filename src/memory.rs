//! Resident-memory sampling for the Session's memory monitor (spec §4.2).
//!
//! Sampling RSS is an OS call; this wraps a cross-platform process-info
//! crate rather than hand-parsing `/proc`, so the same code path works on
//! every target this crate ships a worker binary for.

use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::sync::watch;

/// Poll a process's resident set size every `poll_interval` and signal once
/// it exceeds `limit_bytes`.
///
/// Returns a receiver that yields `true` the instant the limit is crossed.
/// The monitor stops polling as soon as either the limit is crossed or the
/// sender side is dropped (the caller's `select!` moved on).
pub fn spawn_monitor(
    pid: u32,
    limit_bytes: u64,
    poll_interval: Duration,
) -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut system = System::new();
        let sysinfo_pid = Pid::from_u32(pid);

        loop {
            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(poll_interval).await;

            system.refresh_process(sysinfo_pid);
            let Some(process) = system.process(sysinfo_pid) else {
                // Process already gone; the Session's other watchers will
                // observe the exit and report accordingly.
                return;
            };

            if process.memory() > limit_bytes {
                let _ = tx.send(true);
                return;
            }
        }
    });

    rx
}
