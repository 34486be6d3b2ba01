//! Configuration, resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `SESSIONBOX_LISTEN`, `SESSIONBOX_MAX_SESSIONS`,
//!    `SESSIONBOX_TIMEOUT_MS`, `SESSIONBOX_MEMORY_LIMIT_MB`,
//!    `SESSIONBOX_IDLE_TIMEOUT_SECS`.
//! 2. **Config file** — path via `--config <path>`.
//! 3. **Compiled defaults** — see each field's default function below.
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! max_connections = 256
//!
//! [session]
//! max_sessions = 40
//! timeout_ms = 2000
//! memory_limit_mb = 100
//! idle_timeout_secs = 60
//! poll_interval_ms = 100
//! reap_interval_secs = 60
//! worker_ready_timeout_ms = 2000
//!
//! [logging]
//! level = "info"
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SessionboxError};

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionLimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8080`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum concurrent in-flight HTTP connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Resource limits and timing for the session execution engine (§6 of the spec).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionLimitsConfig {
    /// Maximum number of live sessions (`MAX_SESSIONS`, default 40).
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Wall-clock budget per execution in milliseconds (`TIMEOUT`, default 2000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Resident memory ceiling per worker in megabytes (`MEMORY_LIMIT`, default 100).
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    /// Idle eviction threshold in seconds (`IDLE_TIMEOUT`, default 60).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// RSS sampling cadence in milliseconds (`POLL_INTERVAL`, default 100).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Reaper sweep cadence in seconds (`REAP_INTERVAL`, default 60).
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// How long to wait for a spawned worker's `Ready` message, in milliseconds.
    #[serde(default = "default_worker_ready_timeout_ms")]
    pub worker_ready_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_max_connections() -> usize {
    256
}
fn default_max_sessions() -> usize {
    40
}
fn default_timeout_ms() -> u64 {
    2_000
}
fn default_memory_limit_mb() -> u64 {
    100
}
fn default_idle_timeout_secs() -> u64 {
    60
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_reap_interval_secs() -> u64 {
    60
}
fn default_worker_ready_timeout_ms() -> u64 {
    2_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for SessionLimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            timeout_ms: default_timeout_ms(),
            memory_limit_mb: default_memory_limit_mb(),
            idle_timeout_secs: default_idle_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            reap_interval_secs: default_reap_interval_secs(),
            worker_ready_timeout_ms: default_worker_ready_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file is read and parsed; a missing or
    /// malformed file is a hard error since the caller asked for it
    /// explicitly. With no path, compiled defaults are used as the base.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = if let Some(p) = path {
            let content =
                std::fs::read_to_string(p).map_err(|source| SessionboxError::ConfigRead {
                    path: p.to_string(),
                    source,
                })?;
            toml::from_str(&content).map_err(|source| SessionboxError::ConfigParse {
                path: p.to_string(),
                source,
            })?
        } else {
            Config::default()
        };

        if let Ok(listen) = std::env::var("SESSIONBOX_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(v) = std::env::var("SESSIONBOX_MAX_SESSIONS") {
            if let Ok(n) = v.parse() {
                config.session.max_sessions = n;
            }
        }
        if let Ok(v) = std::env::var("SESSIONBOX_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                config.session.timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("SESSIONBOX_MEMORY_LIMIT_MB") {
            if let Ok(n) = v.parse() {
                config.session.memory_limit_mb = n;
            }
        }
        if let Ok(v) = std::env::var("SESSIONBOX_IDLE_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                config.session.idle_timeout_secs = n;
            }
        }

        Ok(config)
    }

    /// Path to the sibling `sessionbox-worker` binary, resolved next to the
    /// currently running executable.
    pub fn worker_exec_path() -> std::io::Result<std::path::PathBuf> {
        let mut path = std::env::current_exe()?;
        path.pop();
        path.push(if cfg!(windows) {
            "sessionbox-worker.exe"
        } else {
            "sessionbox-worker"
        });
        Ok(path)
    }
}

impl SessionLimitsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
    pub fn worker_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_ready_timeout_ms)
    }
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.session.max_sessions, 40);
        assert_eq!(config.session.timeout_ms, 2_000);
        assert_eq!(config.session.memory_limit_mb, 100);
        assert_eq!(config.session.idle_timeout_secs, 60);
        assert_eq!(config.session.poll_interval_ms, 100);
        assert_eq!(config.session.reap_interval_secs, 60);
    }

    #[test]
    fn parse_toml_overrides() {
        let toml = r#"
            [server]
            listen = "127.0.0.1:9090"

            [session]
            max_sessions = 10
            timeout_ms = 500
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9090");
        assert_eq!(config.session.max_sessions, 10);
        assert_eq!(config.session.timeout_ms, 500);
        // Untouched fields still take their defaults.
        assert_eq!(config.session.memory_limit_mb, 100);
    }

    #[test]
    fn duration_helpers() {
        let limits = SessionLimitsConfig::default();
        assert_eq!(limits.timeout(), Duration::from_secs(2));
        assert_eq!(limits.idle_timeout(), Duration::from_secs(60));
        assert_eq!(limits.memory_limit_bytes(), 100 * 1024 * 1024);
    }
}
