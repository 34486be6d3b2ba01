//! Crate-wide error type for fallible internal operations.
//!
//! HTTP handlers never propagate these directly — they convert them into the
//! JSON outcome shapes of [`crate::outcome`]. This type exists for the
//! operations that sit *beneath* the outcome model: spawning workers, framing
//! messages on the wire, and loading configuration.

use thiserror::Error;

/// Errors produced by the supervisor's internal plumbing.
#[derive(Debug, Error)]
pub enum SessionboxError {
    #[error("failed to spawn worker process: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("worker did not send Ready within {0:?}")]
    WorkerNotReady(std::time::Duration),

    #[error("worker transport error: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("worker process is not alive")]
    WorkerDead,

    #[error("message exceeds max size: {0} > {1}")]
    MessageTooLarge(u32, u32),

    #[error("failed to load config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, SessionboxError>;
