//! Worker protocol message types.
//!
//! Length-prefixed JSON protocol for supervisor ↔ worker communication.
//! Messages are framed as: [4-byte BE length][JSON payload]

use serde::{Deserialize, Serialize};

/// Request sent from the supervisor to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Execute code against the worker's persistent namespace.
    Execute { code: String },
    /// Graceful shutdown.
    Shutdown,
    /// Health check.
    Ping,
}

/// Response sent from a worker to the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    /// Worker is ready to accept requests (sent once on startup).
    Ready,
    /// Execution result. Either stream may be empty.
    Result { stdout: String, stderr: String },
    /// Pong response to a health check.
    Pong,
    /// A protocol-level error (distinct from a captured `stderr` traceback).
    Error { message: String },
}
