//! The `Outcome` value returned by `Execute`, and its JSON rendering.
//!
//! An outcome is exactly one of a success shape (`stdout`/`stderr`, either or
//! both possibly absent) or an error shape (`error`). These never overlap —
//! [`Outcome::success`] and [`Outcome::error`] are the only constructors, and
//! both stamp the fields the other leaves `None`.

use serde::Serialize;

/// The four error kinds the core can report. Rendered with the bit-exact
/// strings callers depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ExecutionTimeout,
    MemoryLimitExceeded,
    MaxSessionsReached,
    SessionNotFound,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ExecutionTimeout => "execution timeout",
            ErrorKind::MemoryLimitExceeded => "memory limit exceeded",
            ErrorKind::MaxSessionsReached => "max sessions reached",
            ErrorKind::SessionNotFound => "session not found",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one `Execute` call, renderable directly as the HTTP
/// response body.
///
/// Absent fields serialize as JSON `null` rather than being omitted — the
/// wire contract (spec §6) is explicit that unused fields are `null`, not
/// missing.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub id: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub error: Option<String>,
}

impl Outcome {
    /// A successful execution. Empty captures collapse to `None` — the
    /// wire contract reports them as `null`, not as the empty string.
    pub fn success(id: impl Into<String>, stdout: String, stderr: String) -> Self {
        Self {
            id: id.into(),
            stdout: non_empty(stdout),
            stderr: non_empty(stderr),
            error: None,
        }
    }

    /// A domain-level error outcome. `id` is still always present, per the
    /// external contract, even when it's only informational (capacity
    /// errors) or an echo of an unrecognized identifier.
    pub fn error(id: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            id: id.into(),
            stdout: None,
            stderr: None,
            error: Some(kind.as_str().to_string()),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
