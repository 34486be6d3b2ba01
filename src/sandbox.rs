//! Shared capability-denial vocabulary for the Sandbox installed inside each
//! worker process.
//!
//! The actual installation (replacing the interpreter's file/os library
//! tables with native stub functions) lives in the worker binary, since it
//! needs the embedded interpreter's API. This module holds the text contract
//! both sides can agree on and unit-test without spinning up the interpreter.

/// Formats the permission-denied message a sandboxed capability raises when
/// invoked. The wire contract (spec §4.4, §8 scenario 10) requires this
/// text to surface verbatim in the execution's `stderr`.
pub fn permission_denied(capability: &str) -> String {
    format!("PermissionError: {capability} is not permitted in this sandbox")
}

/// Capabilities removed from the worker's interpreter namespace at startup.
/// Used both to drive the stub installation and to assert coverage in tests.
pub const DENIED_CAPABILITIES: &[&str] = &[
    "filesystem read/write",
    "filesystem delete/rename",
    "network sockets",
    "process spawn",
];
