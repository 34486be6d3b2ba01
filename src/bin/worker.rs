//! sessionbox-worker
//!
//! Hosts one persistent Lua interpreter for the lifetime of the process.
//! Speaks the length-prefixed JSON protocol (spec §4.3) over its own
//! stdin/stdout — the real process stdio is reserved for this control
//! channel, which is why the interpreter's own `print` is redirected into
//! an in-memory buffer rather than left pointed at file descriptor 1.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use mlua::{Lua, Table, Value, Variadic};
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use sessionbox::sandbox::permission_denied;
use sessionbox::transport::{recv_message, send_message, WorkerRequest, WorkerResponse};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let lua = Lua::new();
    install_sandbox(&lua).context("failed to install sandbox")?;
    let stdout_buf = install_print(&lua).context("failed to install print capture")?;

    let mut input = stdin();
    let mut output = stdout();

    let ready = serde_json::to_vec(&WorkerResponse::Ready)?;
    send_message(&mut output, &ready).await?;

    loop {
        let payload = match recv_message(&mut input).await {
            Ok(payload) => payload,
            Err(_) => break, // supervisor closed the pipe
        };

        let request: WorkerRequest = serde_json::from_slice(&payload)?;
        let response = match request {
            WorkerRequest::Ping => WorkerResponse::Pong,
            WorkerRequest::Shutdown => {
                let bytes = serde_json::to_vec(&WorkerResponse::Pong)?;
                send_message(&mut output, &bytes).await?;
                break;
            }
            WorkerRequest::Execute { code } => execute(&lua, &stdout_buf, &code),
        };

        let bytes = serde_json::to_vec(&response)?;
        send_message(&mut output, &bytes).await?;
    }

    Ok(())
}

/// Run one code fragment against the persistent namespace (spec §4.3
/// request loop).
fn execute(lua: &Lua, stdout_buf: &Arc<Mutex<String>>, code: &str) -> WorkerResponse {
    stdout_buf.lock().unwrap().clear();

    let stderr = match lua.load(code).exec() {
        Ok(()) => String::new(),
        Err(err) => format!("{err}"),
    };

    let stdout = stdout_buf.lock().unwrap().clone();
    WorkerResponse::Result { stdout, stderr }
}

/// Redirect the interpreter's `print` into a buffer we control, so captured
/// output never touches the real stdout (reserved for the control protocol).
fn install_print(lua: &Lua) -> mlua::Result<Arc<Mutex<String>>> {
    let buffer = Arc::new(Mutex::new(String::new()));
    let captured = Arc::clone(&buffer);
    let tostring: mlua::Function = lua.globals().get("tostring")?;

    let print = lua.create_function(move |_, args: Variadic<Value>| {
        let mut parts = Vec::with_capacity(args.len());
        for value in args.iter() {
            let text: String = tostring.call(value.clone())?;
            parts.push(text);
        }
        let mut buffer = captured.lock().unwrap();
        buffer.push_str(&parts.join("\t"));
        buffer.push('\n');
        Ok(())
    })?;

    lua.globals().set("print", print)?;
    Ok(buffer)
}

/// Install the Sandbox (spec §4.4): replace `io` and `os` wholesale with
/// tables whose entries immediately raise a permission-denied error, except
/// for the handful of introspection functions explicitly permitted.
fn install_sandbox(lua: &Lua) -> mlua::Result<()> {
    let denied_io = lua.create_table()?;
    for name in ["open", "popen", "lines", "input", "output", "tmpfile", "close"] {
        denied_io.set(name, deny_fn(lua, "filesystem read/write")?)?;
    }
    lua.globals().set("io", denied_io)?;

    let original_os: Table = lua.globals().get("os")?;
    let replacement_os = lua.create_table()?;
    for name in ["execute"] {
        replacement_os.set(name, deny_fn(lua, "process spawn")?)?;
    }
    for name in ["remove", "rename", "tmpname"] {
        replacement_os.set(name, deny_fn(lua, "filesystem delete/rename")?)?;
    }
    for name in ["time", "clock", "date", "difftime", "getenv"] {
        let value: Value = original_os.get(name)?;
        replacement_os.set(name, value)?;
    }
    lua.globals().set("os", replacement_os)?;

    Ok(())
}

fn deny_fn(lua: &Lua, capability: &'static str) -> mlua::Result<mlua::Function> {
    lua.create_function(move |_, _args: Variadic<Value>| -> mlua::Result<()> {
        Err(mlua::Error::RuntimeError(permission_denied(capability)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_globals_across_executions() {
        let lua = Lua::new();
        install_sandbox(&lua).unwrap();
        let stdout_buf = install_print(&lua).unwrap();

        let first = execute(&lua, &stdout_buf, "x = 42");
        assert!(matches!(first, WorkerResponse::Result { ref stderr, .. } if stderr.is_empty()));

        let second = execute(&lua, &stdout_buf, "print(x)");
        match second {
            WorkerResponse::Result { stdout, stderr } => {
                assert_eq!(stdout, "42\n");
                assert!(stderr.is_empty());
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn runtime_error_becomes_stderr_not_a_crash() {
        let lua = Lua::new();
        install_sandbox(&lua).unwrap();
        let stdout_buf = install_print(&lua).unwrap();

        let response = execute(&lua, &stdout_buf, "error('boom')");
        match response {
            WorkerResponse::Result { stdout, stderr } => {
                assert!(stdout.is_empty());
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn sandbox_blocks_file_open() {
        let lua = Lua::new();
        install_sandbox(&lua).unwrap();
        let stdout_buf = install_print(&lua).unwrap();

        let response = execute(&lua, &stdout_buf, "io.open('t.txt', 'w')");
        match response {
            WorkerResponse::Result { stderr, .. } => {
                assert!(stderr.contains("PermissionError"));
                assert!(stderr.contains("not permitted in this sandbox"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn sandbox_blocks_process_spawn() {
        let lua = Lua::new();
        install_sandbox(&lua).unwrap();
        let stdout_buf = install_print(&lua).unwrap();

        let response = execute(&lua, &stdout_buf, "os.execute('echo hi')");
        match response {
            WorkerResponse::Result { stderr, .. } => {
                assert!(stderr.contains("PermissionError"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn isolation_separate_lua_instances_do_not_share_state() {
        let lua_a = Lua::new();
        install_sandbox(&lua_a).unwrap();
        let buf_a = install_print(&lua_a).unwrap();
        execute(&lua_a, &buf_a, "x = 1");

        let lua_b = Lua::new();
        install_sandbox(&lua_b).unwrap();
        let buf_b = install_print(&lua_b).unwrap();
        let response = execute(&lua_b, &buf_b, "print(x)");

        match response {
            WorkerResponse::Result { stderr, .. } => {
                assert!(!stderr.is_empty(), "x should be undefined in a fresh namespace");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
