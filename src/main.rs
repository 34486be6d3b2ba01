//! sessionboxd
//!
//! Accepts source-code snippets over HTTP and executes them inside
//! constrained, stateful sessions backed by a bounded pool of worker
//! processes.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sessionbox::config::Config;
use sessionbox::http::{router, AppState};
use sessionbox::session::SessionManager;

#[derive(Parser, Debug)]
#[command(name = "sessionboxd")]
#[command(about = "Sandboxed, stateful code execution sessions over HTTP")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error). Overridden by `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    let log_filter = args
        .log_level
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    let worker_path = Config::worker_exec_path().context("failed to resolve worker binary")?;
    if !worker_path.exists() {
        warn!(path = %worker_path.display(), "worker binary not found next to sessionboxd");
    }

    info!(
        listen = %config.server.listen,
        max_sessions = config.session.max_sessions,
        "sessionboxd starting"
    );

    let session_manager = Arc::new(SessionManager::new(config.session.clone(), worker_path));
    let reaper = session_manager.start_reaper();

    let state = AppState {
        session_manager: Arc::clone(&session_manager),
        start_time: Instant::now(),
    };

    let app = router(state).layer(ConcurrencyLimitLayer::new(config.server.max_connections));

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;

    info!("server ready");

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    info!("shutting down");
    reaper.abort();
    session_manager.close_all().await;
    info!("goodbye");

    Ok(())
}
