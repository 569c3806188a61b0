//! postbox-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Start the processing pipeline and re-enqueue pending messages.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.
//! 6. Stop the worker pool once the listener has drained.

mod config;
mod entities;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use postbox_core::{BroadcastNotifier, Pipeline};
use tracing::{info, warn};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::{AppState, ShutdownSignal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: POSTBOX_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "postbox-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = Arc::new(SqliteStore::connect(&cfg.database_url).await?);
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Pipeline ────────────────────────────────────────────────────────────
    let notifier = Arc::new(BroadcastNotifier::default());
    let pipeline_cfg = cfg.pipeline();
    let recovery_batch = pipeline_cfg.recovery_batch;
    let (dispatcher, pipeline) =
        Pipeline::start(Arc::clone(&store), Arc::clone(&notifier), pipeline_cfg);

    if let Err(e) = Pipeline::recover(store.as_ref(), &dispatcher, recovery_batch).await {
        warn!(error = %e, "failed to re-enqueue pending messages");
    }

    let shutdown = ShutdownSignal::new();
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        store,
        notifier,
        dispatcher,
        shutdown: shutdown.clone(),
    });

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    // Event streams end on the trigger so open connections can drain.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.trigger();
        })
        .await?;

    // ── 6. Workers ─────────────────────────────────────────────────────────────
    pipeline.shutdown().await;

    info!("postbox-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
