//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use postbox_core::{BroadcastNotifier, Dispatcher};
use tokio::sync::watch;

use crate::config::Config;
use crate::entities::SqliteStore;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Persistent message store.
    pub store: Arc<SqliteStore>,
    /// Fan-out channel for processed-message events.
    pub notifier: Arc<BroadcastNotifier>,
    /// Hands stored message ids to the worker pool.
    pub dispatcher: Dispatcher,
    /// Ends long-lived responses once graceful shutdown begins.
    pub shutdown: ShutdownSignal,
}

/// Server-wide shutdown flag. Cheap to clone; every clone observes the same
/// trigger.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves once [`ShutdownSignal::trigger`] has been called, immediately
    /// if it already was.
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once triggered.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
