//! Shared fixtures for handler and router tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Response;
use axum::Router;
use http_body_util::BodyExt;
use postbox_core::{BroadcastNotifier, Pipeline, PipelineConfig};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::{AppState, ShutdownSignal};

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        log_level: "debug".into(),
        log_json: false,
        queue_capacity: 16,
        workers: 1,
        max_attempts: 2,
        retry_backoff_ms: 10,
        cors_allowed_origins: None,
        enable_swagger: true,
    }
}

/// Fresh in-memory state with a running single-worker pipeline.
///
/// Keep the returned [`Pipeline`] alive for the duration of the test;
/// dropping it stops the workers.
pub async fn test_state() -> (Arc<AppState>, Pipeline) {
    let config = test_config();
    let store = Arc::new(
        SqliteStore::connect(&config.database_url)
            .await
            .expect("in-memory sqlite"),
    );
    let notifier = Arc::new(BroadcastNotifier::default());
    let pipeline_config: PipelineConfig = config.pipeline();
    let (dispatcher, pipeline) =
        Pipeline::start(Arc::clone(&store), Arc::clone(&notifier), pipeline_config);

    let state = Arc::new(AppState {
        config: Arc::new(config),
        store,
        notifier,
        dispatcher,
        shutdown: ShutdownSignal::new(),
    });
    (state, pipeline)
}

pub fn app_with_state(state: Arc<AppState>) -> Router {
    crate::routes::build(state)
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
    let bytes = res
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
