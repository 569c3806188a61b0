//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document endpoint (disable with `POSTBOX_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - `/messages` submission, listing and live stream

pub mod doc;
mod health;
mod messages;

use crate::middleware::{cors, trace};
use crate::state::AppState;
use axum::{middleware, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(messages::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{app_with_state, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn trace_id_is_echoed() {
        let (state, _pipeline) = test_state().await;
        let id = "6f1c2f3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f";
        let req = Request::builder()
            .uri("/health")
            .header("x-trace-id", id)
            .body(Body::empty())
            .unwrap();
        let res = app_with_state(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-trace-id"], id);
    }

    #[tokio::test]
    async fn trace_id_is_generated_when_missing() {
        let (state, _pipeline) = test_state().await;
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app_with_state(state).oneshot(req).await.unwrap();
        let generated = res.headers()["x-trace-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(generated).is_ok());
    }

    #[tokio::test]
    async fn openapi_document_lists_message_routes() {
        let (state, _pipeline) = test_state().await;
        let req = Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap();
        let res = app_with_state(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = crate::test_support::body_json(res).await;
        assert!(body["paths"]["/messages"].is_object());
        assert!(body["paths"]["/messages/stream"].is_object());
    }
}
