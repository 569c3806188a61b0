use axum::{
    body::{Body, Bytes, HttpBody},
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    BoxError,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ServerError;

pub static X_TRACE_ID: &str = "x-trace-id";

/// JSON bodies at or above this size are not logged.
const MAX_LOGGED_BODY: usize = 1024;

/// Upper bound on a JSON body buffered for logging; larger bodies, and
/// bodies of unknown length, pass through unlogged.
const MAX_BUFFERED_BODY: usize = 1024 * 1024;

/// Wrap every request in an `http_request` span keyed by a trace id.
///
/// The id is taken from the `x-trace-id` request header when it holds a
/// valid UUID, otherwise generated, and is echoed on the response.
pub async fn trace_middleware(req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("→ request started");
        let (parts, body) = req.into_parts();
        let response = match log_json_body("request", &parts.headers, body).await {
            Ok(body) => {
                let mut req = Request::from_parts(parts, body);
                if let Some(value) = &trace_header {
                    req.headers_mut().insert(X_TRACE_ID, value.clone());
                }
                next.run(req).await
            }
            Err(e) => body_rejection(e).into_response(),
        };

        let (parts, body) = response.into_parts();
        let body = match log_json_body("response", &parts.headers, body).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to buffer response body");
                Body::empty()
            }
        };
        let mut response = Response::from_parts(parts, body);
        if let Some(value) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Buffer and log small JSON bodies; anything else (event streams included)
/// passes through untouched.
async fn log_json_body(direction: &str, headers: &header::HeaderMap, body: Body) -> Result<Body, BoxError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return Ok(body);
    }

    let declared = body.size_hint().upper();
    if declared.is_none_or(|len| len > MAX_BUFFERED_BODY as u64) {
        debug!(direction, size = ?declared, "json body not buffered");
        return Ok(body);
    }

    // The size hint is only a promise; the limit holds even if it is wrong.
    let bytes: Bytes = Limited::new(body, MAX_BUFFERED_BODY).collect().await?.to_bytes();

    match std::str::from_utf8(&bytes) {
        Ok(text) if bytes.len() < MAX_LOGGED_BODY => debug!(direction, body = %text, "json body"),
        _ => debug!(direction, size = bytes.len(), "json body skipped"),
    }

    Ok(Body::from(bytes))
}

fn body_rejection(e: BoxError) -> ServerError {
    if e.is::<LengthLimitError>() {
        ServerError::PayloadTooLarge(format!("request body exceeds {MAX_BUFFERED_BODY} bytes"))
    } else {
        warn!(error = %e, "failed to read request body");
        ServerError::BadRequest("failed to read request body".into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let err = Limited::new(Body::from("too long"), 4).collect().await.unwrap_err();
        let res = body_rejection(err).into_response();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn large_json_body_passes_through_intact() {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let payload = "x".repeat(MAX_BUFFERED_BODY + 1);

        let body = log_json_body("request", &headers, Body::from(payload.clone())).await.unwrap();
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes.len(), payload.len());
    }
}
