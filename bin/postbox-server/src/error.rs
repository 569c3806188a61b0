//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** internal store errors are logged with full
//! detail but only a generic message is returned to the caller so that file
//! paths, SQL, or other implementation details never leak to clients.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use postbox_core::{DispatchError, StoreError};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

/// All errors that can occur in the postbox-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Request body failed field validation; field name → messages.
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    /// Propagated from the message store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The work queue refused the item.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request conflicts with the current state of the resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request body exceeds what the server will buffer.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
}

/// Field name → messages, as returned for 422 responses.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

fn validation_body(errors: FieldErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "success": false, "errors": errors })),
    )
        .into_response()
}

pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::Validation(errors) => return validation_body(errors.clone()),

            ServerError::Store(StoreError::Validation { field, reason }) => {
                let mut errors = FieldErrors::new();
                errors.insert((*field).to_owned(), vec![format!("The {field} {reason}.")]);
                return validation_body(errors);
            }
            ServerError::Store(e @ StoreError::NotFound { .. }) => {
                warn!(error = %e, "stale message reference");
                (StatusCode::NOT_FOUND, e.to_string())
            }
            ServerError::Store(e @ StoreError::AlreadyProcessed { .. }) => {
                (StatusCode::CONFLICT, e.to_string())
            }
            ServerError::Store(e @ StoreError::Transient(_)) => {
                error!(error = %e, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }

            ServerError::Dispatch(e) => {
                error!(error = %e, "failed to enqueue message");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "message processing is unavailable".to_owned(),
                )
            }

            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
        };
        (
            status,
            Json(json!({ "success": false, "error": client_message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn status_of(e: ServerError) -> StatusCode {
        e.into_response().status()
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(
            status_of(StoreError::NotFound { id: 1 }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StoreError::AlreadyProcessed { id: 1 }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::transient("locked").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(
                StoreError::Validation {
                    field: "message",
                    reason: "must not be empty".into()
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn dispatch_closed_is_unavailable() {
        assert_eq!(
            status_of(DispatchError::Closed.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn client_errors_keep_message() {
        assert_eq!(status_of(ServerError::BadRequest("nope".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ServerError::NotFound("gone".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ServerError::PayloadTooLarge("big".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn validation_errors_list_every_field() {
        let mut errors = FieldErrors::new();
        errors.insert("sender_id".into(), vec!["The sender id field must be an integer.".into()]);
        let res = ServerError::Validation(errors).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
