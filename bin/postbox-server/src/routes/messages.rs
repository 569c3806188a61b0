//! Message submission, listing and live-update routes.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use postbox_core::{MessageStore, Notifier, TOPIC_MESSAGES};
use serde_json::{json, Value};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::message::{
    CreateMessageRequest, CreateMessageResponse, ListMessagesQuery, MessageDetailResponse,
    MessageListResponse, MessageResponse,
};
use crate::state::AppState;

/// Most messages a single listing returns.
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(OpenApi)]
#[openapi(
    paths(create_message, list_messages, get_message, reprocess_message, stream_messages),
    components(schemas(
        CreateMessageRequest,
        CreateMessageResponse,
        MessageResponse,
        MessageListResponse,
        MessageDetailResponse
    ))
)]
pub struct MessagesApi;

/// Register message routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages",                 post(create_message).get(list_messages))
        .route("/messages/stream",          get(stream_messages))
        .route("/messages/{id}",            get(get_message))
        .route("/messages/{id}/reprocess",  post(reprocess_message))
}

/// Store a new message and hand it to the worker pool.
///
/// The response is sent once the message is stored and queued; processing
/// happens in the background.
#[utoipa::path(
    post,
    path = "/messages",
    tag = "messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message stored and queued", body = CreateMessageResponse),
        (status = 400, description = "Malformed JSON body"),
        (status = 413, description = "Request body too large"),
        (status = 422, description = "Field missing, of the wrong type or out of range"),
        (status = 503, description = "Work queue unavailable"),
    )
)]
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateMessageResponse>), ServerError> {
    let Json(body) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let req = CreateMessageRequest::from_json(&body).map_err(ServerError::Validation)?;

    let (Some(sender_id), Some(text)) = (req.sender_id, req.message) else {
        return Err(ServerError::BadRequest("sender_id and message are required".into()));
    };

    let message = state.store.create(sender_id, &text).await?;
    state.dispatcher.dispatch(message.id).await?;
    info!(message_id = message.id, sender_id, "message stored and queued");

    Ok((
        StatusCode::CREATED,
        Json(CreateMessageResponse {
            success: true,
            message_id: message.id,
            data: MessageResponse::from(&message),
        }),
    ))
}

/// List the most recent messages, newest first.
#[utoipa::path(
    get,
    path = "/messages",
    tag = "messages",
    params(ListMessagesQuery),
    responses(
        (status = 200, description = "Recent messages", body = MessageListResponse),
        (status = 500, description = "Store error"),
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListMessagesQuery>,
) -> Result<Json<MessageListResponse>, ServerError> {
    let limit = q.limit.unwrap_or(MAX_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    let messages = state.store.list(limit).await?;
    Ok(Json(MessageListResponse {
        success: true,
        data: messages.iter().map(MessageResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/messages/{id}",
    tag = "messages",
    params(("id" = i64, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message found", body = MessageDetailResponse),
        (status = 404, description = "Unknown message id"),
    )
)]
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageDetailResponse>, ServerError> {
    let message = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("message {id} not found")))?;
    Ok(Json(MessageDetailResponse {
        success: true,
        data: MessageResponse::from(&message),
    }))
}

/// Re-enqueue a message that is still pending, e.g. after its retries ran out.
#[utoipa::path(
    post,
    path = "/messages/{id}/reprocess",
    tag = "messages",
    params(("id" = i64, Path, description = "Message id")),
    responses(
        (status = 202, description = "Message queued for processing", body = serde_json::Value),
        (status = 404, description = "Unknown message id"),
        (status = 409, description = "Message already processed"),
    )
)]
pub async fn reprocess_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServerError> {
    let message = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("message {id} not found")))?;

    if message.is_processed {
        return Err(ServerError::Conflict(format!("message {id} is already processed")));
    }

    state.dispatcher.dispatch(id).await?;
    info!(message_id = id, "message re-enqueued");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "message_id": id, "status": "pending" })),
    ))
}

/// Server-sent events for every processed message.
///
/// Each event is named `message.received` and carries the full message as
/// JSON. Only messages processed after the client connects are delivered.
/// The stream ends when the server starts shutting down.
#[utoipa::path(
    get,
    path = "/messages/stream",
    tag = "messages",
    responses(
        (status = 200, description = "text/event-stream of message.received events"),
    )
)]
pub async fn stream_messages(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let subscription = state.notifier.subscribe(TOPIC_MESSAGES);
    debug!(subscribers = state.notifier.subscriber_count(TOPIC_MESSAGES), "stream client connected");

    let shutdown = state.shutdown.clone();
    let stream = subscription
        .into_stream()
        .take_until(async move { shutdown.requested().await })
        .map(|event| {
            let data = serde_json::to_string(&event.payload)
                .unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string());
            Ok::<SseEvent, Infallible>(SseEvent::default().event(event.name).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
