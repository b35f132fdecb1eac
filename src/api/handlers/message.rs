//! Direct message handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{MessageResponse, SendMessageRequest, UnreadCountResponse};
use crate::app_state::AppState;
use crate::auth::Caller;
use crate::domain::{MessageId, UserId};
use crate::error::{ErrorResponse, MarketError};

/// `POST /messages`: send a direct message.
///
/// # Errors
///
/// Returns [`MarketError::Validation`] for an empty or overlong body or a
/// message to oneself.
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "Messages",
    summary = "Send a message",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = MessageResponse),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Json(req) = payload?;
    let message = state
        .message_service
        .send(&caller, UserId::from_uuid(req.recipient_id), &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(&message))))
}

/// `GET /messages/with/{user_id}`: conversation with another user.
///
/// # Errors
///
/// Returns [`MarketError::Unauthenticated`] without identity headers.
#[utoipa::path(
    get,
    path = "/api/v1/messages/with/{user_id}",
    tag = "Messages",
    summary = "Get a conversation",
    description = "Messages in both directions between the caller and `user_id`, oldest first.",
    params(("user_id" = Uuid, Path, description = "Other participant")),
    responses(
        (status = 200, description = "Conversation", body = Vec<MessageResponse>),
    )
)]
pub async fn conversation(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let messages = state
        .message_service
        .conversation(&caller, UserId::from_uuid(user_id))
        .await;
    let body: Vec<MessageResponse> = messages.iter().map(MessageResponse::from).collect();
    Ok(Json(body))
}

/// `POST /messages/{id}/read`: mark a message read.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] unless the caller is the recipient.
#[utoipa::path(
    post,
    path = "/api/v1/messages/{id}/read",
    tag = "Messages",
    summary = "Mark a message read",
    params(("id" = Uuid, Path, description = "Message UUID")),
    responses(
        (status = 200, description = "Message marked read", body = MessageResponse),
        (status = 403, description = "Not the recipient", body = ErrorResponse),
        (status = 404, description = "Message not found", body = ErrorResponse),
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let message = state
        .message_service
        .mark_read(&caller, MessageId::from_uuid(id))
        .await?;
    Ok(Json(MessageResponse::from(&message)))
}

/// `GET /messages/unread-count`: unread messages for the caller.
///
/// # Errors
///
/// Returns [`MarketError::Unauthenticated`] without identity headers.
#[utoipa::path(
    get,
    path = "/api/v1/messages/unread-count",
    tag = "Messages",
    summary = "Count unread messages",
    responses(
        (status = 200, description = "Unread count", body = UnreadCountResponse),
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, MarketError> {
    let unread = state.message_service.unread_count(&caller).await;
    Ok(Json(UnreadCountResponse { unread }))
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route("/messages/with/{user_id}", get(conversation))
        .route("/messages/{id}/read", post(mark_read))
        .route("/messages/unread-count", get(unread_count))
}
