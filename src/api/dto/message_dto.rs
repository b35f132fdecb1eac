//! Direct message DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Message;

/// Request body for `POST /messages`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Recipient user.
    pub recipient_id: Uuid,
    /// Message text, up to 2000 characters.
    pub body: String,
}

/// A direct message.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Message identifier.
    pub id: Uuid,
    /// Author.
    pub sender_id: Uuid,
    /// Recipient.
    pub recipient_id: Uuid,
    /// Text.
    pub body: String,
    /// Send time.
    pub sent_at: DateTime<Utc>,
    /// First read by the recipient.
    pub read_at: Option<DateTime<Utc>>,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: *message.id.as_uuid(),
            sender_id: *message.sender_id.as_uuid(),
            recipient_id: *message.recipient_id.as_uuid(),
            body: message.body.clone(),
            sent_at: message.sent_at,
            read_at: message.read_at,
        }
    }
}

/// Response body for `GET /messages/unread-count`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    /// Unread messages addressed to the caller.
    pub unread: usize,
}
