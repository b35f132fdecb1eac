//! Direct messages between two users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageId, UserId};
use crate::error::{FieldError, MarketError, ValidationErrors};

/// Maximum trimmed body length.
pub const MAX_BODY_LEN: usize = 2000;

/// A message from one user to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Author.
    pub sender_id: UserId,
    /// Addressee.
    pub recipient_id: UserId,
    /// Trimmed text.
    pub body: String,
    /// When it was sent.
    pub sent_at: DateTime<Utc>,
    /// When the recipient first read it.
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Composes a message.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] when the trimmed body is empty
    /// or too long, or when sender and recipient are the same user.
    pub fn compose(
        sender_id: UserId,
        recipient_id: UserId,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        let body = body.trim();
        let mut errors = Vec::new();
        if body.is_empty() {
            errors.push(FieldError::new("body", "must not be empty"));
        } else if body.chars().count() > MAX_BODY_LEN {
            errors.push(FieldError::new(
                "body",
                format!("must be at most {MAX_BODY_LEN} characters"),
            ));
        }
        if sender_id == recipient_id {
            errors.push(FieldError::new("recipient_id", "cannot message yourself"));
        }
        if !errors.is_empty() {
            return Err(ValidationErrors(errors).into());
        }
        Ok(Self {
            id: MessageId::new(),
            sender_id,
            recipient_id,
            body: body.to_string(),
            sent_at: now,
            read_at: None,
        })
    }

    /// Returns `true` if the message was exchanged between `a` and `b`
    /// in either direction.
    #[must_use]
    pub fn between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.recipient_id == b)
            || (self.sender_id == b && self.recipient_id == a)
    }

    /// Marks the message read by `reader`. Only the first read is
    /// recorded. Returns `true` if this call changed the message.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Forbidden`] unless `reader` is the recipient.
    pub fn mark_read(&mut self, reader: UserId, now: DateTime<Utc>) -> Result<bool, MarketError> {
        if reader != self.recipient_id {
            return Err(MarketError::Forbidden(format!(
                "only the recipient can mark message {} read",
                self.id
            )));
        }
        if self.read_at.is_some() {
            return Ok(false);
        }
        self.read_at = Some(now);
        Ok(true)
    }
}
