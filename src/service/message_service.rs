//! Direct messaging between users.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::{Caller, Capability, authorize};
use crate::domain::{Message, MessageId, UserId};
use crate::error::MarketError;
use crate::persistence::Collection;

/// Sends, lists and marks direct messages.
#[derive(Debug)]
pub struct MessageService {
    messages: Arc<Collection<Message>>,
}

impl MessageService {
    /// Creates a new `MessageService`.
    #[must_use]
    pub fn new(messages: Arc<Collection<Message>>) -> Self {
        Self { messages }
    }

    /// Loads stored messages.
    ///
    /// # Errors
    ///
    /// Returns a store error if the collection fails to load.
    pub async fn hydrate(&self) -> Result<usize, MarketError> {
        self.messages.hydrate().await
    }

    /// Sends `body` from the caller to `recipient`.
    ///
    /// # Errors
    ///
    /// [`MarketError::Validation`] for an empty or overlong body or a
    /// message to oneself, or a store error.
    pub async fn send(
        &self,
        caller: &Caller,
        recipient: UserId,
        body: &str,
    ) -> Result<Message, MarketError> {
        authorize(caller, Capability::SendMessage)?;
        let message = Message::compose(caller.user_id, recipient, body, Utc::now())?;
        let message = self.messages.insert(message).await?;
        tracing::debug!(message_id = %message.id, sender = %caller.user_id, %recipient, "message sent");
        Ok(message)
    }

    /// Both directions of the caller's conversation with `other`, oldest
    /// first.
    pub async fn conversation(&self, caller: &Caller, other: UserId) -> Vec<Message> {
        let me = caller.user_id;
        let mut messages = self.messages.find(|m| m.between(me, other)).await;
        messages.sort_by_key(|m| m.sent_at);
        messages
    }

    /// Marks a message read. Only the recipient may do this, and only the
    /// first read is recorded.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`], [`MarketError::Forbidden`] for anyone
    /// but the recipient, or a store error.
    pub async fn mark_read(&self, caller: &Caller, id: MessageId) -> Result<Message, MarketError> {
        authorize(caller, Capability::ReadMessage)?;
        let (message, _changed) = self
            .messages
            .update(*id.as_uuid(), |m| m.mark_read(caller.user_id, Utc::now()))
            .await?;
        Ok(message)
    }

    /// Number of unread messages addressed to the caller.
    pub async fn unread_count(&self, caller: &Caller) -> usize {
        let me = caller.user_id;
        self.messages
            .find(|m| m.recipient_id == me && m.read_at.is_none())
            .await
            .len()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn user(role: Role) -> Caller {
        Caller::new(UserId::new(), role)
    }

    #[tokio::test]
    async fn conversation_and_unread_flow() {
        let svc = MessageService::new(Arc::new(Collection::in_memory()));
        let alice = user(Role::Customer);
        let bob = user(Role::ServiceProvider);

        let Ok(first) = svc.send(&alice, bob.user_id, "Is Saturday free?").await else {
            panic!("send should succeed");
        };
        let Ok(_) = svc.send(&bob, alice.user_id, "Yes, 10:00 works").await else {
            panic!("send should succeed");
        };
        let Ok(_) = svc.send(&alice, bob.user_id, "Booked, thanks").await else {
            panic!("send should succeed");
        };

        let thread = svc.conversation(&bob, alice.user_id).await;
        let bodies: Vec<&str> = thread.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["Is Saturday free?", "Yes, 10:00 works", "Booked, thanks"]);

        assert_eq!(svc.unread_count(&bob).await, 2);
        assert_eq!(svc.unread_count(&alice).await, 1);

        assert!(matches!(
            svc.mark_read(&alice, first.id).await,
            Err(MarketError::Forbidden(_))
        ));
        let Ok(read) = svc.mark_read(&bob, first.id).await else {
            panic!("recipient may mark read");
        };
        assert!(read.read_at.is_some());
        assert_eq!(svc.unread_count(&bob).await, 1);
    }

    #[tokio::test]
    async fn invalid_messages_rejected() {
        let svc = MessageService::new(Arc::new(Collection::in_memory()));
        let alice = user(Role::Customer);
        assert!(matches!(
            svc.send(&alice, alice.user_id, "hi").await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            svc.send(&alice, UserId::new(), "   ").await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            svc.mark_read(&alice, MessageId::new()).await,
            Err(MarketError::NotFound(_))
        ));
    }
}
