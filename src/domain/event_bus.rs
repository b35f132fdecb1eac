//! Broadcast channel for domain events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every state
//! mutation publishes a [`ListingEvent`] through the bus; WebSocket
//! connections and the event recorder subscribe to it.

use tokio::sync::broadcast;

use super::ListingEvent;

/// Broadcast bus for [`ListingEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for
/// lagging receivers. Publishing never fails the operation that emitted
/// the event.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ListingEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event. With no
    /// active receivers the event is dropped.
    pub fn publish(&self, event: ListingEvent) -> usize {
        let event_type = event.event_type_str();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(event_type, delivered, "event published");
        delivered
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ListingEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
