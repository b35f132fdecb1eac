//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::MarketConfig;
use crate::domain::{Booking, EventBus, Feedback, Listing, ListingId, Message};
use crate::error::MarketError;
use crate::persistence::{Collection, PostgresPersistence};
use crate::service::{BookingService, IdempotencyCache, ListingService, MessageService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Listing submission and review.
    pub listing_service: Arc<ListingService>,
    /// Availability, bookings and feedback.
    pub booking_service: Arc<BookingService>,
    /// Direct messages.
    pub message_service: Arc<MessageService>,
    /// Idempotency keys of listing submissions.
    pub idempotency: Arc<IdempotencyCache<ListingId>>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires collections and services from `config`, writing through to
    /// `backend` when one is given.
    #[must_use]
    pub fn new(config: &MarketConfig, backend: Option<PostgresPersistence>) -> Self {
        let timeout = config.store_timeout;
        let listings = Arc::new(Collection::<Listing>::new(backend.clone(), timeout));
        let bookings = Arc::new(Collection::<Booking>::new(backend.clone(), timeout));
        let feedback = Arc::new(Collection::<Feedback>::new(backend.clone(), timeout));
        let messages = Arc::new(Collection::<Message>::new(backend, timeout));

        let event_bus = EventBus::new(config.event_bus_capacity);
        let idempotency = Arc::new(IdempotencyCache::new(config.idempotency_ttl));

        let listing_service = Arc::new(ListingService::new(
            Arc::clone(&listings),
            Arc::clone(&idempotency),
            event_bus.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(
            listings,
            bookings,
            feedback,
            config.working_hours.clone(),
            event_bus.clone(),
        ));
        let message_service = Arc::new(MessageService::new(messages));

        Self {
            listing_service,
            booking_service,
            message_service,
            idempotency,
            event_bus,
        }
    }

    /// Loads every stored document into memory.
    ///
    /// # Errors
    ///
    /// Returns a store error if any collection fails to load.
    pub async fn hydrate(&self) -> Result<(), MarketError> {
        let listings = self.listing_service.listings().hydrate().await?;
        let (bookings, feedback) = self.booking_service.hydrate().await?;
        let messages = self.message_service.hydrate().await?;
        tracing::info!(listings, bookings, feedback, messages, "state hydrated");
        Ok(())
    }
}
