//! Domain events reflecting listing and booking state changes.
//!
//! Every state change emits a [`ListingEvent`] through the
//! [`super::EventBus`]. Events are broadcast to WebSocket subscribers and
//! optionally persisted to the PostgreSQL event log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::approval::RequestType;
use super::{BookingId, ListingId, ListingKind, ListingStatus, PublicId, UserId};

/// Domain event emitted after every state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ListingEvent {
    /// A provider submitted (or resubmitted) a listing for first review.
    ListingSubmitted {
        /// Listing identifier.
        listing_id: ListingId,
        /// Service or package.
        kind: ListingKind,
        /// Submitting provider.
        owner_id: UserId,
        /// Submission time.
        timestamp: DateTime<Utc>,
    },

    /// A provider staged an update, delete or reactivate request.
    ChangeRequested {
        /// Listing identifier.
        listing_id: ListingId,
        /// Identifier of the staged request.
        request_id: Uuid,
        /// What was asked for.
        request_type: RequestType,
        /// Requesting provider.
        owner_id: UserId,
        /// Request time.
        timestamp: DateTime<Utc>,
    },

    /// An admin decision or suspension changed the listing.
    StatusChanged {
        /// Listing identifier.
        listing_id: ListingId,
        /// Public id, once assigned.
        public_id: Option<PublicId>,
        /// Status after the change.
        new_status: ListingStatus,
        /// Acting admin.
        actor_id: UserId,
        /// Reason given with the decision.
        reason: Option<String>,
        /// Decision time.
        timestamp: DateTime<Utc>,
    },

    /// A customer booked a slot.
    BookingConfirmed {
        /// Booked listing.
        listing_id: ListingId,
        /// Booking identifier.
        booking_id: BookingId,
        /// Booking customer.
        customer_id: UserId,
        /// Slot start.
        start: DateTime<Utc>,
        /// Slot end.
        end: DateTime<Utc>,
        /// Booking time.
        timestamp: DateTime<Utc>,
    },

    /// A booking was cancelled and its slot released.
    BookingCancelled {
        /// Booked listing.
        listing_id: ListingId,
        /// Booking identifier.
        booking_id: BookingId,
        /// Who cancelled.
        cancelled_by: UserId,
        /// Reason given.
        reason: Option<String>,
        /// Cancellation time.
        timestamp: DateTime<Utc>,
    },
}

impl ListingEvent {
    /// Returns the listing ID associated with this event.
    #[must_use]
    pub fn listing_id(&self) -> ListingId {
        match self {
            Self::ListingSubmitted { listing_id, .. }
            | Self::ChangeRequested { listing_id, .. }
            | Self::StatusChanged { listing_id, .. }
            | Self::BookingConfirmed { listing_id, .. }
            | Self::BookingCancelled { listing_id, .. } => *listing_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::ListingSubmitted { .. } => "listing_submitted",
            Self::ChangeRequested { .. } => "change_requested",
            Self::StatusChanged { .. } => "status_changed",
            Self::BookingConfirmed { .. } => "booking_confirmed",
            Self::BookingCancelled { .. } => "booking_cancelled",
        }
    }

    /// When the event happened.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ListingSubmitted { timestamp, .. }
            | Self::ChangeRequested { timestamp, .. }
            | Self::StatusChanged { timestamp, .. }
            | Self::BookingConfirmed { timestamp, .. }
            | Self::BookingCancelled { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_changed_serializes_with_tag() {
        let event = ListingEvent::StatusChanged {
            listing_id: ListingId::new(),
            public_id: PublicId::new(ListingKind::Service, 7),
            new_status: ListingStatus::Approved,
            actor_id: UserId::new(),
            reason: None,
            timestamp: Utc::now(),
        };
        let Ok(json) = serde_json::to_value(&event) else {
            panic!("event should serialize");
        };
        assert_eq!(json["event_type"], "status_changed");
        assert_eq!(json["public_id"], "SRV_007");
        assert_eq!(json["new_status"], "approved");
        assert_eq!(event.event_type_str(), "status_changed");
    }

    #[test]
    fn listing_id_accessor() {
        let id = ListingId::new();
        let event = ListingEvent::BookingCancelled {
            listing_id: id,
            booking_id: BookingId::new(),
            cancelled_by: UserId::new(),
            reason: None,
            timestamp: Utc::now(),
        };
        assert_eq!(event.listing_id(), id);
        assert_eq!(event.event_type_str(), "booking_cancelled");
    }
}
