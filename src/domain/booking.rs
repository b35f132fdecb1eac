//! Customer appointments against a bookable listing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::availability::TimeSlot;
use super::{BookingId, Listing, ListingId, UserId};
use crate::error::{FieldError, MarketError, ValidationErrors};

/// Maximum length of customer notes on a booking.
pub const MAX_NOTES_LEN: usize = 500;

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Awaiting confirmation.
    Pending,
    /// Slot is held for the customer.
    Confirmed,
    /// Appointment took place.
    Completed,
    /// Cancelled by the customer, the provider or an admin.
    Cancelled,
    /// Could not be fulfilled.
    Failed,
}

impl BookingStatus {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Whether a booking in this status holds its slot.
    #[must_use]
    pub const fn holds_slot(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer's appointment on a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    listing_id: ListingId,
    customer_id: UserId,
    provider_id: UserId,
    slot: TimeSlot,
    status: BookingStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancellation_reason: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Creates a confirmed booking of `listing` starting at `start`.
    ///
    /// The slot is not checked here; the caller must have verified that
    /// `start` is one of the listing's available slots.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] when the notes are too long.
    pub fn confirmed(
        listing: &Listing,
        customer_id: UserId,
        start: DateTime<Utc>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if notes
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTES_LEN)
        {
            return Err(ValidationErrors(vec![FieldError::new(
                "notes",
                format!("must be at most {MAX_NOTES_LEN} characters"),
            )])
            .into());
        }
        Ok(Self {
            id: BookingId::new(),
            listing_id: listing.id(),
            customer_id,
            provider_id: listing.owner_id(),
            slot: TimeSlot::starting_at(start, listing.content().duration_minutes),
            status: BookingStatus::Confirmed,
            notes,
            created_at: now,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            completed_at: None,
        })
    }

    /// Booking identifier.
    #[must_use]
    pub const fn id(&self) -> BookingId {
        self.id
    }

    /// Booked listing.
    #[must_use]
    pub const fn listing_id(&self) -> ListingId {
        self.listing_id
    }

    /// Customer who booked.
    #[must_use]
    pub const fn customer_id(&self) -> UserId {
        self.customer_id
    }

    /// Provider owning the listing at booking time.
    #[must_use]
    pub const fn provider_id(&self) -> UserId {
        self.provider_id
    }

    /// Booked interval.
    #[must_use]
    pub const fn slot(&self) -> TimeSlot {
        self.slot
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> BookingStatus {
        self.status
    }

    /// Customer notes.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Cancellation time.
    #[must_use]
    pub const fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// Who cancelled.
    #[must_use]
    pub const fn cancelled_by(&self) -> Option<UserId> {
        self.cancelled_by
    }

    /// Why it was cancelled.
    #[must_use]
    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Completion time.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Cancels a pending or confirmed booking, releasing its slot.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Conflict`] from any other status.
    pub fn cancel(
        &mut self,
        by: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if !self.status.holds_slot() {
            return Err(MarketError::Conflict(format!(
                "booking {} is {} and cannot be cancelled",
                self.id, self.status
            )));
        }
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(by);
        self.cancellation_reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        Ok(())
    }

    /// Marks a confirmed booking as completed once it has started.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Conflict`] if the booking is not confirmed
    /// or its start time is still in the future.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.status != BookingStatus::Confirmed {
            return Err(MarketError::Conflict(format!(
                "booking {} is {} and cannot be completed",
                self.id, self.status
            )));
        }
        if now < self.slot.start {
            return Err(MarketError::Conflict(format!(
                "booking {} has not started yet",
                self.id
            )));
        }
        self.status = BookingStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::listing::tests::sample_listing;

    fn booking(start: DateTime<Utc>) -> Booking {
        let listing = sample_listing(UserId::new());
        let Ok(b) = Booking::confirmed(&listing, UserId::new(), start, None, Utc::now()) else {
            panic!("booking should be created");
        };
        b
    }

    #[test]
    fn confirmed_booking_spans_listing_duration() {
        let start = Utc::now() + Duration::days(1);
        let b = booking(start);
        assert_eq!(b.status(), BookingStatus::Confirmed);
        assert_eq!(b.slot().end - b.slot().start, Duration::minutes(60));
        assert!(b.status().holds_slot());
    }

    #[test]
    fn overlong_notes_rejected() {
        let listing = sample_listing(UserId::new());
        let notes = "x".repeat(MAX_NOTES_LEN + 1);
        let result = Booking::confirmed(&listing, UserId::new(), Utc::now(), Some(notes), Utc::now());
        let Err(MarketError::Validation(errors)) = result else {
            panic!("expected validation error");
        };
        assert!(errors.has_field("notes"));
    }

    #[test]
    fn cancel_releases_slot_once() {
        let mut b = booking(Utc::now() + Duration::days(1));
        let by = b.customer_id();
        assert!(b.cancel(by, Some("  running late ".into()), Utc::now()).is_ok());
        assert_eq!(b.status(), BookingStatus::Cancelled);
        assert!(!b.status().holds_slot());
        assert_eq!(b.cancellation_reason(), Some("running late"));
        assert!(matches!(
            b.cancel(by, None, Utc::now()),
            Err(MarketError::Conflict(_))
        ));
    }

    #[test]
    fn complete_requires_start_time_passed() {
        let start = Utc::now() + Duration::hours(2);
        let mut b = booking(start);
        assert!(matches!(b.complete(Utc::now()), Err(MarketError::Conflict(_))));
        assert!(b.complete(start + Duration::minutes(61)).is_ok());
        assert_eq!(b.status(), BookingStatus::Completed);
        assert!(b.completed_at().is_some());
    }

    #[test]
    fn cancelled_booking_cannot_complete() {
        let mut b = booking(Utc::now() - Duration::hours(2));
        let by = b.provider_id();
        assert!(b.cancel(by, None, Utc::now()).is_ok());
        assert!(b.complete(Utc::now()).is_err());
    }
}
