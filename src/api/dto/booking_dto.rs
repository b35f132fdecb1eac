//! Availability, booking and feedback DTOs.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{Booking, Feedback, FeedbackSummary, ListingId, TimeSlot};

/// Query parameters for `GET /availability`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// Listing to check.
    pub listing_id: Uuid,
    /// Business-local date, `YYYY-MM-DD`.
    pub date: NaiveDate,
}

/// A bookable slot.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotDto {
    /// Slot start (UTC).
    pub start: DateTime<Utc>,
    /// Slot end (UTC).
    pub end: DateTime<Utc>,
    /// Business-local start, `HH:MM`; pass this as `time` when booking.
    pub local_time: String,
}

impl SlotDto {
    /// Converts a slot, rendering the local start in `offset`.
    #[must_use]
    pub fn new(slot: &TimeSlot, offset: FixedOffset) -> Self {
        Self {
            start: slot.start,
            end: slot.end,
            local_time: slot.start.with_timezone(&offset).format("%H:%M").to_string(),
        }
    }
}

/// Response body for `GET /availability`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    /// Listing checked.
    pub listing_id: Uuid,
    /// Date checked.
    pub date: NaiveDate,
    /// Free slots in ascending order.
    pub slots: Vec<SlotDto>,
}

/// Request body for `POST /bookings`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BookRequest {
    /// Listing to book.
    pub listing_id: Uuid,
    /// Business-local date, `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Business-local start time, `HH:MM`.
    pub time: String,
    /// Notes for the provider, up to 500 characters.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Booking as returned by the booking endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingResponse {
    /// Booking identifier.
    pub id: Uuid,
    /// Booked listing.
    pub listing_id: Uuid,
    /// Customer who booked.
    pub customer_id: Uuid,
    /// Provider owning the listing.
    pub provider_id: Uuid,
    /// `pending`, `confirmed`, `completed`, `cancelled` or `failed`.
    pub status: String,
    /// Slot start (UTC).
    pub start: DateTime<Utc>,
    /// Slot end (UTC).
    pub end: DateTime<Utc>,
    /// Customer notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Cancellation time.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Cancellation reason.
    pub cancellation_reason: Option<String>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Booking> for BookingResponse {
    fn from(booking: &Booking) -> Self {
        let slot = booking.slot();
        Self {
            id: *booking.id().as_uuid(),
            listing_id: *booking.listing_id().as_uuid(),
            customer_id: *booking.customer_id().as_uuid(),
            provider_id: *booking.provider_id().as_uuid(),
            status: booking.status().as_str().to_string(),
            start: slot.start,
            end: slot.end,
            notes: booking.notes().map(str::to_owned),
            created_at: booking.created_at(),
            cancelled_at: booking.cancelled_at(),
            cancellation_reason: booking.cancellation_reason().map(str::to_owned),
            completed_at: booking.completed_at(),
        }
    }
}

/// Request body for `POST /bookings/{id}/feedback`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    /// Rating from 1 to 5.
    pub rating: u8,
    /// Optional comment, up to 1000 characters.
    #[serde(default)]
    pub comment: Option<String>,
}

/// One feedback entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackResponse {
    /// Feedback identifier.
    pub id: Uuid,
    /// Rated booking.
    pub booking_id: Uuid,
    /// Rated listing.
    pub listing_id: Uuid,
    /// Author.
    pub customer_id: Uuid,
    /// Rating from 1 to 5.
    pub rating: u8,
    /// Comment.
    pub comment: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&Feedback> for FeedbackResponse {
    fn from(entry: &Feedback) -> Self {
        Self {
            id: *entry.id.as_uuid(),
            booking_id: *entry.booking_id.as_uuid(),
            listing_id: *entry.listing_id.as_uuid(),
            customer_id: *entry.customer_id.as_uuid(),
            rating: entry.rating,
            comment: entry.comment.clone(),
            created_at: entry.created_at,
        }
    }
}

/// Response body for `GET /listings/{id}/feedback`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackSummaryResponse {
    /// Listing rated.
    pub listing_id: Uuid,
    /// Mean rating, absent without feedback.
    pub average_rating: Option<f64>,
    /// Number of entries.
    pub count: usize,
    /// Entries, newest first.
    pub entries: Vec<FeedbackResponse>,
}

impl FeedbackSummaryResponse {
    /// Builds the summary view.
    #[must_use]
    pub fn new(listing_id: ListingId, summary: &FeedbackSummary) -> Self {
        Self {
            listing_id: *listing_id.as_uuid(),
            average_rating: summary.average_rating,
            count: summary.count,
            entries: summary.entries.iter().map(FeedbackResponse::from).collect(),
        }
    }
}
