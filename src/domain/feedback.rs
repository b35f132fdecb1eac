//! Customer ratings of completed appointments.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::booking::{Booking, BookingStatus};
use super::{BookingId, FeedbackId, ListingId, UserId};
use crate::error::{FieldError, MarketError, ValidationErrors};

/// Accepted star ratings.
pub const RATING_RANGE: RangeInclusive<u8> = 1..=5;

/// Maximum comment length.
pub const MAX_COMMENT_LEN: usize = 1000;

/// A rating left by a customer on a completed booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Feedback identifier.
    pub id: FeedbackId,
    /// Rated booking. At most one feedback exists per booking.
    pub booking_id: BookingId,
    /// Listing the booking was for.
    pub listing_id: ListingId,
    /// Author.
    pub customer_id: UserId,
    /// Stars, within [`RATING_RANGE`].
    pub rating: u8,
    /// Optional free text.
    pub comment: Option<String>,
    /// When it was left.
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    /// Builds feedback on `booking` by `customer_id`.
    ///
    /// Uniqueness per booking is enforced by the caller, which sees all
    /// existing feedback.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] if the booking is someone else's.
    /// - [`MarketError::Conflict`] if the booking is not completed.
    /// - [`MarketError::Validation`] for an out-of-range rating or an
    ///   overlong comment.
    pub fn leave(
        booking: &Booking,
        customer_id: UserId,
        rating: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        if booking.customer_id() != customer_id {
            return Err(MarketError::Forbidden(format!(
                "booking {} belongs to another customer",
                booking.id()
            )));
        }
        if booking.status() != BookingStatus::Completed {
            return Err(MarketError::Conflict(format!(
                "booking {} is {}; only completed bookings can be rated",
                booking.id(),
                booking.status()
            )));
        }

        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let mut errors = Vec::new();
        if !RATING_RANGE.contains(&rating) {
            errors.push(FieldError::new("rating", "must be between 1 and 5"));
        }
        if comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENT_LEN)
        {
            errors.push(FieldError::new(
                "comment",
                format!("must be at most {MAX_COMMENT_LEN} characters"),
            ));
        }
        if !errors.is_empty() {
            return Err(ValidationErrors(errors).into());
        }

        Ok(Self {
            id: FeedbackId::new(),
            booking_id: booking.id(),
            listing_id: booking.listing_id(),
            customer_id,
            rating,
            comment,
            created_at: now,
        })
    }
}

/// All feedback for a listing with its aggregate rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSummary {
    /// Mean rating, `None` when nothing has been rated.
    pub average_rating: Option<f64>,
    /// Number of entries.
    pub count: usize,
    /// Entries, newest first.
    pub entries: Vec<Feedback>,
}

impl FeedbackSummary {
    /// Aggregates `entries`.
    #[must_use]
    pub fn from_entries(mut entries: Vec<Feedback>) -> Self {
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let count = entries.len();
        let average_rating = (count > 0).then(|| {
            let total: u32 = entries.iter().map(|f| u32::from(f.rating)).sum();
            f64::from(total) / count as f64
        });
        Self {
            average_rating,
            count,
            entries,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::listing::tests::sample_listing;

    fn completed_booking() -> Booking {
        let listing = sample_listing(UserId::new());
        let start = Utc::now() - Duration::hours(3);
        let Ok(mut b) = Booking::confirmed(&listing, UserId::new(), start, None, start) else {
            panic!("booking should be created");
        };
        let Ok(()) = b.complete(Utc::now()) else {
            panic!("booking should complete");
        };
        b
    }

    #[test]
    fn customer_rates_completed_booking() {
        let b = completed_booking();
        let Ok(f) = Feedback::leave(&b, b.customer_id(), 5, Some(" lovely ".into()), Utc::now())
        else {
            panic!("feedback should be accepted");
        };
        assert_eq!(f.booking_id, b.id());
        assert_eq!(f.comment.as_deref(), Some("lovely"));
    }

    #[test]
    fn other_customer_forbidden() {
        let b = completed_booking();
        let result = Feedback::leave(&b, UserId::new(), 4, None, Utc::now());
        assert!(matches!(result, Err(MarketError::Forbidden(_))));
    }

    #[test]
    fn confirmed_booking_cannot_be_rated() {
        let listing = sample_listing(UserId::new());
        let Ok(b) = Booking::confirmed(&listing, UserId::new(), Utc::now(), None, Utc::now()) else {
            panic!("booking should be created");
        };
        let result = Feedback::leave(&b, b.customer_id(), 4, None, Utc::now());
        assert!(matches!(result, Err(MarketError::Conflict(_))));
    }

    #[test]
    fn rating_and_comment_bounds() {
        let b = completed_booking();
        let long = "y".repeat(MAX_COMMENT_LEN + 1);
        let Err(MarketError::Validation(errors)) =
            Feedback::leave(&b, b.customer_id(), 0, Some(long), Utc::now())
        else {
            panic!("expected validation error");
        };
        assert!(errors.has_field("rating"));
        assert!(errors.has_field("comment"));
        assert!(Feedback::leave(&b, b.customer_id(), 6, None, Utc::now()).is_err());
    }

    #[test]
    fn summary_averages_ratings() {
        let b = completed_booking();
        let entries: Vec<Feedback> = [5_u8, 4, 3]
            .into_iter()
            .filter_map(|r| Feedback::leave(&b, b.customer_id(), r, None, Utc::now()).ok())
            .collect();
        let summary = FeedbackSummary::from_entries(entries);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, Some(4.0));
        assert_eq!(FeedbackSummary::from_entries(Vec::new()).average_rating, None);
    }
}
