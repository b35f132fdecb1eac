//! Booking service: availability, appointments and feedback.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;

use crate::auth::{Caller, Capability, Role, authorize};
use crate::domain::availability::available_slots;
use crate::domain::{
    Booking, BookingId, EventBus, Feedback, FeedbackSummary, Listing, ListingEvent, ListingId,
    TimeSlot, WorkingHours,
};
use crate::error::MarketError;
use crate::persistence::Collection;

/// Orchestration layer for appointments on bookable listings.
///
/// Slot checks and booking inserts for one listing run inside that
/// listing's critical section, so two customers can never both get the
/// same slot.
#[derive(Debug)]
pub struct BookingService {
    listings: Arc<Collection<Listing>>,
    bookings: Arc<Collection<Booking>>,
    feedback: Arc<Collection<Feedback>>,
    hours: WorkingHours,
    listing_locks: Mutex<HashMap<ListingId, Arc<Mutex<()>>>>,
    feedback_lock: Mutex<()>,
    event_bus: EventBus,
}

impl BookingService {
    /// Creates a new `BookingService`.
    #[must_use]
    pub fn new(
        listings: Arc<Collection<Listing>>,
        bookings: Arc<Collection<Booking>>,
        feedback: Arc<Collection<Feedback>>,
        hours: WorkingHours,
        event_bus: EventBus,
    ) -> Self {
        Self {
            listings,
            bookings,
            feedback,
            hours,
            listing_locks: Mutex::new(HashMap::new()),
            feedback_lock: Mutex::new(()),
            event_bus,
        }
    }

    /// Loads stored bookings and feedback. Listings are loaded by the
    /// listing service, which shares the collection.
    ///
    /// # Errors
    ///
    /// Returns a store error if either collection fails to load.
    pub async fn hydrate(&self) -> Result<(usize, usize), MarketError> {
        let bookings = self.bookings.hydrate().await?;
        let feedback = self.feedback.hydrate().await?;
        Ok((bookings, feedback))
    }

    /// Working schedule used for slot generation.
    #[must_use]
    pub const fn working_hours(&self) -> &WorkingHours {
        &self.hours
    }

    /// Free slots of a bookable listing on `date`, in ascending order.
    /// Slots that have already started are left out.
    ///
    /// # Errors
    ///
    /// [`MarketError::ListingNotFound`] if the listing does not exist, is
    /// not bookable, or has no duration.
    pub async fn available_slots(
        &self,
        listing_id: ListingId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, MarketError> {
        let listing = self.bookable(listing_id).await?;
        Ok(self.free_slots(&listing, date).await)
    }

    /// Books the slot starting at `time` (business-local) on `date`.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] unless the caller is a customer.
    /// - [`MarketError::ListingNotFound`] if the listing is not bookable.
    /// - [`MarketError::SlotUnavailable`] if the start is not a free slot.
    /// - [`MarketError::Validation`] for overlong notes, or a store error.
    pub async fn book(
        &self,
        caller: &Caller,
        listing_id: ListingId,
        date: NaiveDate,
        time: NaiveTime,
        notes: Option<String>,
    ) -> Result<Booking, MarketError> {
        authorize(caller, Capability::BookAppointment)?;
        let lock = self.listing_lock(listing_id).await;
        let _guard = lock.lock().await;

        let listing = self.bookable(listing_id).await?;
        let start = self
            .hours
            .local_to_utc(date, time)
            .ok_or_else(|| MarketError::SlotUnavailable(format!("{date} {time} does not exist")))?;
        let free = self.free_slots(&listing, date).await;
        if !free.iter().any(|slot| slot.start == start) {
            return Err(MarketError::SlotUnavailable(format!(
                "{date} {} is not available for listing {listing_id}",
                time.format("%H:%M")
            )));
        }

        let now = Utc::now();
        let booking = Booking::confirmed(&listing, caller.user_id, start, notes, now)?;
        let booking = self.bookings.insert(booking).await?;

        let slot = booking.slot();
        let _ = self.event_bus.publish(ListingEvent::BookingConfirmed {
            listing_id,
            booking_id: booking.id(),
            customer_id: caller.user_id,
            start: slot.start,
            end: slot.end,
            timestamp: now,
        });
        tracing::info!(booking_id = %booking.id(), %listing_id, start = %slot.start, "booking confirmed");
        Ok(booking)
    }

    /// Cancels a booking. Allowed for its customer, the listing's provider
    /// and admins.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`], [`MarketError::Forbidden`] for anyone
    /// else, [`MarketError::Conflict`] if it is no longer active, or a
    /// store error.
    pub async fn cancel(
        &self,
        caller: &Caller,
        booking_id: BookingId,
        reason: Option<String>,
    ) -> Result<Booking, MarketError> {
        authorize(caller, Capability::CancelAppointment)?;
        let current = self.booking(booking_id).await?;
        let involved = caller.is_admin()
            || caller.user_id == current.customer_id()
            || caller.user_id == current.provider_id();
        if !involved {
            return Err(MarketError::Forbidden(format!(
                "booking {booking_id} is not yours to cancel"
            )));
        }

        let now = Utc::now();
        let (booking, ()) = self
            .bookings
            .update(*booking_id.as_uuid(), |b| b.cancel(caller.user_id, reason, now))
            .await?;

        let _ = self.event_bus.publish(ListingEvent::BookingCancelled {
            listing_id: booking.listing_id(),
            booking_id,
            cancelled_by: caller.user_id,
            reason: booking.cancellation_reason().map(str::to_string),
            timestamp: now,
        });
        tracing::info!(%booking_id, cancelled_by = %caller.user_id, "booking cancelled");
        Ok(booking)
    }

    /// Marks a booking completed. Allowed for the listing's provider and
    /// admins once the appointment has started.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`], [`MarketError::NotFound`],
    /// [`MarketError::Conflict`] from the booking state, or a store error.
    pub async fn complete(
        &self,
        caller: &Caller,
        booking_id: BookingId,
    ) -> Result<Booking, MarketError> {
        authorize(caller, Capability::ManageAppointment)?;
        let current = self.booking(booking_id).await?;
        if !caller.is_admin() && caller.user_id != current.provider_id() {
            return Err(MarketError::Forbidden(format!(
                "booking {booking_id} is for another provider"
            )));
        }
        let (booking, ()) = self
            .bookings
            .update(*booking_id.as_uuid(), |b| b.complete(Utc::now()))
            .await?;
        tracing::info!(%booking_id, "booking completed");
        Ok(booking)
    }

    /// Bookings visible to the caller, soonest first: customers see their
    /// own, providers those of their listings, admins all.
    pub async fn list_for(&self, caller: &Caller) -> Vec<Booking> {
        let user = caller.user_id;
        let mut bookings = match caller.role {
            Role::Admin => self.bookings.find(|_| true).await,
            Role::Customer => self.bookings.find(|b| b.customer_id() == user).await,
            Role::ServiceProvider => self.bookings.find(|b| b.provider_id() == user).await,
        };
        bookings.sort_by_key(|b| b.slot().start);
        bookings
    }

    /// Rates a completed booking. One feedback per booking.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless the caller is the booking's
    /// customer, [`MarketError::NotFound`], [`MarketError::Conflict`] if
    /// the booking is not completed or already rated,
    /// [`MarketError::Validation`] for bad input, or a store error.
    pub async fn leave_feedback(
        &self,
        caller: &Caller,
        booking_id: BookingId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Feedback, MarketError> {
        authorize(caller, Capability::LeaveFeedback)?;
        let _guard = self.feedback_lock.lock().await;

        let booking = self.booking(booking_id).await?;
        let entry = Feedback::leave(&booking, caller.user_id, rating, comment, Utc::now())?;
        let existing = self.feedback.find(|f| f.booking_id == booking_id).await;
        if !existing.is_empty() {
            return Err(MarketError::Conflict(format!(
                "booking {booking_id} already has feedback"
            )));
        }
        let entry = self.feedback.insert(entry).await?;
        tracing::info!(%booking_id, rating, "feedback recorded");
        Ok(entry)
    }

    /// Feedback on a listing with its average rating.
    ///
    /// # Errors
    ///
    /// [`MarketError::ListingNotFound`] if the listing does not exist.
    pub async fn listing_feedback(
        &self,
        listing_id: ListingId,
    ) -> Result<FeedbackSummary, MarketError> {
        if self.listings.get(*listing_id.as_uuid()).await.is_none() {
            return Err(MarketError::ListingNotFound(listing_id));
        }
        let entries = self.feedback.find(|f| f.listing_id == listing_id).await;
        Ok(FeedbackSummary::from_entries(entries))
    }

    async fn bookable(&self, listing_id: ListingId) -> Result<Listing, MarketError> {
        self.listings
            .get(*listing_id.as_uuid())
            .await
            .filter(|l| l.is_bookable() && l.content().duration_minutes > 0)
            .ok_or(MarketError::ListingNotFound(listing_id))
    }

    async fn booking(&self, booking_id: BookingId) -> Result<Booking, MarketError> {
        self.bookings
            .get(*booking_id.as_uuid())
            .await
            .ok_or_else(|| MarketError::NotFound(format!("booking {booking_id}")))
    }

    async fn free_slots(&self, listing: &Listing, date: NaiveDate) -> Vec<TimeSlot> {
        let listing_id = listing.id();
        let day = self.hours.day_bounds(date);
        let booked: Vec<TimeSlot> = self
            .bookings
            .find(|b| {
                b.listing_id() == listing_id
                    && b.status().holds_slot()
                    && day.is_none_or(|d| b.slot().overlaps(&d))
            })
            .await
            .iter()
            .map(Booking::slot)
            .collect();

        let now = Utc::now();
        let content = listing.content();
        available_slots(
            &self.hours,
            date,
            &content.available_days,
            content.duration_minutes,
            &booked,
        )
        .into_iter()
        .filter(|slot| slot.start > now)
        .collect()
    }

    /// Critical section of one listing. Entries nobody else holds are
    /// dropped on the way.
    async fn listing_lock(&self, listing_id: ListingId) -> Arc<Mutex<()>> {
        let mut locks = self.listing_locks.lock().await;
        locks.retain(|id, lock| *id == listing_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(listing_id).or_default())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::{Datelike, Days};

    use super::*;
    use crate::domain::{BookingStatus, ListingKind, UserId};
    use crate::service::listing_service::tests::{admin, approved_listing, provider};
    use crate::service::{IdempotencyCache, ListingService};

    struct Fixture {
        listings: ListingService,
        bookings: BookingService,
    }

    fn fixture() -> Fixture {
        let listings = Arc::new(Collection::in_memory());
        let bus = EventBus::new(64);
        Fixture {
            listings: ListingService::new(
                Arc::clone(&listings),
                Arc::new(IdempotencyCache::new(Duration::from_secs(60))),
                bus.clone(),
            ),
            bookings: BookingService::new(
                listings,
                Arc::new(Collection::in_memory()),
                Arc::new(Collection::in_memory()),
                WorkingHours::default(),
                bus,
            ),
        }
    }

    fn tomorrow() -> NaiveDate {
        let Some(d) = Utc::now().date_naive().checked_add_days(Days::new(1)) else {
            panic!("valid date");
        };
        d
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        let Some(t) = NaiveTime::from_hms_opt(h, m, 0) else {
            panic!("valid time");
        };
        t
    }

    fn customer() -> Caller {
        Caller::new(UserId::new(), Role::Customer)
    }

    #[tokio::test]
    async fn booking_removes_its_slot() {
        let fx = fixture();
        let listing = approved_listing(&fx.listings, &provider()).await;
        let Ok(before) = fx.bookings.available_slots(listing.id(), tomorrow()).await else {
            panic!("slots should be listed");
        };
        assert_eq!(before.len(), 6);

        let Ok(booking) = fx
            .bookings
            .book(&customer(), listing.id(), tomorrow(), at(10, 0), None)
            .await
        else {
            panic!("booking should succeed");
        };
        assert_eq!(booking.status(), BookingStatus::Confirmed);

        let Ok(after) = fx.bookings.available_slots(listing.id(), tomorrow()).await else {
            panic!("slots should be listed");
        };
        assert_eq!(after.len(), 5);
        assert!(!after.contains(&booking.slot()));
    }

    #[tokio::test]
    async fn idle_listing_locks_are_pruned() {
        let fx = fixture();
        let owner = provider();
        for hour in [9, 10] {
            let listing = approved_listing(&fx.listings, &owner).await;
            let Ok(_) = fx
                .bookings
                .book(&customer(), listing.id(), tomorrow(), at(hour, 0), None)
                .await
            else {
                panic!("booking should succeed");
            };
        }
        assert_eq!(fx.bookings.listing_locks.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn taken_or_misaligned_slot_is_unavailable() {
        let fx = fixture();
        let listing = approved_listing(&fx.listings, &provider()).await;
        let Ok(_) = fx
            .bookings
            .book(&customer(), listing.id(), tomorrow(), at(9, 0), None)
            .await
        else {
            panic!("booking should succeed");
        };
        for time in [at(9, 0), at(9, 30), at(13, 0)] {
            let result = fx
                .bookings
                .book(&customer(), listing.id(), tomorrow(), time, None)
                .await;
            assert!(matches!(result, Err(MarketError::SlotUnavailable(_))), "{time}");
        }
    }

    #[tokio::test]
    async fn concurrent_bookings_of_one_slot_admit_one() {
        let fx = Arc::new(fixture());
        let listing = approved_listing(&fx.listings, &provider()).await;
        let mut handles = Vec::new();
        for _ in 0..10 {
            let fx = Arc::clone(&fx);
            let id = listing.id();
            handles.push(tokio::spawn(async move {
                fx.bookings.book(&customer(), id, tomorrow(), at(11, 0), None).await
            }));
        }
        let mut confirmed = 0;
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            if result.is_ok() {
                confirmed += 1;
            }
        }
        assert_eq!(confirmed, 1);
    }

    #[tokio::test]
    async fn unbookable_listing_is_not_found() {
        let fx = fixture();
        let owner = provider();
        let Ok(pending) = fx
            .listings
            .submit(&owner, ListingKind::Service, &crate::domain::listing::tests::sample_draft(), None)
            .await
        else {
            panic!("submit should succeed");
        };
        assert!(matches!(
            fx.bookings.available_slots(pending.id(), tomorrow()).await,
            Err(MarketError::ListingNotFound(_))
        ));
        assert!(matches!(
            fx.bookings.available_slots(ListingId::new(), tomorrow()).await,
            Err(MarketError::ListingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_days_restrict_availability() {
        let fx = fixture();
        let owner = provider();
        let listing = approved_listing(&fx.listings, &owner).await;
        let date = tomorrow();
        let other_day = date.weekday().succ().to_string().to_lowercase();
        let draft = crate::domain::ListingDraft {
            available_days: Some(vec![other_day]),
            ..crate::domain::ListingDraft::default()
        };
        let Ok(_) = fx.listings.submit_update(&owner, listing.id(), &draft, None).await else {
            panic!("update should stage");
        };
        let Ok(_) = fx.listings.approve(&admin(), listing.id(), None, None).await else {
            panic!("approve should succeed");
        };
        let Ok(slots) = fx.bookings.available_slots(listing.id(), date).await else {
            panic!("slots should be listed");
        };
        assert!(slots.is_empty());
        assert!(matches!(
            fx.bookings.book(&customer(), listing.id(), date, at(9, 0), None).await,
            Err(MarketError::SlotUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn cancel_frees_slot_and_checks_parties() {
        let fx = fixture();
        let owner = provider();
        let listing = approved_listing(&fx.listings, &owner).await;
        let buyer = customer();
        let Ok(booking) = fx
            .bookings
            .book(&buyer, listing.id(), tomorrow(), at(14, 30), None)
            .await
        else {
            panic!("booking should succeed");
        };

        assert!(matches!(
            fx.bookings.cancel(&customer(), booking.id(), None).await,
            Err(MarketError::Forbidden(_))
        ));
        let Ok(cancelled) = fx.bookings.cancel(&owner, booking.id(), Some("ill".into())).await
        else {
            panic!("provider may cancel");
        };
        assert_eq!(cancelled.status(), BookingStatus::Cancelled);

        let Ok(slots) = fx.bookings.available_slots(listing.id(), tomorrow()).await else {
            panic!("slots should be listed");
        };
        assert_eq!(slots.len(), 6);
    }

    #[tokio::test]
    async fn future_booking_cannot_complete_or_be_rated() {
        let fx = fixture();
        let owner = provider();
        let listing = approved_listing(&fx.listings, &owner).await;
        let buyer = customer();
        let Ok(booking) = fx
            .bookings
            .book(&buyer, listing.id(), tomorrow(), at(15, 30), None)
            .await
        else {
            panic!("booking should succeed");
        };
        assert!(matches!(
            fx.bookings.complete(&owner, booking.id()).await,
            Err(MarketError::Conflict(_))
        ));
        assert!(matches!(
            fx.bookings.complete(&provider(), booking.id()).await,
            Err(MarketError::Forbidden(_))
        ));
        assert!(matches!(
            fx.bookings.leave_feedback(&buyer, booking.id(), 5, None).await,
            Err(MarketError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn bookings_listed_per_role() {
        let fx = fixture();
        let owner = provider();
        let listing = approved_listing(&fx.listings, &owner).await;
        let (alice, bob) = (customer(), customer());
        for (who, time) in [(&alice, at(9, 0)), (&bob, at(10, 0))] {
            let Ok(_) = fx.bookings.book(who, listing.id(), tomorrow(), time, None).await else {
                panic!("booking should succeed");
            };
        }
        assert_eq!(fx.bookings.list_for(&alice).await.len(), 1);
        assert_eq!(fx.bookings.list_for(&owner).await.len(), 2);
        assert_eq!(fx.bookings.list_for(&admin()).await.len(), 2);
        assert!(fx.bookings.list_for(&provider()).await.is_empty());
    }

    #[tokio::test]
    async fn feedback_summary_for_unknown_listing() {
        let fx = fixture();
        assert!(matches!(
            fx.bookings.listing_feedback(ListingId::new()).await,
            Err(MarketError::ListingNotFound(_))
        ));
        let listing = approved_listing(&fx.listings, &provider()).await;
        let Ok(summary) = fx.bookings.listing_feedback(listing.id()).await else {
            panic!("summary should load");
        };
        assert_eq!(summary.count, 0);
        assert!(summary.average_rating.is_none());
    }
}
