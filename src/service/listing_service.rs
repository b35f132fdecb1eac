//! Listing service: submission, review and visibility of listings.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::id_allocator::IdAllocator;
use super::idempotency::{Claim, IdempotencyCache};
use crate::auth::{Caller, Capability, authorize};
use crate::domain::{
    AdminAction, AuditTrail, DecisionOutcome, EventBus, Listing, ListingDraft, ListingEvent,
    ListingId, ListingKind, RequestType, StatusDisplay,
};
use crate::error::MarketError;
use crate::persistence::Collection;

/// Orchestration layer for the listing workflow.
///
/// Every mutation follows the same pattern: check the capability, run the
/// domain transition under the listing's document lock, write it through,
/// emit an event, return the updated listing.
#[derive(Debug)]
pub struct ListingService {
    listings: Arc<Collection<Listing>>,
    allocator: IdAllocator,
    idempotency: Arc<IdempotencyCache<ListingId>>,
    event_bus: EventBus,
}

impl ListingService {
    /// Creates a new `ListingService`.
    #[must_use]
    pub fn new(
        listings: Arc<Collection<Listing>>,
        idempotency: Arc<IdempotencyCache<ListingId>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            listings,
            allocator: IdAllocator::new(),
            idempotency,
            event_bus,
        }
    }

    /// Returns the underlying listing collection.
    #[must_use]
    pub fn listings(&self) -> &Arc<Collection<Listing>> {
        &self.listings
    }

    /// Submits a new service or package for review.
    ///
    /// With an idempotency key, a repeat within the TTL returns the listing
    /// created by the first call.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless the caller is a provider,
    /// [`MarketError::Validation`] for a bad draft,
    /// [`MarketError::DuplicateRequest`] while the same key is in flight,
    /// or a store error.
    pub async fn submit(
        &self,
        caller: &Caller,
        kind: ListingKind,
        draft: &ListingDraft,
        idempotency_key: Option<&str>,
    ) -> Result<Listing, MarketError> {
        authorize(caller, Capability::SubmitListing)?;

        let Some(key) = idempotency_key else {
            return self.create(caller, kind, draft).await;
        };
        let scoped = format!("{}:{kind}:{key}", caller.user_id);
        match self.idempotency.claim(&scoped).await? {
            Claim::Replay(id) => {
                tracing::info!(listing_id = %id, key, "idempotent submission replayed");
                self.listings
                    .get(*id.as_uuid())
                    .await
                    .ok_or(MarketError::ListingNotFound(id))
            }
            Claim::Fresh(guard) => {
                // Dropping the guard on error or cancellation frees the key.
                let listing = self.create(caller, kind, draft).await?;
                guard.complete(listing.id()).await;
                Ok(listing)
            }
        }
    }

    async fn create(
        &self,
        caller: &Caller,
        kind: ListingKind,
        draft: &ListingDraft,
    ) -> Result<Listing, MarketError> {
        let now = Utc::now();
        let listing = Listing::submit_create(kind, caller.user_id, draft, now)?;
        let listing = self.listings.insert(listing).await?;

        let _ = self.event_bus.publish(ListingEvent::ListingSubmitted {
            listing_id: listing.id(),
            kind,
            owner_id: caller.user_id,
            timestamp: now,
        });
        tracing::info!(listing_id = %listing.id(), %kind, owner_id = %caller.user_id, "listing submitted");
        Ok(listing)
    }

    /// Approved and active listings, optionally of one kind, in public id
    /// order.
    pub async fn list_public(&self, kind: Option<ListingKind>) -> Vec<Listing> {
        let mut listings = self
            .listings
            .find(|l| l.is_bookable() && kind.is_none_or(|k| l.kind() == k))
            .await;
        listings.sort_by_key(Listing::public_id);
        listings
    }

    /// The caller's own listings that are still shown to them, newest
    /// first.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless the caller is a provider.
    pub async fn list_mine(&self, caller: &Caller) -> Result<Vec<Listing>, MarketError> {
        authorize(caller, Capability::SubmitListing)?;
        let owner = caller.user_id;
        let mut listings = self
            .listings
            .find(|l| l.owner_id() == owner && l.is_visible_to_provider())
            .await;
        listings.sort_by(|a, b| b.first_submitted_at().cmp(&a.first_submitted_at()));
        Ok(listings)
    }

    /// Fetches a listing as seen by `caller`.
    ///
    /// Anonymous callers and customers see bookable listings, owners see
    /// their own while visible to them, admins see everything.
    ///
    /// # Errors
    ///
    /// [`MarketError::ListingNotFound`] if the listing does not exist or is
    /// hidden from the caller.
    pub async fn get(&self, caller: Option<&Caller>, id: ListingId) -> Result<Listing, MarketError> {
        let listing = self
            .listings
            .get(*id.as_uuid())
            .await
            .ok_or(MarketError::ListingNotFound(id))?;
        let visible = listing.is_bookable()
            || caller.is_some_and(|c| {
                c.is_admin() || (c.user_id == listing.owner_id() && listing.is_visible_to_provider())
            });
        if visible {
            Ok(listing)
        } else {
            Err(MarketError::ListingNotFound(id))
        }
    }

    /// Display status of a listing visible to `caller`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn status(
        &self,
        caller: Option<&Caller>,
        id: ListingId,
    ) -> Result<(Listing, StatusDisplay), MarketError> {
        let listing = self.get(caller, id).await?;
        let display = listing.display_status();
        Ok((listing, display))
    }

    /// Stages a content update.
    ///
    /// # Errors
    ///
    /// Capability, ownership, state and validation errors from the
    /// workflow, or a store error.
    pub async fn submit_update(
        &self,
        caller: &Caller,
        id: ListingId,
        draft: &ListingDraft,
        reason: Option<String>,
    ) -> Result<Listing, MarketError> {
        authorize(caller, Capability::SubmitListing)?;
        let now = Utc::now();
        let (listing, request_id) = self
            .listings
            .update(*id.as_uuid(), |l| l.submit_update(caller.user_id, draft, reason, now))
            .await?;
        self.change_requested(&listing, request_id, RequestType::Update);
        Ok(listing)
    }

    /// Stages a soft deletion.
    ///
    /// # Errors
    ///
    /// Capability, ownership and state errors from the workflow, or a store
    /// error.
    pub async fn submit_delete(
        &self,
        caller: &Caller,
        id: ListingId,
        reason: Option<String>,
    ) -> Result<Listing, MarketError> {
        authorize(caller, Capability::SubmitListing)?;
        let now = Utc::now();
        let (listing, request_id) = self
            .listings
            .update(*id.as_uuid(), |l| l.submit_delete(caller.user_id, reason, now))
            .await?;
        self.change_requested(&listing, request_id, RequestType::Delete);
        Ok(listing)
    }

    /// Stages a reactivation.
    ///
    /// # Errors
    ///
    /// Capability, ownership and state errors from the workflow, or a store
    /// error.
    pub async fn submit_reactivate(
        &self,
        caller: &Caller,
        id: ListingId,
        reason: Option<String>,
    ) -> Result<Listing, MarketError> {
        authorize(caller, Capability::SubmitListing)?;
        let now = Utc::now();
        let (listing, request_id) = self
            .listings
            .update(*id.as_uuid(), |l| l.submit_reactivate(caller.user_id, reason, now))
            .await?;
        self.change_requested(&listing, request_id, RequestType::Reactivate);
        Ok(listing)
    }

    /// Resubmits a rejected listing, optionally with corrected fields.
    ///
    /// # Errors
    ///
    /// Capability, ownership, state and validation errors from the
    /// workflow, or a store error.
    pub async fn resubmit(
        &self,
        caller: &Caller,
        id: ListingId,
        draft: &ListingDraft,
        reason: Option<String>,
    ) -> Result<Listing, MarketError> {
        authorize(caller, Capability::SubmitListing)?;
        let now = Utc::now();
        let (listing, _) = self
            .listings
            .update(*id.as_uuid(), |l| {
                l.resubmit(caller.user_id, draft, reason.clone(), now)
            })
            .await?;

        let _ = self.event_bus.publish(ListingEvent::ListingSubmitted {
            listing_id: listing.id(),
            kind: listing.kind(),
            owner_id: caller.user_id,
            timestamp: now,
        });
        self.status_changed(&listing, caller, reason);
        tracing::info!(listing_id = %listing.id(), "listing resubmitted");
        Ok(listing)
    }

    /// Listings awaiting admin review, oldest request first.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless the caller is an admin.
    pub async fn pending(&self, caller: &Caller) -> Result<Vec<Listing>, MarketError> {
        authorize(caller, Capability::ViewListingHistory)?;
        let mut listings = self.listings.find(Listing::needs_admin_action).await;
        listings.sort_by_key(|l| {
            l.pending_changes()
                .map_or(l.first_submitted_at(), |p| p.requested_at)
        });
        Ok(listings)
    }

    /// Approves whatever awaits review on a listing.
    ///
    /// A first approval allocates the next public id of the listing's kind.
    /// The id is committed only if the approval is written and assigned
    /// it; otherwise it is offered again to the next approval.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Forbidden`] unless the caller is an admin.
    /// - [`MarketError::ListingNotFound`] / [`MarketError::NoPendingAction`].
    /// - [`MarketError::Allocation`] if existing ids cannot be read; the
    ///   listing is left untouched.
    /// - A store error from the write; the listing is left untouched.
    pub async fn approve(
        &self,
        caller: &Caller,
        id: ListingId,
        request_id: Option<Uuid>,
        reason: Option<String>,
    ) -> Result<(Listing, DecisionOutcome), MarketError> {
        authorize(caller, Capability::ReviewListing)?;
        let current = self
            .listings
            .get(*id.as_uuid())
            .await
            .ok_or(MarketError::ListingNotFound(id))?;

        // The pending request is re-read under the document lock and may
        // have changed since `current`, so reserve whenever no id is held.
        let reservation = if current.public_id().is_none() {
            Some(self.allocator.reserve(current.kind(), &self.listings).await?)
        } else {
            None
        };
        let candidate = reservation.as_ref().map(super::id_allocator::Reservation::id);

        let action = AdminAction {
            admin_id: caller.user_id,
            reason: reason.clone(),
            request_id,
        };
        let now = Utc::now();
        let (listing, outcome) = self
            .listings
            .update(*id.as_uuid(), |l| l.approve(&action, candidate, now))
            .await?;

        if let Some(reservation) = reservation
            && outcome.assigned_public_id.is_some()
        {
            reservation.commit();
        }

        if outcome.replayed {
            tracing::info!(listing_id = %id, "approval replayed");
        } else {
            self.status_changed(&listing, caller, reason);
            tracing::info!(
                listing_id = %id,
                public_id = ?listing.public_id(),
                request_type = ?outcome.request_type,
                "listing approved"
            );
        }
        Ok((listing, outcome))
    }

    /// Rejects whatever awaits review on a listing.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless the caller is an admin,
    /// [`MarketError::Validation`] for a missing reason,
    /// [`MarketError::ListingNotFound`] / [`MarketError::NoPendingAction`],
    /// or a store error.
    pub async fn reject(
        &self,
        caller: &Caller,
        id: ListingId,
        request_id: Option<Uuid>,
        reason: Option<String>,
    ) -> Result<(Listing, DecisionOutcome), MarketError> {
        authorize(caller, Capability::ReviewListing)?;
        let action = AdminAction {
            admin_id: caller.user_id,
            reason: reason.clone(),
            request_id,
        };
        let now = Utc::now();
        let (listing, outcome) = self
            .listings
            .update(*id.as_uuid(), |l| l.reject(&action, now))
            .await?;

        if outcome.replayed {
            tracing::info!(listing_id = %id, "rejection replayed");
        } else {
            self.status_changed(&listing, caller, reason);
            tracing::info!(listing_id = %id, request_type = ?outcome.request_type, "listing rejected");
        }
        Ok((listing, outcome))
    }

    /// Suspends an approved listing.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless the caller is an admin, state
    /// errors from the workflow, or a store error.
    pub async fn deactivate(
        &self,
        caller: &Caller,
        id: ListingId,
        reason: Option<String>,
    ) -> Result<Listing, MarketError> {
        authorize(caller, Capability::ReviewListing)?;
        let now = Utc::now();
        let (listing, ()) = self
            .listings
            .update(*id.as_uuid(), |l| l.deactivate(caller.user_id, reason.clone(), now))
            .await?;
        self.status_changed(&listing, caller, reason);
        tracing::info!(listing_id = %id, "listing deactivated");
        Ok(listing)
    }

    /// Full audit trail of a listing.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless the caller is an admin, or
    /// [`MarketError::ListingNotFound`].
    pub async fn history(
        &self,
        caller: &Caller,
        id: ListingId,
    ) -> Result<(Listing, AuditTrail), MarketError> {
        authorize(caller, Capability::ViewListingHistory)?;
        let listing = self
            .listings
            .get(*id.as_uuid())
            .await
            .ok_or(MarketError::ListingNotFound(id))?;
        let trail = listing.audit_trail().clone();
        Ok((listing, trail))
    }

    fn change_requested(&self, listing: &Listing, request_id: Uuid, request_type: RequestType) {
        let _ = self.event_bus.publish(ListingEvent::ChangeRequested {
            listing_id: listing.id(),
            request_id,
            request_type,
            owner_id: listing.owner_id(),
            timestamp: Utc::now(),
        });
        tracing::info!(listing_id = %listing.id(), %request_id, request_type = request_type.as_str(), "change requested");
    }

    fn status_changed(&self, listing: &Listing, caller: &Caller, reason: Option<String>) {
        let _ = self.event_bus.publish(ListingEvent::StatusChanged {
            listing_id: listing.id(),
            public_id: listing.public_id(),
            new_status: listing.status(),
            actor_id: caller.user_id,
            reason,
            timestamp: Utc::now(),
        });
    }
}
