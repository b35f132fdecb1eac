//! Approval state machine for listings.
//!
//! Providers never change a listing directly. Every create, update,
//! delete, reactivate and resubmit is staged and only takes effect once
//! an admin approves it. Rejecting a staged request leaves the approved
//! content untouched because it was never overwritten.
//!
//! ```text
//!  submit_create ──► pending_approval ──approve──► approved ◄──────────┐
//!                        │     ▲                    │  │  │           │
//!                     reject   └──resubmit──┐       │  │  └─deactivate─► inactive
//!                        ▼                  │       │  │                  │
//!                     rejected ─────────────┘       │  └─ submit_delete ──┤
//!                                                   │       approve       │
//!                                       submit_update       ▼             │
//!                                       (staged)         deleted ◄────────┘
//!                                                           │
//!                                         submit_reactivate + approve ──► approved
//! ```
//!
//! At most one request is staged at a time. Admin decisions are
//! idempotent: repeating the same decision for the same request is a
//! no-op reported as a replay.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit::{AuditAction, AuditEntry, AuditSnapshot};
use super::listing::{Listing, ListingPatch, ListingStatus};
use super::validation::ListingDraft;
use super::{PublicId, UserId};
use crate::error::{FieldError, MarketError, ValidationErrors};

/// How long after a decision an identical decision without a request id
/// is still treated as a duplicate submission.
pub const REPLAY_WINDOW_MINUTES: i64 = 5;

/// Minimum trimmed length of a rejection reason.
pub const MIN_REJECTION_REASON_LEN: usize = 5;

/// Maximum trimmed length of a rejection reason.
pub const MAX_REJECTION_REASON_LEN: usize = 500;

/// Kind of staged provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// (Re)submission of a listing for first approval.
    Create,
    /// Content change.
    Update,
    /// Soft deletion.
    Delete,
    /// Return of an inactive or deleted listing.
    Reactivate,
}

impl RequestType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reactivate => "reactivate",
        }
    }
}

/// A staged request awaiting admin review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Identifier admins quote when deciding.
    pub request_id: Uuid,
    /// What is being asked for.
    pub request_type: RequestType,
    /// Proposed content, for create and update requests.
    pub proposed: Option<ListingPatch>,
    /// When it was staged.
    pub requested_at: DateTime<Utc>,
    /// Provider's explanation.
    pub reason: Option<String>,
    /// Listing status when the request was staged.
    pub prior_status: ListingStatus,
}

/// Admin verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Request accepted.
    Approved,
    /// Request refused.
    Rejected,
}

/// Record of the most recent admin decision, used to detect replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDecision {
    /// Request the decision applied to. `None` for an initial submission.
    pub request_id: Option<Uuid>,
    /// Type of the decided request. `None` for an initial submission.
    pub request_type: Option<RequestType>,
    /// Verdict.
    pub decision: Decision,
    /// Deciding admin.
    pub admin_id: UserId,
    /// When it was decided.
    pub decided_at: DateTime<Utc>,
}

/// Parameters of an admin approve / reject call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAction {
    /// Acting admin.
    pub admin_id: UserId,
    /// Reason recorded in the audit trail (required for rejections).
    pub reason: Option<String>,
    /// Request being decided, when the caller knows it.
    pub request_id: Option<Uuid>,
}

/// Result of an admin decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    /// `true` when the call repeated an already recorded decision and
    /// nothing changed.
    pub replayed: bool,
    /// Type of the decided request (`None` for an initial submission).
    pub request_type: Option<RequestType>,
    /// Public id allocated by this call, if any.
    pub assigned_public_id: Option<PublicId>,
    /// Status after the call.
    pub status: ListingStatus,
}

/// What an admin decision applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Initial,
    Staged(RequestType),
}

impl Listing {
    /// Returns `true` when approving the current request would need a
    /// freshly allocated public id.
    #[must_use]
    pub fn approval_needs_public_id(&self) -> bool {
        self.public_id.is_none()
            && matches!(
                self.target(),
                Some(Target::Initial | Target::Staged(RequestType::Create))
            )
    }

    /// Stages a content update.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotOwner`], [`MarketError::PendingChangesExist`],
    /// [`MarketError::InvalidTransition`] unless approved, or
    /// [`MarketError::Validation`] for a bad or empty draft.
    pub fn submit_update(
        &mut self,
        owner_id: UserId,
        draft: &ListingDraft,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, MarketError> {
        self.ensure_can_stage(owner_id, &[ListingStatus::Approved], "update")?;
        let patch = draft.to_patch(self.kind)?;
        if patch.is_empty() {
            return Err(MarketError::Validation(ValidationErrors(vec![
                FieldError::new("body", "at least one field must be provided"),
            ])));
        }
        Ok(self.stage(
            owner_id,
            RequestType::Update,
            Some(patch),
            reason,
            AuditAction::UpdateRequested,
            now,
        ))
    }

    /// Stages a soft deletion.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotOwner`], [`MarketError::PendingChangesExist`], or
    /// [`MarketError::InvalidTransition`] unless approved or inactive.
    pub fn submit_delete(
        &mut self,
        owner_id: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, MarketError> {
        self.ensure_can_stage(
            owner_id,
            &[ListingStatus::Approved, ListingStatus::Inactive],
            "delete",
        )?;
        Ok(self.stage(
            owner_id,
            RequestType::Delete,
            None,
            reason,
            AuditAction::DeleteRequested,
            now,
        ))
    }

    /// Stages a reactivation of an inactive or deleted listing.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotOwner`], [`MarketError::PendingChangesExist`], or
    /// [`MarketError::InvalidTransition`] unless inactive or deleted.
    pub fn submit_reactivate(
        &mut self,
        owner_id: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, MarketError> {
        self.ensure_can_stage(
            owner_id,
            &[ListingStatus::Inactive, ListingStatus::Deleted],
            "reactivate",
        )?;
        Ok(self.stage(
            owner_id,
            RequestType::Reactivate,
            None,
            reason,
            AuditAction::ReactivateRequested,
            now,
        ))
    }

    /// Resubmits a rejected listing, optionally with corrected fields.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotOwner`], [`MarketError::PendingChangesExist`],
    /// [`MarketError::InvalidTransition`] unless rejected, or
    /// [`MarketError::Validation`] for bad fields.
    pub fn resubmit(
        &mut self,
        owner_id: UserId,
        draft: &ListingDraft,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, MarketError> {
        self.ensure_can_stage(owner_id, &[ListingStatus::Rejected], "resubmit")?;
        let patch = draft.to_patch(self.kind)?;
        let proposed = (!patch.is_empty()).then_some(patch);
        let request_id = self.stage(
            owner_id,
            RequestType::Create,
            proposed,
            reason,
            AuditAction::Resubmitted,
            now,
        );
        self.status = ListingStatus::PendingApproval;
        Ok(request_id)
    }

    /// Approves whatever awaits review.
    ///
    /// `candidate` is the public id to assign when this is the listing's
    /// first approval; it is ignored if the listing already holds one.
    ///
    /// # Errors
    ///
    /// [`MarketError::NoPendingAction`] when nothing awaits review and the
    /// call is not a replay, or [`MarketError::Internal`] if a first
    /// approval arrives without a candidate id.
    pub fn approve(
        &mut self,
        action: &AdminAction,
        candidate: Option<PublicId>,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, MarketError> {
        if let Some(replay) = self.replay_of(action, Decision::Approved, now)? {
            return Ok(replay);
        }
        let target = self.target().ok_or(MarketError::NoPendingAction(self.id))?;

        let candidate = if self.approval_needs_public_id() {
            let candidate = candidate.ok_or_else(|| {
                MarketError::Internal(format!("first approval of {} without a public id", self.id))
            })?;
            if candidate.kind() != self.kind {
                return Err(MarketError::Internal(format!(
                    "public id {candidate} does not match listing kind {}",
                    self.kind
                )));
            }
            Some(candidate)
        } else {
            None
        };

        let snapshot = self.snapshot();
        let pending = self.pending_changes.take();
        let mut assigned = None;

        match target {
            Target::Initial | Target::Staged(RequestType::Create) => {
                if let Some(patch) = pending.as_ref().and_then(|p| p.proposed.as_ref()) {
                    self.content.apply(patch);
                }
                if let Some(candidate) = candidate {
                    assigned = self.assign_public_id(candidate);
                }
                if self.first_approved_at.is_none() {
                    self.first_approved_at = Some(now);
                }
                self.status = ListingStatus::Approved;
                self.is_active = true;
                self.is_visible_to_provider = true;
            }
            Target::Staged(RequestType::Update) => {
                if let Some(patch) = pending.as_ref().and_then(|p| p.proposed.as_ref()) {
                    self.content.apply(patch);
                }
                self.last_updated_at = Some(now);
                self.status = ListingStatus::Approved;
                self.deleted_at = None;
            }
            Target::Staged(RequestType::Delete) => {
                self.status = ListingStatus::Deleted;
                self.deleted_at = Some(now);
                self.is_active = false;
                self.is_visible_to_provider = false;
            }
            Target::Staged(RequestType::Reactivate) => {
                self.status = ListingStatus::Approved;
                self.is_active = true;
                self.is_visible_to_provider = true;
                self.deleted_at = None;
            }
        }

        Ok(self.record_decision(
            action,
            Decision::Approved,
            target,
            pending.map(|p| p.request_id),
            snapshot,
            assigned,
            now,
        ))
    }

    /// Rejects whatever awaits review.
    ///
    /// # Errors
    ///
    /// [`MarketError::Validation`] when the reason is missing or too short
    /// or long, or [`MarketError::NoPendingAction`] when nothing awaits
    /// review and the call is not a replay.
    pub fn reject(
        &mut self,
        action: &AdminAction,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, MarketError> {
        let reason = action.reason.as_deref().map(str::trim).unwrap_or_default();
        let len = reason.chars().count();
        if !(MIN_REJECTION_REASON_LEN..=MAX_REJECTION_REASON_LEN).contains(&len) {
            return Err(MarketError::Validation(ValidationErrors(vec![
                FieldError::new(
                    "reason",
                    format!(
                        "must be between {MIN_REJECTION_REASON_LEN} and \
                         {MAX_REJECTION_REASON_LEN} characters"
                    ),
                ),
            ])));
        }
        if let Some(replay) = self.replay_of(action, Decision::Rejected, now)? {
            return Ok(replay);
        }
        let target = self.target().ok_or(MarketError::NoPendingAction(self.id))?;

        let snapshot = self.snapshot();
        let pending = self.pending_changes.take();

        match target {
            Target::Initial | Target::Staged(RequestType::Create) => {
                self.status = ListingStatus::Rejected;
                self.is_active = false;
            }
            Target::Staged(RequestType::Update) => {
                self.status = ListingStatus::Approved;
                self.deleted_at = None;
            }
            Target::Staged(RequestType::Delete) => {
                let prior = pending
                    .as_ref()
                    .map_or(ListingStatus::Approved, |p| p.prior_status);
                self.status = prior;
                self.is_active = prior == ListingStatus::Approved;
                self.deleted_at = None;
            }
            Target::Staged(RequestType::Reactivate) => {
                if let Some(p) = pending.as_ref() {
                    self.status = p.prior_status;
                }
            }
        }

        Ok(self.record_decision(
            action,
            Decision::Rejected,
            target,
            pending.map(|p| p.request_id),
            snapshot,
            None,
            now,
        ))
    }

    /// Suspends an approved listing.
    ///
    /// # Errors
    ///
    /// [`MarketError::PendingChangesExist`] while a request is staged, or
    /// [`MarketError::InvalidTransition`] unless approved.
    pub fn deactivate(
        &mut self,
        admin_id: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if self.needs_admin_action() {
            return Err(MarketError::PendingChangesExist(self.id));
        }
        self.ensure_status(&[ListingStatus::Approved], "deactivate")?;
        let snapshot = self.snapshot();
        self.status = ListingStatus::Inactive;
        self.is_active = false;
        self.audit_trail.push(AuditEntry {
            action: AuditAction::Deactivated,
            actor_id: admin_id,
            reason,
            request_type: None,
            timestamp: now,
            snapshot: Some(snapshot),
        });
        Ok(())
    }

    fn target(&self) -> Option<Target> {
        match (&self.pending_changes, self.status) {
            (Some(p), _) => Some(Target::Staged(p.request_type)),
            (None, ListingStatus::PendingApproval) => Some(Target::Initial),
            (None, _) => None,
        }
    }

    fn ensure_status(
        &self,
        allowed: &[ListingStatus],
        action: &'static str,
    ) -> Result<(), MarketError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(MarketError::InvalidTransition {
                listing_id: self.id,
                status: self.status,
                action,
            })
        }
    }

    fn ensure_can_stage(
        &self,
        owner_id: UserId,
        allowed: &[ListingStatus],
        action: &'static str,
    ) -> Result<(), MarketError> {
        if owner_id != self.owner_id {
            return Err(MarketError::NotOwner(self.id));
        }
        if self.needs_admin_action() {
            return Err(MarketError::PendingChangesExist(self.id));
        }
        self.ensure_status(allowed, action)
    }

    fn stage(
        &mut self,
        owner_id: UserId,
        request_type: RequestType,
        proposed: Option<ListingPatch>,
        reason: Option<String>,
        audit_action: AuditAction,
        now: DateTime<Utc>,
    ) -> Uuid {
        let request_id = Uuid::new_v4();
        self.audit_trail.push(AuditEntry {
            action: audit_action,
            actor_id: owner_id,
            reason: reason.clone(),
            request_type: Some(request_type),
            timestamp: now,
            snapshot: Some(self.snapshot()),
        });
        self.pending_changes = Some(PendingChange {
            request_id,
            request_type,
            proposed,
            requested_at: now,
            reason,
            prior_status: self.status,
        });
        request_id
    }

    /// Detects a repeated decision. Returns `Ok(None)` when the call should
    /// be processed normally.
    fn replay_of(
        &self,
        action: &AdminAction,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Option<DecisionOutcome>, MarketError> {
        let current = self.pending_changes.as_ref().map(|p| p.request_id);
        let awaiting = self.needs_admin_action();
        let last = self.last_decision.as_ref();

        let previous = match action.request_id {
            Some(rid) if awaiting && current == Some(rid) => return Ok(None),
            None if awaiting => return Ok(None),
            Some(rid) => last.filter(|d| d.request_id == Some(rid)),
            None => last.filter(|d| now - d.decided_at <= Duration::minutes(REPLAY_WINDOW_MINUTES)),
        }
        .filter(|d| d.decision == decision);

        match previous {
            Some(d) => Ok(Some(DecisionOutcome {
                replayed: true,
                request_type: d.request_type,
                assigned_public_id: None,
                status: self.status,
            })),
            None => Err(MarketError::NoPendingAction(self.id)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_decision(
        &mut self,
        action: &AdminAction,
        decision: Decision,
        target: Target,
        request_id: Option<Uuid>,
        snapshot: AuditSnapshot,
        assigned: Option<PublicId>,
        now: DateTime<Utc>,
    ) -> DecisionOutcome {
        let request_type = match target {
            Target::Initial => None,
            Target::Staged(t) => Some(t),
        };
        self.last_decision = Some(AdminDecision {
            request_id,
            request_type,
            decision,
            admin_id: action.admin_id,
            decided_at: now,
        });
        self.audit_trail.push(AuditEntry {
            action: match decision {
                Decision::Approved => AuditAction::Approved,
                Decision::Rejected => AuditAction::Rejected,
            },
            actor_id: action.admin_id,
            reason: action.reason.clone(),
            request_type,
            timestamp: now,
            snapshot: Some(snapshot),
        });
        DecisionOutcome {
            replayed: false,
            request_type,
            assigned_public_id: assigned,
            status: self.status,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ListingKind;
    use crate::domain::listing::tests::sample_listing;
    use crate::domain::validation::PricingDraft;

    fn srv(n: u32) -> PublicId {
        let Some(id) = PublicId::new(ListingKind::Service, n) else {
            panic!("valid id");
        };
        id
    }

    fn admin(reason: Option<&str>) -> AdminAction {
        AdminAction {
            admin_id: UserId::new(),
            reason: reason.map(ToString::to_string),
            request_id: None,
        }
    }

    fn price_draft(price: f64) -> ListingDraft {
        ListingDraft {
            pricing: Some(PricingDraft {
                base_price: Some(serde_json::json!(price)),
                ..PricingDraft::default()
            }),
            ..ListingDraft::default()
        }
    }

    fn approved_listing(owner: UserId) -> Listing {
        let mut listing = sample_listing(owner);
        let Ok(_) = listing.approve(&admin(None), Some(srv(1)), Utc::now()) else {
            panic!("initial approval");
        };
        listing
    }

    #[test]
    fn first_approval_assigns_public_id_and_timestamps() {
        let mut listing = sample_listing(UserId::new());
        assert!(listing.approval_needs_public_id());
        let Ok(outcome) = listing.approve(&admin(Some("looks good")), Some(srv(1)), Utc::now())
        else {
            panic!("approval failed");
        };
        assert!(!outcome.replayed);
        assert_eq!(outcome.assigned_public_id, Some(srv(1)));
        assert_eq!(listing.public_id().map(|p| p.to_string()).as_deref(), Some("SRV_001"));
        assert_eq!(listing.status(), ListingStatus::Approved);
        assert!(listing.first_approved_at().is_some());
        assert!(listing.is_bookable());
        assert!(!listing.needs_admin_action());
    }

    #[test]
    fn first_approval_without_candidate_aborts_untouched() {
        let mut listing = sample_listing(UserId::new());
        let before = listing.clone();
        assert!(listing.approve(&admin(None), None, Utc::now()).is_err());
        assert_eq!(listing, before);
    }

    #[test]
    fn repeated_approve_is_a_replay_and_keeps_public_id() {
        let mut listing = approved_listing(UserId::new());
        let trail = listing.audit_trail().len();
        let Ok(outcome) = listing.approve(&admin(None), Some(srv(9)), Utc::now()) else {
            panic!("replay should succeed");
        };
        assert!(outcome.replayed);
        assert_eq!(listing.public_id(), Some(srv(1)));
        assert_eq!(listing.audit_trail().len(), trail);
    }

    #[test]
    fn approve_with_nothing_pending_outside_replay_window_fails() {
        let mut listing = approved_listing(UserId::new());
        let later = Utc::now() + Duration::minutes(REPLAY_WINDOW_MINUTES + 1);
        let result = listing.approve(&admin(None), None, later);
        assert!(matches!(result, Err(MarketError::NoPendingAction(_))));
    }

    #[test]
    fn rejecting_after_approval_is_not_a_replay() {
        let mut listing = approved_listing(UserId::new());
        let result = listing.reject(&admin(Some("changed my mind")), Utc::now());
        assert!(matches!(result, Err(MarketError::NoPendingAction(_))));
    }

    #[test]
    fn update_is_staged_then_rejected_back_to_original() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let original = listing.content().clone();

        let Ok(_) = listing.submit_update(owner, &price_draft(500.0), None, Utc::now()) else {
            panic!("update should stage");
        };
        assert_eq!(listing.status(), ListingStatus::Approved);
        assert_eq!(listing.content(), &original);
        assert!(listing.needs_admin_action());

        let Ok(outcome) = listing.reject(&admin(Some("too vague")), Utc::now()) else {
            panic!("reject failed");
        };
        assert_eq!(outcome.request_type, Some(RequestType::Update));
        assert_eq!(listing.status(), ListingStatus::Approved);
        assert_eq!(listing.content(), &original);
        assert!(listing.pending_changes().is_none());
        assert!(listing.last_updated_at().is_none());
    }

    #[test]
    fn approved_update_merges_and_stamps_last_updated() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let Ok(request_id) = listing.submit_update(owner, &price_draft(500.0), None, Utc::now())
        else {
            panic!("update should stage");
        };
        let action = AdminAction {
            request_id: Some(request_id),
            ..admin(None)
        };
        let Ok(_) = listing.approve(&action, None, Utc::now()) else {
            panic!("approve failed");
        };
        assert_eq!(listing.content().pricing.base_price, 500.0);
        assert_eq!(listing.content().name, "Balayage & Gloss");
        assert_eq!(listing.public_id(), Some(srv(1)));
        let (Some(first), Some(last)) = (listing.first_approved_at(), listing.last_updated_at())
        else {
            panic!("timestamps set");
        };
        assert!(first <= last);

        // Same request id again: replay, same final state.
        let state = listing.clone();
        let Ok(replay) = listing.approve(&action, None, Utc::now()) else {
            panic!("replay failed");
        };
        assert!(replay.replayed);
        assert_eq!(listing, state);
    }

    #[test]
    fn second_request_while_one_is_pending_fails() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let Ok(_) = listing.submit_update(owner, &price_draft(80.0), None, Utc::now()) else {
            panic!("update should stage");
        };
        let again = listing.submit_update(owner, &price_draft(90.0), None, Utc::now());
        assert!(matches!(again, Err(MarketError::PendingChangesExist(_))));
        let delete = listing.submit_delete(owner, None, Utc::now());
        assert!(matches!(delete, Err(MarketError::PendingChangesExist(_))));
    }

    #[test]
    fn initial_submission_blocks_updates() {
        let owner = UserId::new();
        let mut listing = sample_listing(owner);
        let result = listing.submit_update(owner, &price_draft(80.0), None, Utc::now());
        assert!(matches!(result, Err(MarketError::PendingChangesExist(_))));
    }

    #[test]
    fn only_the_owner_can_stage() {
        let mut listing = approved_listing(UserId::new());
        let result = listing.submit_delete(UserId::new(), None, Utc::now());
        assert!(matches!(result, Err(MarketError::NotOwner(_))));
    }

    #[test]
    fn ownership_is_checked_before_validation() {
        let mut listing = approved_listing(UserId::new());
        let result = listing.submit_update(UserId::new(), &price_draft(-1.0), None, Utc::now());
        assert!(matches!(result, Err(MarketError::NotOwner(_))));
    }

    #[test]
    fn empty_update_is_a_validation_error() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let result = listing.submit_update(owner, &ListingDraft::default(), None, Utc::now());
        assert!(matches!(result, Err(MarketError::Validation(_))));
        assert!(listing.pending_changes().is_none());
    }

    #[test]
    fn approved_delete_is_a_soft_delete() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let Ok(_) = listing.submit_delete(owner, Some("closing".to_string()), Utc::now()) else {
            panic!("delete should stage");
        };
        let Ok(_) = listing.approve(&admin(None), None, Utc::now()) else {
            panic!("approve failed");
        };
        assert_eq!(listing.status(), ListingStatus::Deleted);
        assert!(listing.deleted_at().is_some());
        assert!(!listing.is_active());
        assert!(!listing.is_visible_to_provider());
        assert_eq!(listing.public_id(), Some(srv(1)));
        assert_eq!(listing.content().name, "Balayage & Gloss");
    }

    #[test]
    fn rejected_delete_restores_prior_status() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let Ok(()) = listing.deactivate(UserId::new(), None, Utc::now()) else {
            panic!("deactivate failed");
        };
        let Ok(_) = listing.submit_delete(owner, None, Utc::now()) else {
            panic!("delete should stage");
        };
        let Ok(_) = listing.reject(&admin(Some("keep it for now")), Utc::now()) else {
            panic!("reject failed");
        };
        assert_eq!(listing.status(), ListingStatus::Inactive);
        assert!(!listing.is_active());
        assert!(listing.deleted_at().is_none());
    }

    #[test]
    fn reactivation_after_delete() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let Ok(_) = listing.submit_delete(owner, None, Utc::now()) else {
            panic!("delete should stage");
        };
        let Ok(_) = listing.approve(&admin(None), None, Utc::now()) else {
            panic!("approve delete failed");
        };
        let Ok(_) = listing.submit_reactivate(owner, None, Utc::now()) else {
            panic!("reactivate should stage");
        };
        let Ok(_) = listing.approve(&admin(None), None, Utc::now()) else {
            panic!("approve reactivate failed");
        };
        assert_eq!(listing.status(), ListingStatus::Approved);
        assert!(listing.is_active());
        assert!(listing.is_visible_to_provider());
        assert_eq!(listing.public_id(), Some(srv(1)));
    }

    #[test]
    fn reactivate_requires_inactive_or_deleted() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let result = listing.submit_reactivate(owner, None, Utc::now());
        assert!(matches!(result, Err(MarketError::InvalidTransition { .. })));
    }

    #[test]
    fn initial_rejection_then_resubmission() {
        let owner = UserId::new();
        let mut listing = sample_listing(owner);
        let Ok(_) = listing.reject(&admin(Some("photos missing")), Utc::now()) else {
            panic!("reject failed");
        };
        assert_eq!(listing.status(), ListingStatus::Rejected);
        assert!(listing.public_id().is_none());

        let Ok(_) = listing.resubmit(owner, &price_draft(99.0), None, Utc::now()) else {
            panic!("resubmit failed");
        };
        assert_eq!(listing.status(), ListingStatus::PendingApproval);
        assert_eq!(
            listing.pending_changes().map(|p| p.request_type),
            Some(RequestType::Create)
        );
        assert!(listing.approval_needs_public_id());

        let Ok(outcome) = listing.approve(&admin(None), Some(srv(4)), Utc::now()) else {
            panic!("approve failed");
        };
        assert_eq!(outcome.request_type, Some(RequestType::Create));
        assert_eq!(listing.public_id(), Some(srv(4)));
        assert_eq!(listing.content().pricing.base_price, 99.0);
        assert!(listing.pending_changes().is_none());
    }

    #[test]
    fn reject_requires_a_meaningful_reason() {
        let mut listing = sample_listing(UserId::new());
        for reason in [None, Some(""), Some("  no  ")] {
            let result = listing.reject(&admin(reason), Utc::now());
            assert!(matches!(result, Err(MarketError::Validation(_))));
        }
        assert_eq!(listing.status(), ListingStatus::PendingApproval);
    }

    #[test]
    fn stale_request_id_is_refused() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let Ok(_) = listing.submit_update(owner, &price_draft(70.0), None, Utc::now()) else {
            panic!("update should stage");
        };
        let action = AdminAction {
            request_id: Some(Uuid::new_v4()),
            ..admin(None)
        };
        let result = listing.approve(&action, None, Utc::now());
        assert!(matches!(result, Err(MarketError::NoPendingAction(_))));
        assert!(listing.pending_changes().is_some());
    }

    #[test]
    fn audit_trail_grows_and_keeps_pre_change_snapshots() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        let Ok(_) = listing.submit_update(owner, &price_draft(300.0), None, Utc::now()) else {
            panic!("update should stage");
        };
        let Ok(_) = listing.approve(&admin(None), None, Utc::now()) else {
            panic!("approve failed");
        };
        let actions: Vec<AuditAction> =
            listing.audit_trail().entries().iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Created,
                AuditAction::Approved,
                AuditAction::UpdateRequested,
                AuditAction::Approved,
            ]
        );
        let Some(last) = listing.audit_trail().last() else {
            panic!("trail not empty");
        };
        let Some(snapshot) = &last.snapshot else {
            panic!("approval carries snapshot");
        };
        assert_eq!(snapshot.content.pricing.base_price, 120.0);
    }

    #[test]
    fn display_status_prefers_pending_changes() {
        let owner = UserId::new();
        let mut listing = approved_listing(owner);
        assert_eq!(listing.display_status().label, "Approved");
        let Ok(_) = listing.submit_delete(owner, None, Utc::now()) else {
            panic!("delete should stage");
        };
        let display = listing.display_status();
        assert_eq!(display.status, ListingStatus::Approved);
        assert_eq!(display.label, "Deletion pending review");
        assert!(display.is_pending);
    }
}
