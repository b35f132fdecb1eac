//! Listing aggregate: a service or package offered by a provider.
//!
//! Content fields change only through the approval workflow in
//! [`super::approval`]. Identity, ownership and the first-submitted /
//! first-approved timestamps are fixed once set.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::approval::{AdminDecision, PendingChange, RequestType};
use super::audit::{AuditAction, AuditEntry, AuditSnapshot, AuditTrail};
use super::validation::ListingDraft;
use super::{ListingId, ListingKind, PublicId, UserId};
use crate::error::MarketError;

/// Lifecycle status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Submitted, awaiting first review (or resubmitted after rejection).
    PendingApproval,
    /// Live.
    Approved,
    /// Review refused the submission.
    Rejected,
    /// Suspended by an admin.
    Inactive,
    /// Soft-deleted. The record and its audit trail are retained.
    Deleted,
}

impl ListingStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every accepted value, in catalog order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire name of the value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL.iter().copied().find(|v| v.as_str() == s).ok_or(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// What kind of treatment the listing offers.
    ServiceType {
        /// Cuts, colour, styling.
        Hair => "hair",
        /// Manicure and pedicure.
        Nails => "nails",
        /// Makeup application.
        Makeup => "makeup",
        /// Facials and skin treatments.
        Skincare => "skincare",
        /// Massage therapy.
        Massage => "massage",
        /// Spa day treatments.
        Spa => "spa",
        /// Hair removal.
        Waxing => "waxing",
        /// Wedding packages.
        Bridal => "bridal",
    }
);

wire_enum!(
    /// Target audience of the listing.
    Category {
        /// Women.
        Women => "women",
        /// Men.
        Men => "men",
        /// Everyone.
        Unisex => "unisex",
        /// Children.
        Kids => "kids",
    }
);

wire_enum!(
    /// Where the service is performed.
    LocationMode {
        /// At the provider's salon.
        InSalon => "in_salon",
        /// At the customer's home.
        AtHome => "at_home",
        /// Either.
        Both => "both",
    }
);

/// Named price option (variation or add-on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedOption {
    /// Display name.
    pub name: String,
    /// Price in the marketplace currency.
    pub price: f64,
}

/// Pricing of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Base price.
    pub base_price: f64,
    /// Alternative variations of the base offer.
    #[serde(default)]
    pub variations: Vec<PricedOption>,
    /// Optional extras.
    #[serde(default)]
    pub add_ons: Vec<PricedOption>,
}

/// All fields of a listing that go through review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingContent {
    /// Display name.
    pub name: String,
    /// Treatment type.
    pub service_type: ServiceType,
    /// Audience category.
    pub category: Category,
    /// Long description.
    pub description: String,
    /// Prices.
    pub pricing: Pricing,
    /// Appointment length in minutes.
    pub duration_minutes: u32,
    /// Days the listing can be booked. Empty means every working day.
    #[serde(default)]
    pub available_days: Vec<Weekday>,
    /// Where it is performed.
    pub location_mode: LocationMode,
    /// Cancellation / house policy text.
    pub policy: Option<String>,
    /// Services bundled in a package.
    #[serde(default)]
    pub included_services: Vec<String>,
}

/// Staged content change. Only reviewable fields exist here, so identity,
/// ownership and timestamps can never be smuggled in through a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingPatch {
    /// New name.
    pub name: Option<String>,
    /// New treatment type.
    pub service_type: Option<ServiceType>,
    /// New category.
    pub category: Option<Category>,
    /// New description.
    pub description: Option<String>,
    /// New pricing (replaces the whole pricing block).
    pub pricing: Option<Pricing>,
    /// New duration.
    pub duration_minutes: Option<u32>,
    /// New bookable days.
    pub available_days: Option<Vec<Weekday>>,
    /// New location mode.
    pub location_mode: Option<LocationMode>,
    /// New policy text.
    pub policy: Option<String>,
    /// New bundled services.
    pub included_services: Option<Vec<String>>,
}

impl ListingPatch {
    /// Returns `true` when the patch carries no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl ListingContent {
    /// Overwrites every field present in `patch`, field by field.
    pub fn apply(&mut self, patch: &ListingPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(service_type) = patch.service_type {
            self.service_type = service_type;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(pricing) = &patch.pricing {
            self.pricing.clone_from(pricing);
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(days) = &patch.available_days {
            self.available_days.clone_from(days);
        }
        if let Some(mode) = patch.location_mode {
            self.location_mode = mode;
        }
        if let Some(policy) = &patch.policy {
            self.policy = Some(policy.clone());
        }
        if let Some(included) = &patch.included_services {
            self.included_services.clone_from(included);
        }
    }
}

/// Status as presented to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    /// Underlying status.
    pub status: ListingStatus,
    /// Human-readable label.
    pub label: &'static str,
    /// Whether something awaits admin review.
    pub is_pending: bool,
}

/// A service or package listing and its review state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub(super) id: ListingId,
    pub(super) kind: ListingKind,
    pub(super) public_id: Option<PublicId>,
    pub(super) owner_id: UserId,
    pub(super) status: ListingStatus,
    pub(super) content: ListingContent,
    pub(super) pending_changes: Option<PendingChange>,
    pub(super) last_decision: Option<AdminDecision>,
    pub(super) audit_trail: AuditTrail,
    pub(super) first_submitted_at: DateTime<Utc>,
    pub(super) first_approved_at: Option<DateTime<Utc>>,
    pub(super) last_updated_at: Option<DateTime<Utc>>,
    pub(super) deleted_at: Option<DateTime<Utc>>,
    pub(super) is_active: bool,
    pub(super) is_visible_to_provider: bool,
}

impl Listing {
    /// Builds a new listing in `pending_approval` from a provider draft.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] with every failing field when
    /// the draft is not a valid complete listing.
    pub fn submit_create(
        kind: ListingKind,
        owner_id: UserId,
        draft: &ListingDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        let content = draft.to_content(kind)?;
        let mut audit_trail = AuditTrail::default();
        audit_trail.push(AuditEntry {
            action: AuditAction::Created,
            actor_id: owner_id,
            reason: None,
            request_type: Some(RequestType::Create),
            timestamp: now,
            snapshot: None,
        });
        Ok(Self {
            id: ListingId::new(),
            kind,
            public_id: None,
            owner_id,
            status: ListingStatus::PendingApproval,
            content,
            pending_changes: None,
            last_decision: None,
            audit_trail,
            first_submitted_at: now,
            first_approved_at: None,
            last_updated_at: None,
            deleted_at: None,
            is_active: false,
            is_visible_to_provider: true,
        })
    }

    /// Internal identifier.
    #[must_use]
    pub const fn id(&self) -> ListingId {
        self.id
    }

    /// Service or package.
    #[must_use]
    pub const fn kind(&self) -> ListingKind {
        self.kind
    }

    /// Public sequential id, once approved.
    #[must_use]
    pub const fn public_id(&self) -> Option<PublicId> {
        self.public_id
    }

    /// Owning provider.
    #[must_use]
    pub const fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ListingStatus {
        self.status
    }

    /// Currently approved content.
    #[must_use]
    pub const fn content(&self) -> &ListingContent {
        &self.content
    }

    /// Staged request awaiting review.
    #[must_use]
    pub const fn pending_changes(&self) -> Option<&PendingChange> {
        self.pending_changes.as_ref()
    }

    /// Most recent admin decision.
    #[must_use]
    pub const fn last_decision(&self) -> Option<&AdminDecision> {
        self.last_decision.as_ref()
    }

    /// Audit history.
    #[must_use]
    pub const fn audit_trail(&self) -> &AuditTrail {
        &self.audit_trail
    }

    /// When the listing was first submitted.
    #[must_use]
    pub const fn first_submitted_at(&self) -> DateTime<Utc> {
        self.first_submitted_at
    }

    /// When the listing was first approved.
    #[must_use]
    pub const fn first_approved_at(&self) -> Option<DateTime<Utc>> {
        self.first_approved_at
    }

    /// When an approved update was last applied.
    #[must_use]
    pub const fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated_at
    }

    /// When a deletion was approved.
    #[must_use]
    pub const fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Whether the listing is live for customers.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Whether the owner still sees the listing in their dashboard.
    #[must_use]
    pub const fn is_visible_to_provider(&self) -> bool {
        self.is_visible_to_provider
    }

    /// Returns `true` when a request waits for an admin decision.
    ///
    /// Staged `pending_changes` take precedence over the status when
    /// deciding what a decision applies to.
    #[must_use]
    pub fn needs_admin_action(&self) -> bool {
        self.pending_changes.is_some() || self.status == ListingStatus::PendingApproval
    }

    /// Returns `true` if customers may see and book the listing.
    #[must_use]
    pub fn is_bookable(&self) -> bool {
        self.status == ListingStatus::Approved && self.is_active
    }

    /// Status, label and pending flag for display.
    #[must_use]
    pub fn display_status(&self) -> StatusDisplay {
        let label = match (self.pending_changes.as_ref(), self.status) {
            (Some(p), _) => match p.request_type {
                RequestType::Create => "Resubmission pending review",
                RequestType::Update => "Update pending review",
                RequestType::Delete => "Deletion pending review",
                RequestType::Reactivate => "Reactivation pending review",
            },
            (None, ListingStatus::PendingApproval) => "Pending approval",
            (None, ListingStatus::Approved) => "Approved",
            (None, ListingStatus::Rejected) => "Rejected",
            (None, ListingStatus::Inactive) => "Inactive",
            (None, ListingStatus::Deleted) => "Deleted",
        };
        StatusDisplay {
            status: self.status,
            label,
            is_pending: self.needs_admin_action(),
        }
    }

    pub(super) fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            status: self.status,
            public_id: self.public_id,
            is_active: self.is_active,
            content: self.content.clone(),
        }
    }

    /// Sets the public id if none is held yet. Returns the id when it was
    /// newly assigned; an already assigned id is never overwritten.
    pub(super) fn assign_public_id(&mut self, candidate: PublicId) -> Option<PublicId> {
        if self.public_id.is_some() {
            return None;
        }
        self.public_id = Some(candidate);
        Some(candidate)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::validation::PricingDraft;

    pub(crate) fn sample_draft() -> ListingDraft {
        ListingDraft {
            name: Some("Balayage & Gloss".to_string()),
            service_type: Some("hair".to_string()),
            category: Some("women".to_string()),
            description: Some("Hand-painted highlights finished with a gloss.".to_string()),
            pricing: Some(PricingDraft {
                base_price: Some(serde_json::json!(120.0)),
                ..PricingDraft::default()
            }),
            duration_minutes: Some(serde_json::json!(60)),
            ..ListingDraft::default()
        }
    }

    pub(crate) fn sample_listing(owner: UserId) -> Listing {
        let Ok(listing) =
            Listing::submit_create(ListingKind::Service, owner, &sample_draft(), Utc::now())
        else {
            panic!("sample draft is valid");
        };
        listing
    }

    #[test]
    fn create_starts_pending_without_public_id() {
        let owner = UserId::new();
        let listing = sample_listing(owner);
        assert_eq!(listing.status(), ListingStatus::PendingApproval);
        assert!(listing.public_id().is_none());
        assert!(listing.needs_admin_action());
        assert!(!listing.is_bookable());
        assert_eq!(listing.audit_trail().len(), 1);
        assert_eq!(
            listing.audit_trail().last().map(|e| e.action),
            Some(AuditAction::Created)
        );
    }

    #[test]
    fn create_with_invalid_draft_collects_errors() {
        let draft = ListingDraft {
            name: Some("x".to_string()),
            pricing: Some(PricingDraft {
                base_price: Some(serde_json::json!(-1.0)),
                ..PricingDraft::default()
            }),
            ..sample_draft()
        };
        let result = Listing::submit_create(ListingKind::Service, UserId::new(), &draft, Utc::now());
        let Err(MarketError::Validation(errors)) = result else {
            panic!("expected validation failure");
        };
        assert!(errors.has_field("name"));
        assert!(errors.has_field("pricing.base_price"));
    }

    #[test]
    fn public_id_is_set_once() {
        let mut listing = sample_listing(UserId::new());
        let (Some(first), Some(second)) = (
            PublicId::new(ListingKind::Service, 1),
            PublicId::new(ListingKind::Service, 2),
        ) else {
            panic!("valid ids");
        };
        assert_eq!(listing.assign_public_id(first), Some(first));
        assert_eq!(listing.assign_public_id(second), None);
        assert_eq!(listing.public_id(), Some(first));
    }

    #[test]
    fn patch_overwrites_only_present_fields() {
        let listing = sample_listing(UserId::new());
        let mut content = listing.content().clone();
        let patch = ListingPatch {
            description: Some("A brand new description".to_string()),
            duration_minutes: Some(90),
            ..ListingPatch::default()
        };
        content.apply(&patch);
        assert_eq!(content.name, listing.content().name);
        assert_eq!(content.description, "A brand new description");
        assert_eq!(content.duration_minutes, 90);
    }

    #[test]
    fn wire_enums_parse_their_own_names() {
        for t in ServiceType::ALL {
            assert_eq!(t.as_str().parse::<ServiceType>(), Ok(*t));
        }
        assert!("barbering".parse::<ServiceType>().is_err());
        assert_eq!("at_home".parse::<LocationMode>(), Ok(LocationMode::AtHome));
    }
}
