//! Listing DTOs for submission, review and read endpoints.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    AuditEntry, DecisionOutcome, Listing, ListingDraft, PendingChange, PricedOption, Pricing,
    PricingDraft, StatusDisplay,
};

/// A named price point (variation or add-on).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PricedOptionDto {
    /// Display name.
    pub name: String,
    /// Price, non-negative.
    pub price: f64,
}

impl From<PricedOptionDto> for PricedOption {
    fn from(dto: PricedOptionDto) -> Self {
        Self {
            name: dto.name,
            price: dto.price,
        }
    }
}

impl From<&PricedOption> for PricedOptionDto {
    fn from(option: &PricedOption) -> Self {
        Self {
            name: option.name.clone(),
            price: option.price,
        }
    }
}

/// Pricing block as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PricingRequest {
    /// Base price (required on create). Numeric strings are accepted.
    #[schema(value_type = Option<f64>)]
    pub base_price: Option<serde_json::Value>,
    /// Priced variations.
    pub variations: Vec<PricedOptionDto>,
    /// Priced add-ons.
    pub add_ons: Vec<PricedOptionDto>,
}

/// Request body for creating, updating or resubmitting a listing.
///
/// On create every required field must be present; on update only the
/// supplied fields are validated and staged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ListingRequest {
    /// Display name, 2 to 100 characters.
    pub name: Option<String>,
    /// Treatment type, e.g. `hair`, `nails` or `massage`.
    pub service_type: Option<String>,
    /// Audience: `women`, `men`, `unisex` or `kids`.
    pub category: Option<String>,
    /// Up to 2000 characters.
    pub description: Option<String>,
    /// Pricing block.
    pub pricing: Option<PricingRequest>,
    /// Duration in whole minutes. Numeric strings are accepted.
    #[schema(value_type = Option<u32>)]
    pub duration_minutes: Option<serde_json::Value>,
    /// Weekday names (`monday`, `tue`, ...).
    pub available_days: Option<Vec<String>>,
    /// `in_salon` (default), `at_home` or `both`.
    pub location_mode: Option<String>,
    /// Cancellation or booking policy.
    pub policy: Option<String>,
    /// Services bundled into a package.
    pub included_services: Option<Vec<String>>,
    /// Optional note for the reviewer.
    pub reason: Option<String>,
}

impl ListingRequest {
    /// Splits the request into the validation draft and the reviewer note.
    #[must_use]
    pub fn into_draft(self) -> (ListingDraft, Option<String>) {
        let pricing = self.pricing.map(|p| PricingDraft {
            base_price: p.base_price,
            variations: p.variations.into_iter().map(Into::into).collect(),
            add_ons: p.add_ons.into_iter().map(Into::into).collect(),
        });
        let draft = ListingDraft {
            name: self.name,
            service_type: self.service_type,
            category: self.category,
            description: self.description,
            pricing,
            duration_minutes: self.duration_minutes,
            available_days: self.available_days,
            location_mode: self.location_mode,
            policy: self.policy,
            included_services: self.included_services,
        };
        (draft, self.reason)
    }
}

/// Pricing block as stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct PricingDto {
    /// Base price.
    pub base_price: f64,
    /// Priced variations.
    pub variations: Vec<PricedOptionDto>,
    /// Priced add-ons.
    pub add_ons: Vec<PricedOptionDto>,
}

impl From<&Pricing> for PricingDto {
    fn from(pricing: &Pricing) -> Self {
        Self {
            base_price: pricing.base_price,
            variations: pricing.variations.iter().map(Into::into).collect(),
            add_ons: pricing.add_ons.iter().map(Into::into).collect(),
        }
    }
}

/// Staged provider request awaiting review.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingChangeDto {
    /// Token identifying this request.
    pub request_id: Uuid,
    /// `create`, `update`, `delete` or `reactivate`.
    pub request_type: String,
    /// When the provider staged it.
    pub requested_at: DateTime<Utc>,
    /// Provider note.
    pub reason: Option<String>,
    /// Proposed field changes (updates only).
    #[schema(value_type = Option<Object>)]
    pub proposed: Option<serde_json::Value>,
}

impl From<&PendingChange> for PendingChangeDto {
    fn from(change: &PendingChange) -> Self {
        Self {
            request_id: change.request_id,
            request_type: change.request_type.as_str().to_string(),
            requested_at: change.requested_at,
            reason: change.reason.clone(),
            proposed: change
                .proposed
                .as_ref()
                .and_then(|patch| serde_json::to_value(patch).ok()),
        }
    }
}

/// Listing as returned by read and write endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListingResponse {
    /// Internal identifier.
    pub id: Uuid,
    /// `SRV_###` / `PKG_###`, assigned on first approval.
    pub public_id: Option<String>,
    /// `service` or `package`.
    pub kind: String,
    /// Owning provider.
    pub owner_id: Uuid,
    /// Lifecycle status.
    pub status: String,
    /// Human-readable status label.
    pub status_label: String,
    /// Whether a provider request awaits review.
    pub is_pending: bool,
    /// Whether the listing is live.
    pub is_active: bool,
    /// Display name.
    pub name: String,
    /// Service type.
    pub service_type: String,
    /// Category.
    pub category: String,
    /// Description.
    pub description: String,
    /// Pricing.
    pub pricing: PricingDto,
    /// Duration in minutes.
    pub duration_minutes: u32,
    /// Offered weekdays.
    pub available_days: Vec<String>,
    /// Where the service happens.
    pub location_mode: String,
    /// Policy text.
    pub policy: Option<String>,
    /// Bundled services (packages).
    pub included_services: Vec<String>,
    /// First submission time.
    pub first_submitted_at: DateTime<Utc>,
    /// First approval time.
    pub first_approved_at: Option<DateTime<Utc>>,
    /// Last applied content change.
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Soft deletion time.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Staged request, shown to the owner and admins only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_change: Option<PendingChangeDto>,
}

impl ListingResponse {
    /// Public view without review details.
    #[must_use]
    pub fn public(listing: &Listing) -> Self {
        Self::build(listing, false)
    }

    /// Owner/admin view including the staged request.
    #[must_use]
    pub fn detailed(listing: &Listing) -> Self {
        Self::build(listing, true)
    }

    fn build(listing: &Listing, with_pending: bool) -> Self {
        let content = listing.content();
        let display = listing.display_status();
        Self {
            id: *listing.id().as_uuid(),
            public_id: listing.public_id().map(|p| p.to_string()),
            kind: listing.kind().as_str().to_string(),
            owner_id: *listing.owner_id().as_uuid(),
            status: display.status.as_str().to_string(),
            status_label: display.label.to_string(),
            is_pending: display.is_pending,
            is_active: listing.is_active(),
            name: content.name.clone(),
            service_type: content.service_type.as_str().to_string(),
            category: content.category.as_str().to_string(),
            description: content.description.clone(),
            pricing: PricingDto::from(&content.pricing),
            duration_minutes: content.duration_minutes,
            available_days: content.available_days.iter().map(|d| day_name(*d).to_string()).collect(),
            location_mode: content.location_mode.as_str().to_string(),
            policy: content.policy.clone(),
            included_services: content.included_services.clone(),
            first_submitted_at: listing.first_submitted_at(),
            first_approved_at: listing.first_approved_at(),
            last_updated_at: listing.last_updated_at(),
            deleted_at: listing.deleted_at(),
            pending_change: if with_pending {
                listing.pending_changes().map(PendingChangeDto::from)
            } else {
                None
            },
        }
    }
}

/// Lowercase weekday name used on the wire.
#[must_use]
pub const fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Response body for `GET /listings/{id}/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Listing identifier.
    pub listing_id: Uuid,
    /// Public id once approved.
    pub public_id: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Human-readable label, e.g. `Approved (Update Pending)`.
    pub label: String,
    /// Whether a provider request awaits review.
    pub is_pending: bool,
    /// Kind of the staged request, if any.
    pub pending_request_type: Option<String>,
}

impl StatusResponse {
    /// Builds the status view.
    #[must_use]
    pub fn new(listing: &Listing, display: &StatusDisplay) -> Self {
        Self {
            listing_id: *listing.id().as_uuid(),
            public_id: listing.public_id().map(|p| p.to_string()),
            status: display.status.as_str().to_string(),
            label: display.label.to_string(),
            is_pending: display.is_pending,
            pending_request_type: listing
                .pending_changes()
                .map(|c| c.request_type.as_str().to_string()),
        }
    }
}

/// Query parameters for `GET /listings`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ListingsQuery {
    /// Restrict to `service` or `package`.
    pub kind: Option<String>,
}

/// Request body for admin approve/reject.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DecisionRequest {
    /// Request being decided; guards against acting on a newer request.
    pub request_id: Option<Uuid>,
    /// Reviewer note; required (5 to 500 characters) when rejecting.
    pub reason: Option<String>,
}

/// Response body for admin approve/reject.
#[derive(Debug, Serialize, ToSchema)]
pub struct DecisionResponse {
    /// Listing after the decision.
    pub listing: ListingResponse,
    /// `true` when the call repeated an already-applied decision.
    pub replayed: bool,
    /// Kind of request decided.
    pub request_type: Option<String>,
    /// Public id assigned by this approval.
    pub assigned_public_id: Option<String>,
}

impl DecisionResponse {
    /// Builds the decision view.
    #[must_use]
    pub fn new(listing: &Listing, outcome: &DecisionOutcome) -> Self {
        Self {
            listing: ListingResponse::detailed(listing),
            replayed: outcome.replayed,
            request_type: outcome.request_type.map(|t| t.as_str().to_string()),
            assigned_public_id: outcome.assigned_public_id.map(|p| p.to_string()),
        }
    }
}

/// One audit trail entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEntryDto {
    /// What happened.
    pub action: String,
    /// Who did it.
    pub actor_id: Uuid,
    /// Note attached to the action.
    pub reason: Option<String>,
    /// Request kind the action belongs to.
    pub request_type: Option<String>,
    /// When.
    pub timestamp: DateTime<Utc>,
    /// Listing state right before the action.
    #[schema(value_type = Option<Object>)]
    pub snapshot: Option<serde_json::Value>,
}

impl From<&AuditEntry> for AuditEntryDto {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            action: entry.action.as_str().to_string(),
            actor_id: *entry.actor_id.as_uuid(),
            reason: entry.reason.clone(),
            request_type: entry.request_type.map(|t| t.as_str().to_string()),
            timestamp: entry.timestamp,
            snapshot: entry
                .snapshot
                .as_ref()
                .and_then(|s| serde_json::to_value(s).ok()),
        }
    }
}

/// Response body for `GET /admin/listings/{id}/history`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Listing identifier.
    pub listing_id: Uuid,
    /// Public id once approved.
    pub public_id: Option<String>,
    /// Entries, oldest first.
    pub entries: Vec<AuditEntryDto>,
}
