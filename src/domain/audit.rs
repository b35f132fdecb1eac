//! Append-only audit trail of listing actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::approval::RequestType;
use super::listing::{ListingContent, ListingStatus};
use super::{PublicId, UserId};

/// Kind of action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Provider created the listing.
    Created,
    /// Provider resubmitted a rejected listing.
    Resubmitted,
    /// Provider staged an update.
    UpdateRequested,
    /// Provider asked for deletion.
    DeleteRequested,
    /// Provider asked for reactivation.
    ReactivateRequested,
    /// Admin approved the pending request.
    Approved,
    /// Admin rejected the pending request.
    Rejected,
    /// Admin suspended an approved listing.
    Deactivated,
}

impl AuditAction {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Resubmitted => "resubmitted",
            Self::UpdateRequested => "update_requested",
            Self::DeleteRequested => "delete_requested",
            Self::ReactivateRequested => "reactivate_requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deactivated => "deactivated",
        }
    }
}

/// State of a listing captured right before an action changed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    /// Status before the action.
    pub status: ListingStatus,
    /// Public id before the action.
    pub public_id: Option<PublicId>,
    /// Active flag before the action.
    pub is_active: bool,
    /// Content fields before the action.
    pub content: ListingContent,
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// What happened.
    pub action: AuditAction,
    /// Who did it.
    pub actor_id: UserId,
    /// Free-text reason supplied with the action.
    pub reason: Option<String>,
    /// Request type the action relates to, if any.
    pub request_type: Option<RequestType>,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Listing state before the change. `None` for creation.
    pub snapshot: Option<AuditSnapshot>,
}

/// Ordered audit history. Entries can only be appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<AuditEntry>);

impl AuditTrail {
    /// Appends an entry at the end of the trail.
    pub fn push(&mut self, entry: AuditEntry) {
        self.0.push(entry);
    }

    /// Entries in the order they were recorded.
    #[must_use]
    pub fn entries(&self) -> &[AuditEntry] {
        &self.0
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&AuditEntry> {
        self.0.last()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
