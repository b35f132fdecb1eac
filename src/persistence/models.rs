//! Database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored row from the `documents` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document identifier, unique within its collection.
    pub id: Uuid,
    /// Optimistic concurrency version, starting at 1.
    pub version: i64,
    /// Full document as JSONB.
    pub body: serde_json::Value,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}
