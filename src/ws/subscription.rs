//! Per-connection subscription manager.
//!
//! Tracks which listing IDs a WebSocket client is subscribed to and
//! provides server-side event filtering.

use std::collections::HashSet;

use crate::domain::ListingId;

/// Wildcard entry selecting every listing.
pub const WILDCARD: &str = "*";

/// Manages the set of listing subscriptions for a single WebSocket
/// connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed listing IDs. Ignored while `subscribe_all` is set.
    listing_ids: HashSet<ListingId>,
    /// Whether the client subscribes to all listings (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds listing IDs to the subscription set.
    pub fn subscribe(&mut self, ids: &[ListingId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.listing_ids.extend(ids.iter().copied());
    }

    /// Removes listing IDs from the subscription set; the wildcard is
    /// dropped when `wildcard` is set.
    pub fn unsubscribe(&mut self, ids: &[ListingId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.listing_ids.remove(id);
        }
    }

    /// Returns `true` if events of `listing_id` should be forwarded.
    #[must_use]
    pub fn matches(&self, listing_id: ListingId) -> bool {
        self.subscribe_all || self.listing_ids.contains(&listing_id)
    }

    /// Returns the number of explicitly subscribed listing IDs.
    #[must_use]
    pub fn count(&self) -> usize {
        self.listing_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}

/// Splits raw ids into parsed listing IDs, the wildcard flag and the
/// entries that are neither.
#[must_use]
pub fn parse_ids(raw: &[String]) -> (Vec<ListingId>, bool, Vec<String>) {
    let mut ids = Vec::new();
    let mut wildcard = false;
    let mut rejected = Vec::new();
    for s in raw {
        let s = s.trim();
        if s == WILDCARD {
            wildcard = true;
        } else if let Ok(uuid) = s.parse::<uuid::Uuid>() {
            ids.push(ListingId::from_uuid(uuid));
        } else {
            rejected.push(s.to_string());
        }
    }
    (ids, wildcard, rejected)
}
