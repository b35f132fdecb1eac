//! Background tasks that persist the event stream and prune old events.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::domain::EventBus;
use crate::persistence::PostgresPersistence;

/// How often old events are pruned.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(3_600);

/// Subscribes to the bus and appends every event to the `events` table.
///
/// A failed write is logged and skipped; a lagging recorder logs how many
/// events it missed and carries on.
#[must_use]
pub fn spawn_recorder(bus: &EventBus, persistence: PostgresPersistence) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let payload = match serde_json::to_value(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(error = %e, "event not serializable");
                            continue;
                        }
                    };
                    if let Err(e) = persistence
                        .save_event(*event.listing_id().as_uuid(), event.event_type_str(), &payload)
                        .await
                    {
                        tracing::warn!(error = %e, event_type = event.event_type_str(), "event not recorded");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event recorder lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Periodically deletes events older than `after_days`.
#[must_use]
pub fn spawn_cleanup(persistence: PostgresPersistence, after_days: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            match persistence.delete_old_events(after_days).await {
                Ok(0) => {}
                Ok(deleted) => tracing::info!(deleted, after_days, "old events pruned"),
                Err(e) => tracing::warn!(error = %e, "event cleanup failed"),
            }
        }
    })
}
