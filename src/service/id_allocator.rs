//! Sequential public id allocation per listing kind.
//!
//! A [`Reservation`] holds the kind's lane lock from the moment the next
//! number is computed until the approval that uses it has been written
//! (or abandoned). Two approvals of the same kind therefore never see the
//! same high-water mark, and a failed approval never burns a number.

use tokio::sync::{Mutex, MutexGuard};

use crate::domain::{Listing, ListingKind, PublicId};
use crate::error::MarketError;
use crate::persistence::Collection;

/// Allocates `SRV_NNN` / `PKG_NNN` ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    service: Mutex<u32>,
    package: Mutex<u32>,
}

/// The next id of a kind, held exclusively until committed or dropped.
#[derive(Debug)]
pub struct Reservation<'a> {
    committed: MutexGuard<'a, u32>,
    id: PublicId,
}

impl Reservation<'_> {
    /// The reserved id.
    #[must_use]
    pub const fn id(&self) -> PublicId {
        self.id
    }

    /// Records the id as used. Dropping without committing releases the
    /// lane and the same number is offered again.
    pub fn commit(mut self) {
        *self.committed = self.id.number();
    }
}

impl IdAllocator {
    /// Creates an allocator with empty high-water marks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next free id of `kind`.
    ///
    /// The next number is one past the larger of the highest suffix found
    /// in the store and the highest number committed by this process.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Allocation`] wrapping the store failure when
    /// existing ids cannot be read.
    pub async fn reserve<'a>(
        &'a self,
        kind: ListingKind,
        listings: &Collection<Listing>,
    ) -> Result<Reservation<'a>, MarketError> {
        let committed = self.lane(kind).lock().await;
        let stored = listings
            .max_public_seq(kind.prefix())
            .await
            .map_err(|source| MarketError::Allocation {
                kind,
                source: Box::new(source),
            })?;
        let id = stored
            .max(*committed)
            .checked_add(1)
            .and_then(|next| PublicId::new(kind, next))
            .ok_or_else(|| MarketError::Internal(format!("{kind} id space exhausted")))?;
        tracing::debug!(%id, stored, committed = *committed, "public id reserved");
        Ok(Reservation { committed, id })
    }

    const fn lane(&self, kind: ListingKind) -> &Mutex<u32> {
        match kind {
            ListingKind::Service => &self.service,
            ListingKind::Package => &self.package,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn sequential_commits_count_up_per_kind() {
        let allocator = IdAllocator::new();
        let listings = Collection::in_memory();
        let mut issued = Vec::new();
        for _ in 0..3 {
            let Ok(r) = allocator.reserve(ListingKind::Service, &listings).await else {
                panic!("reserve should succeed");
            };
            issued.push(r.id().to_string());
            r.commit();
        }
        assert_eq!(issued, ["SRV_001", "SRV_002", "SRV_003"]);

        let Ok(pkg) = allocator.reserve(ListingKind::Package, &listings).await else {
            panic!("reserve should succeed");
        };
        assert_eq!(pkg.id().to_string(), "PKG_001");
    }

    #[tokio::test]
    async fn abandoned_reservation_is_reoffered() {
        let allocator = IdAllocator::new();
        let listings = Collection::in_memory();
        let Ok(first) = allocator.reserve(ListingKind::Service, &listings).await else {
            panic!("reserve should succeed");
        };
        assert_eq!(first.id().number(), 1);
        drop(first);
        let Ok(again) = allocator.reserve(ListingKind::Service, &listings).await else {
            panic!("reserve should succeed");
        };
        assert_eq!(again.id().number(), 1);
    }

    #[tokio::test]
    async fn reservation_blocks_same_kind_only() {
        let allocator = Arc::new(IdAllocator::new());
        let listings = Arc::new(Collection::in_memory());
        let Ok(held) = allocator.reserve(ListingKind::Service, &listings).await else {
            panic!("reserve should succeed");
        };

        let blocked = {
            let allocator = Arc::clone(&allocator);
            let listings = Arc::clone(&listings);
            tokio::spawn(async move {
                allocator
                    .reserve(ListingKind::Service, &listings)
                    .await
                    .map(|r| r.id().number())
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        let Ok(pkg) = allocator.reserve(ListingKind::Package, &listings).await else {
            panic!("other kind should not block");
        };
        drop(pkg);

        held.commit();
        let Ok(Ok(next)) = blocked.await else {
            panic!("blocked reservation should complete");
        };
        assert_eq!(next, 2);
    }
}
