//! Idempotency-Key tracking for create requests.
//!
//! A key is claimed before the request runs and completed with its
//! result afterwards. Repeats inside the TTL replay the stored result; a
//! repeat that arrives while the first call is still running is refused.
//! A claim that is dropped without being completed (failed request,
//! cancelled future) frees the key again. A background task purges
//! expired keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::MarketError;

#[derive(Debug)]
enum Entry<V> {
    InFlight { since: Instant },
    Done { value: V, at: Instant },
}

impl<V> Entry<V> {
    const fn stamped(&self) -> Instant {
        match self {
            Self::InFlight { since } => *since,
            Self::Done { at, .. } => *at,
        }
    }
}

/// Outcome of claiming a key.
#[derive(Debug)]
pub enum Claim<V: Clone + Send + 'static> {
    /// First use. Complete the guard with the result, or drop it to free
    /// the key.
    Fresh(ClaimGuard<V>),
    /// The key was already served; here is the stored result.
    Replay(V),
}

/// Exclusive hold on an in-flight key.
#[derive(Debug)]
pub struct ClaimGuard<V: Clone + Send + 'static> {
    cache: Arc<IdempotencyCache<V>>,
    key: String,
    since: Instant,
    completed: bool,
}

impl<V: Clone + Send + 'static> ClaimGuard<V> {
    /// Stores the result so later repeats replay it.
    pub async fn complete(mut self, value: V) {
        self.cache.entries.lock().await.insert(
            self.key.clone(),
            Entry::Done {
                value,
                at: Instant::now(),
            },
        );
        self.completed = true;
    }
}

impl<V: Clone + Send + 'static> Drop for ClaimGuard<V> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Ok(mut entries) = self.cache.entries.try_lock() {
            release_in_flight(&mut entries, &self.key, self.since);
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = %self.key, "idempotency key left in flight until expiry");
            return;
        };
        let cache = Arc::clone(&self.cache);
        let key = std::mem::take(&mut self.key);
        let since = self.since;
        runtime.spawn(async move {
            release_in_flight(&mut *cache.entries.lock().await, &key, since);
        });
    }
}

/// Removes `key` only if it is still the in-flight claim started at
/// `since`, so a newer claim of the same key is left alone.
fn release_in_flight<V>(entries: &mut HashMap<String, Entry<V>>, key: &str, since: Instant) {
    if matches!(entries.get(key), Some(Entry::InFlight { since: s }) if *s == since) {
        entries.remove(key);
    }
}

/// TTL-bounded map from idempotency key to result.
#[derive(Debug)]
pub struct IdempotencyCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone + Send + 'static> IdempotencyCache<V> {
    /// Creates an empty cache remembering keys for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Claims `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::DuplicateRequest`] while another request
    /// holding the same key is still running.
    pub async fn claim(self: &Arc<Self>, key: &str) -> Result<Claim<V>, MarketError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if now.duration_since(entry.stamped()) < self.ttl => match entry {
                Entry::InFlight { .. } => Err(MarketError::DuplicateRequest(key.to_string())),
                Entry::Done { value, .. } => Ok(Claim::Replay(value.clone())),
            },
            _ => {
                entries.insert(key.to_string(), Entry::InFlight { since: now });
                Ok(Claim::Fresh(ClaimGuard {
                    cache: Arc::clone(self),
                    key: key.to_string(),
                    since: now,
                    completed: false,
                }))
            }
        }
    }

    /// Drops every key older than the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.stamped()) < self.ttl);
        before - entries.len()
    }

    /// Number of remembered keys.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns `true` if no key is remembered.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Spawns the periodic purge task.
    #[must_use]
    pub fn spawn_purger(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "expired idempotency keys purged");
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn cache<V: Clone + Send + 'static>(ttl: Duration) -> Arc<IdempotencyCache<V>> {
        Arc::new(IdempotencyCache::new(ttl))
    }

    #[tokio::test]
    async fn completed_key_replays_value() {
        let cache = cache(Duration::from_secs(60));
        let Ok(Claim::Fresh(guard)) = cache.claim("k").await else {
            panic!("first claim is fresh");
        };
        guard.complete(7_u32).await;
        assert!(matches!(cache.claim("k").await, Ok(Claim::Replay(7))));
    }

    #[tokio::test]
    async fn in_flight_key_is_a_duplicate() {
        let cache = cache::<u32>(Duration::from_secs(60));
        let Ok(Claim::Fresh(_guard)) = cache.claim("k").await else {
            panic!("first claim is fresh");
        };
        assert!(matches!(
            cache.claim("k").await,
            Err(MarketError::DuplicateRequest(_))
        ));
    }

    #[tokio::test]
    async fn dropped_claim_can_be_retried() {
        let cache = cache::<u32>(Duration::from_secs(60));
        let Ok(Claim::Fresh(guard)) = cache.claim("k").await else {
            panic!("first claim is fresh");
        };
        drop(guard);
        assert!(matches!(cache.claim("k").await, Ok(Claim::Fresh(_))));
    }

    #[tokio::test]
    async fn aborted_request_frees_its_key() {
        let cache = cache::<u32>(Duration::from_secs(60));
        let task = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let Ok(Claim::Fresh(guard)) = cache.claim("k").await else {
                    panic!("first claim is fresh");
                };
                std::future::pending::<()>().await;
                guard.complete(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(
            cache.claim("k").await,
            Err(MarketError::DuplicateRequest(_))
        ));

        task.abort();
        let _ = task.await;
        tokio::task::yield_now().await;
        assert!(matches!(cache.claim("k").await, Ok(Claim::Fresh(_))));
    }

    #[tokio::test]
    async fn stale_guard_leaves_newer_claim_alone() {
        let cache = cache::<u32>(Duration::from_millis(20));
        let Ok(Claim::Fresh(stale)) = cache.claim("k").await else {
            panic!("first claim is fresh");
        };
        tokio::time::sleep(Duration::from_millis(40)).await;
        let Ok(Claim::Fresh(_current)) = cache.claim("k").await else {
            panic!("expired claim is fresh again");
        };
        drop(stale);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_keys_are_fresh_and_purged() {
        let cache = cache(Duration::from_millis(20));
        let Ok(Claim::Fresh(a)) = cache.claim("a").await else {
            panic!("first claim is fresh");
        };
        a.complete(1_u32).await;
        let Ok(Claim::Fresh(b)) = cache.claim("b").await else {
            panic!("first claim is fresh");
        };
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.purge_expired().await, 2);
        assert!(cache.is_empty().await);
        drop(b);
        assert!(matches!(cache.claim("a").await, Ok(Claim::Fresh(_))));
    }

    #[tokio::test]
    async fn purger_task_runs() {
        let cache = cache(Duration::from_millis(10));
        let Ok(Claim::Fresh(a)) = cache.claim("a").await else {
            panic!("first claim is fresh");
        };
        a.complete(1_u32).await;
        let handle = cache.spawn_purger(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.len().await, 0);
        handle.abort();
    }
}
