//! Versioned document collections with per-document locking.
//!
//! A [`Collection`] keeps every document of one kind in memory, each
//! behind its own [`tokio::sync::Mutex`]. Updates run a closure against a
//! copy of the document while holding its lock, write the copy through to
//! PostgreSQL (when enabled) guarded by the stored version, and only then
//! publish it in memory. A failed closure or write leaves the document
//! untouched, except that a write with an unknown outcome (version
//! conflict, timeout) reloads the stored row.
//!
//! # Concurrency
//!
//! - Updates to the same document are serialized.
//! - Updates to different documents run concurrently.
//! - Reads take the document lock briefly and return a clone.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::models::StoredDocument;
use super::postgres::PostgresPersistence;
use crate::error::MarketError;

/// Store timeout used when none is configured.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// A JSON-serializable aggregate kept in a [`Collection`].
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name, also the value of the `collection` column.
    const COLLECTION: &'static str;

    /// Stable identifier.
    fn key(&self) -> Uuid;

    /// Human-facing sequential id (e.g. `SRV_001`), if the document has one.
    fn public_id(&self) -> Option<String> {
        None
    }

    /// Error returned when `id` is not in the collection.
    fn not_found(id: Uuid) -> MarketError {
        MarketError::NotFound(format!("{} {id}", Self::COLLECTION))
    }
}

#[derive(Debug)]
struct Versioned<T> {
    version: i64,
    doc: T,
}

/// In-memory collection of documents, optionally written through to
/// PostgreSQL.
#[derive(Debug)]
pub struct Collection<T> {
    docs: RwLock<HashMap<Uuid, Arc<Mutex<Versioned<T>>>>>,
    backend: Option<PostgresPersistence>,
    timeout: Duration,
}

impl<T: Document> Collection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(backend: Option<PostgresPersistence>, timeout: Duration) -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            backend,
            timeout,
        }
    }

    /// Creates an empty collection without durable backing.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(None, DEFAULT_STORE_TIMEOUT)
    }

    /// Loads every stored document into memory. Rows that no longer
    /// decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::StoreTimeout`] or [`MarketError::Persistence`]
    /// when the backend cannot be read.
    pub async fn hydrate(&self) -> Result<usize, MarketError> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };
        let rows = timed("hydrate", self.timeout, backend.load_documents(T::COLLECTION)).await?;

        let mut map = self.docs.write().await;
        let mut loaded = 0;
        for row in rows {
            match serde_json::from_value::<T>(row.body) {
                Ok(doc) => {
                    map.insert(
                        row.id,
                        Arc::new(Mutex::new(Versioned {
                            version: row.version,
                            doc,
                        })),
                    );
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(collection = T::COLLECTION, id = %row.id, error = %e, "skipping undecodable document");
                }
            }
        }
        Ok(loaded)
    }

    /// Inserts a new document at version 1.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Conflict`] if the id is already present.
    /// - [`MarketError::StoreTimeout`] / [`MarketError::Persistence`] if the
    ///   write-through fails; nothing is inserted then.
    pub async fn insert(&self, doc: T) -> Result<T, MarketError> {
        let id = doc.key();
        if self.docs.read().await.contains_key(&id) {
            return Err(MarketError::Conflict(format!(
                "{} {id} already exists",
                T::COLLECTION
            )));
        }
        if let Some(backend) = &self.backend {
            let body = encode(&doc)?;
            let public_id = doc.public_id();
            timed(
                "insert",
                self.timeout,
                backend.insert_document(T::COLLECTION, id, &body, public_id.as_deref()),
            )
            .await?;
        }
        self.docs.write().await.insert(
            id,
            Arc::new(Mutex::new(Versioned {
                version: 1,
                doc: doc.clone(),
            })),
        );
        Ok(doc)
    }

    /// Returns a copy of the document, if present.
    pub async fn get(&self, id: Uuid) -> Option<T> {
        let entry = self.docs.read().await.get(&id).map(Arc::clone)?;
        let guard = entry.lock().await;
        Some(guard.doc.clone())
    }

    /// Holds the document lock until the returned guard is dropped.
    #[cfg(test)]
    pub(crate) async fn hold(&self, id: Uuid) -> Option<impl Send> {
        let entry = self.docs.read().await.get(&id).map(Arc::clone)?;
        Some(entry.lock_owned().await)
    }

    /// Returns the document's current version, if present.
    pub async fn version(&self, id: Uuid) -> Option<i64> {
        let entry = self.docs.read().await.get(&id).map(Arc::clone)?;
        let guard = entry.lock().await;
        Some(guard.version)
    }

    /// Returns copies of every document matching `predicate`.
    pub async fn find(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let map = self.docs.read().await;
        let mut found = Vec::new();
        for entry in map.values() {
            let guard = entry.lock().await;
            if predicate(&guard.doc) {
                found.push(guard.doc.clone());
            }
        }
        found
    }

    /// Applies `mutate` to the document under its lock and persists the
    /// result. Returns the updated document and the closure's output.
    ///
    /// # Errors
    ///
    /// - [`Document::not_found`] if the id is unknown.
    /// - Whatever `mutate` returns; the document is left unchanged.
    /// - [`MarketError::VersionConflict`], [`MarketError::StoreTimeout`] or
    ///   [`MarketError::Persistence`] from the write-through. After a
    ///   conflict or timeout the document is reloaded from the store, so a
    ///   retry starts from what was actually committed.
    pub async fn update<R>(
        &self,
        id: Uuid,
        mutate: impl FnOnce(&mut T) -> Result<R, MarketError>,
    ) -> Result<(T, R), MarketError> {
        let entry = self
            .docs
            .read()
            .await
            .get(&id)
            .map(Arc::clone)
            .ok_or_else(|| T::not_found(id))?;
        let mut guard = entry.lock().await;

        let mut next = guard.doc.clone();
        let output = mutate(&mut next)?;

        if let Some(backend) = &self.backend {
            let body = encode(&next)?;
            let public_id = next.public_id();
            let written = timed(
                "update",
                self.timeout,
                backend.update_document(
                    T::COLLECTION,
                    id,
                    guard.version,
                    &body,
                    public_id.as_deref(),
                ),
            )
            .await;
            if let Err(e) = written {
                if matches!(e, MarketError::VersionConflict(_) | MarketError::StoreTimeout(_)) {
                    self.resync(backend, id, &mut guard).await;
                }
                return Err(e);
            }
        }

        guard.version += 1;
        guard.doc = next.clone();
        Ok((next, output))
    }

    /// Replaces the in-memory copy with the stored row after a write whose
    /// outcome is unknown. Failures are logged and leave the copy as is.
    async fn resync(&self, backend: &PostgresPersistence, id: Uuid, current: &mut Versioned<T>) {
        match timed("reload", self.timeout, backend.load_document(T::COLLECTION, id)).await {
            Ok(Some(row)) => match reconcile(current, row) {
                Ok(true) => {
                    tracing::info!(collection = T::COLLECTION, %id, version = current.version, "document reloaded from store");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(collection = T::COLLECTION, %id, error = %e, "stored document does not decode");
                }
            },
            Ok(None) => {
                tracing::warn!(collection = T::COLLECTION, %id, "document missing from store");
            }
            Err(e) => {
                tracing::warn!(collection = T::COLLECTION, %id, error = %e, "document reload failed");
            }
        }
    }

    /// Highest numeric suffix among public ids starting with `{prefix}_`.
    ///
    /// Asks the backend when there is one so ids held by rows written by
    /// other instances are seen too.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::StoreTimeout`] or [`MarketError::Persistence`]
    /// when the backend cannot be queried.
    pub async fn max_public_seq(&self, prefix: &str) -> Result<u32, MarketError> {
        if let Some(backend) = &self.backend {
            return timed(
                "max_public_seq",
                self.timeout,
                backend.max_public_seq(T::COLLECTION, prefix),
            )
            .await;
        }
        let map = self.docs.read().await;
        let mut max = 0;
        for entry in map.values() {
            let guard = entry.lock().await;
            if let Some(n) = guard
                .doc
                .public_id()
                .and_then(|p| sequence_suffix(prefix, &p))
            {
                max = max.max(n);
            }
        }
        Ok(max)
    }

    /// Number of documents.
    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    /// Returns `true` if the collection holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

/// Runs a store call under `limit`, mapping expiry to
/// [`MarketError::StoreTimeout`].
///
/// # Errors
///
/// Returns the call's own error, or [`MarketError::StoreTimeout`] on expiry.
pub async fn timed<T>(
    op: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, MarketError>>,
) -> Result<T, MarketError> {
    if let Ok(result) = tokio::time::timeout(limit, call).await {
        result
    } else {
        tracing::warn!(op, limit_ms = limit.as_millis(), "store call timed out");
        Err(MarketError::StoreTimeout(op))
    }
}

/// Adopts `row` when its version differs from `current`. Returns whether
/// anything changed.
fn reconcile<T: Document>(current: &mut Versioned<T>, row: StoredDocument) -> Result<bool, MarketError> {
    if row.version == current.version {
        return Ok(false);
    }
    let doc = serde_json::from_value::<T>(row.body)
        .map_err(|e| MarketError::Internal(format!("decode document: {e}")))?;
    current.version = row.version;
    current.doc = doc;
    Ok(true)
}

fn encode<T: Serialize>(doc: &T) -> Result<serde_json::Value, MarketError> {
    serde_json::to_value(doc).map_err(|e| MarketError::Internal(format!("encode document: {e}")))
}

/// Parses `n` out of `{prefix}_{n}`.
fn sequence_suffix(prefix: &str, public_id: &str) -> Option<u32> {
    let digits = public_id.strip_prefix(prefix)?.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
