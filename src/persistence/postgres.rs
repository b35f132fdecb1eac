//! PostgreSQL implementation of the persistence layer.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::StoredDocument;
use crate::error::MarketError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError::Internal`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), MarketError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| MarketError::Internal(format!("migration failed: {e}")))
    }

    /// Loads every document of a collection.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError::Persistence`] on database failure.
    pub async fn load_documents(&self, collection: &str) -> Result<Vec<StoredDocument>, MarketError> {
        let rows = sqlx::query_as::<_, (Uuid, i64, serde_json::Value, DateTime<Utc>)>(
            "SELECT id, version, body, updated_at FROM documents \
             WHERE collection = $1 ORDER BY created_at ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, version, body, updated_at)| StoredDocument {
                id,
                version,
                body,
                updated_at,
            })
            .collect())
    }

    /// Loads one document, if it exists.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError::Persistence`] on database failure.
    pub async fn load_document(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<StoredDocument>, MarketError> {
        let row = sqlx::query_as::<_, (Uuid, i64, serde_json::Value, DateTime<Utc>)>(
            "SELECT id, version, body, updated_at FROM documents \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, version, body, updated_at)| StoredDocument {
            id,
            version,
            body,
            updated_at,
        }))
    }

    /// Inserts a new document at version 1.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError::Persistence`] on database failure,
    /// including a duplicate id.
    pub async fn insert_document(
        &self,
        collection: &str,
        id: Uuid,
        body: &serde_json::Value,
        public_id: Option<&str>,
    ) -> Result<(), MarketError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, version, body, public_id) \
             VALUES ($1, $2, 1, $3, $4)",
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .bind(public_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrites a document if its stored version is still `expected`,
    /// bumping the version by one.
    ///
    /// # Errors
    ///
    /// - [`MarketError::VersionConflict`] if the row changed underneath us.
    /// - [`MarketError::Persistence`] on database failure.
    pub async fn update_document(
        &self,
        collection: &str,
        id: Uuid,
        expected: i64,
        body: &serde_json::Value,
        public_id: Option<&str>,
    ) -> Result<(), MarketError> {
        let result = sqlx::query(
            "UPDATE documents SET body = $4, public_id = $5, version = version + 1, \
             updated_at = now() WHERE collection = $1 AND id = $2 AND version = $3",
        )
        .bind(collection)
        .bind(id)
        .bind(expected)
        .bind(body)
        .bind(public_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::VersionConflict(id));
        }
        Ok(())
    }

    /// Highest numeric suffix among public ids `{prefix}_NNN` in a
    /// collection, `0` if there are none.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError::Persistence`] on database failure, or
    /// [`MarketError::Internal`] when the stored maximum does not fit a
    /// sequence number.
    pub async fn max_public_seq(&self, collection: &str, prefix: &str) -> Result<u32, MarketError> {
        let max = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(CAST(substring(public_id FROM '^[A-Z]+_([0-9]+)$') AS BIGINT)) \
             FROM documents WHERE collection = $1 AND public_id LIKE $2",
        )
        .bind(collection)
        .bind(format!("{prefix}\\_%"))
        .fetch_one(&self.pool)
        .await?;

        sequence_from_max(max)
    }

    /// Appends an event to the event log.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError::Persistence`] on database failure.
    pub async fn save_event(
        &self,
        listing_id: Uuid,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, MarketError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (listing_id, event_type, payload) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(listing_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Deletes events older than the given number of days.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError::Persistence`] on database failure.
    pub async fn delete_old_events(&self, before_days: u64) -> Result<u64, MarketError> {
        let Some(cutoff) = i64::try_from(before_days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };

        let result = sqlx::query("DELETE FROM events WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn sequence_from_max(max: Option<i64>) -> Result<u32, MarketError> {
    max.map_or(Ok(0), |n| {
        u32::try_from(n)
            .map_err(|_| MarketError::Internal(format!("stored public id suffix {n} out of range")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection_starts_at_zero() {
        assert!(matches!(sequence_from_max(None), Ok(0)));
        assert!(matches!(sequence_from_max(Some(41)), Ok(41)));
    }

    #[test]
    fn out_of_range_suffix_is_an_error_not_zero() {
        assert!(matches!(
            sequence_from_max(Some(i64::from(u32::MAX) + 1)),
            Err(MarketError::Internal(_))
        ));
        assert!(matches!(sequence_from_max(Some(-3)), Err(MarketError::Internal(_))));
    }
}
