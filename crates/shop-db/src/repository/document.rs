//! # Document Repository
//!
//! Opaque JSON documents keyed by `(collection, id)`. Settings and job
//! applications live here; the store checks nothing beyond well-formed JSON.

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// Shop settings collection (`id` is usually `"1"`).
pub const SETTINGS: &str = "settings";

/// Job application collection.
pub const APPLICATIONS: &str = "applications";

#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    /// Lists every document in a collection as `(id, body)` pairs.
    pub async fn list(&self, collection: &str) -> DbResult<Vec<(String, Value)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, body)| Ok((id, serde_json::from_str(&body)?)))
            .collect()
    }

    pub async fn get(&self, collection: &str, id: &str) -> DbResult<Option<Value>> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        body.map(|b| serde_json::from_str(&b).map_err(DbError::from))
            .transpose()
    }

    /// Creates or replaces a document.
    pub async fn put(&self, collection: &str, id: &str, body: &Value) -> DbResult<()> {
        debug!(collection, id, "Storing document");

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, collection: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(collection, id));
        }
        info!(collection, id, "Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_replaces_body() {
        let db = setup().await;
        let docs = db.documents();

        docs.put(SETTINGS, "1", &json!({"payoutPct": 60})).await.unwrap();
        docs.put(SETTINGS, "1", &json!({"payoutPct": 55, "feeFlat": 0}))
            .await
            .unwrap();

        let body = docs.get(SETTINGS, "1").await.unwrap().unwrap();
        assert_eq!(body["payoutPct"], 55);
        assert_eq!(docs.list(SETTINGS).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let db = setup().await;
        let docs = db.documents();

        docs.put(APPLICATIONS, "1", &json!({"name": "Ida"})).await.unwrap();

        assert!(docs.get(SETTINGS, "1").await.unwrap().is_none());
        docs.delete(APPLICATIONS, "1").await.unwrap();
        assert!(matches!(
            docs.delete(APPLICATIONS, "1").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
