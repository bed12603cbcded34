//! Document collections stored as JSONB rows

use serde_json::Value;
use sqlx::PgPool;

use crate::backend::{integer_field, stamp_server_timestamp, DocumentStore, StoreError, StoreResult};
use crate::models::Document;

/// [`DocumentStore`] backed by the `documents` table
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Write a record under `id` only if none exists yet
    pub async fn insert(&self, collection: &str, id: &str, mut data: Value) -> StoreResult<()> {
        stamp_server_timestamp(&mut data)?;
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("{}/{} already exists", collection, id)));
        }
        Ok(())
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait::async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        sqlx::query_scalar::<_, Value>("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn set(&self, collection: &str, id: &str, mut data: Value) -> StoreResult<()> {
        stamp_server_timestamp(&mut data)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
            "#
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn query_eq(&self, collection: &str, field: &str, value: Value) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, (String, Value)>(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND data -> $2 = $3
            ORDER BY created_at, id
            "#
        )
        .bind(collection)
        .bind(field)
        .bind(&value)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(|(id, data)| Document { id, data }).collect())
    }

    async fn add(&self, collection: &str, mut data: Value) -> StoreResult<String> {
        stamp_server_timestamp(&mut data)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        if !patch.is_object() {
            return Err(StoreError::Invalid("patch must be a JSON object".to_string()));
        }

        let result = sqlx::query("UPDATE documents SET data = data || $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .bind(&patch)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(not_found(collection, id));
        }
        Ok(())
    }

    async fn decrement_if_positive(&self, collection: &str, id: &str, field: &str) -> StoreResult<Option<i64>> {
        // One conditional UPDATE: the row lock makes concurrent decrements serialize,
        // and the WHERE clause is re-checked against the committed value
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE documents
            SET data = jsonb_set(data, ARRAY[$3::text], to_jsonb((data->>$3)::bigint - 1))
            WHERE collection = $1
              AND id = $2
              AND CASE WHEN jsonb_typeof(data->$3) = 'number' THEN (data->>$3)::bigint > 0 ELSE FALSE END
            RETURNING (data->>$3)::bigint
            "#
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        if updated.is_some() {
            return Ok(updated);
        }

        // Nothing changed: tell an exhausted quota apart from a missing or malformed record
        let data = self.get(collection, id).await?.ok_or_else(|| not_found(collection, id))?;
        integer_field(&data, field)?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Store over `DATABASE_URL` with migrations applied
    async fn pg_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = crate::server::db::init_pool(&url).await.unwrap();
        crate::server::db::run_migrations(&pool).await.unwrap();
        PgStore::new(pool)
    }

    /// Collection name private to one test run
    fn scratch_collection() -> String {
        format!("test_{}", uuid::Uuid::new_v4().simple())
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL at DATABASE_URL"]
    async fn test_decrement_stops_at_zero() {
        let store = pg_store().await;
        let collection = scratch_collection();
        store.set(&collection, "u1", json!({ "invitation": 1 })).await.unwrap();

        assert_eq!(store.decrement_if_positive(&collection, "u1", "invitation").await.unwrap(), Some(0));
        assert_eq!(store.decrement_if_positive(&collection, "u1", "invitation").await.unwrap(), None);

        let data = store.get(&collection, "u1").await.unwrap().unwrap();
        assert_eq!(data["invitation"], 0);
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL at DATABASE_URL"]
    async fn test_concurrent_decrements_grant_one() {
        let store = pg_store().await;
        let collection = scratch_collection();
        store.set(&collection, "u1", json!({ "invitation": 1 })).await.unwrap();

        let (a, b) = tokio::join!(
            store.decrement_if_positive(&collection, "u1", "invitation"),
            store.decrement_if_positive(&collection, "u1", "invitation"),
        );
        let mut results = [a.unwrap(), b.unwrap()];
        results.sort();
        assert_eq!(results, [None, Some(0)]);
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL at DATABASE_URL"]
    async fn test_decrement_distinguishes_missing_and_malformed() {
        let store = pg_store().await;
        let collection = scratch_collection();
        store.set(&collection, "u1", json!({ "invitation": "three" })).await.unwrap();

        assert!(matches!(
            store.decrement_if_positive(&collection, "u1", "invitation").await,
            Err(StoreError::NotAnInteger { .. })
        ));
        assert!(matches!(
            store.decrement_if_positive(&collection, "missing", "invitation").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL at DATABASE_URL"]
    async fn test_insert_refuses_existing_record() {
        let store = pg_store().await;
        let collection = scratch_collection();
        store.insert(&collection, "u1", json!({ "invitation": 3 })).await.unwrap();

        assert!(matches!(
            store.insert(&collection, "u1", json!({ "invitation": 999 })).await,
            Err(StoreError::Conflict(_))
        ));
        let data = store.get(&collection, "u1").await.unwrap().unwrap();
        assert_eq!(data["invitation"], 3);
    }
}
