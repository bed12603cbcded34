//! Document store contract
//!
//! Collection-based key-value access with equality queries, plus one atomic
//! primitive: [`DocumentStore::decrement_if_positive`]. The invitation quota is
//! only ever changed through that primitive so two signups racing on the same
//! key can never push a quota below zero.

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use super::MaybeSendSync;
use crate::models::Document;

/// Field stamped by the store when a written record leaves it empty
pub const TIMESTAMP_FIELD: &str = "timestamp";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Field {field} is not an integer")]
    NotAnInteger { field: String },

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Invalid(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait DocumentStore: MaybeSendSync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Create or replace the record stored under `id`
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()>;

    /// Every record whose `field` equals `value`
    async fn query_eq(&self, collection: &str, field: &str, value: Value) -> StoreResult<Vec<Document>>;

    /// Insert under a store-generated id
    async fn add(&self, collection: &str, data: Value) -> StoreResult<String>;

    /// Merge `patch` into an existing record
    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()>;

    /// Atomically decrement an integer field if it is greater than zero.
    ///
    /// Returns the new value, or `None` when the field was already at or below zero.
    async fn decrement_if_positive(&self, collection: &str, id: &str, field: &str) -> StoreResult<Option<i64>>;
}

/// Stamp the store clock into a record whose timestamp is absent or null
pub fn stamp_server_timestamp(data: &mut Value) -> StoreResult<()> {
    let object = data
        .as_object_mut()
        .ok_or_else(|| StoreError::Invalid("record must be a JSON object".to_string()))?;

    let needs_stamp = object.get(TIMESTAMP_FIELD).map_or(true, Value::is_null);
    if needs_stamp {
        object.insert(TIMESTAMP_FIELD.to_string(), Value::String(Utc::now().to_rfc3339()));
    }
    Ok(())
}

/// Read an integer field, failing when it is missing or not an integer
pub fn integer_field(data: &Value, field: &str) -> StoreResult<i64> {
    data.get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| StoreError::NotAnInteger { field: field.to_string() })
}
