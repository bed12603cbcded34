//! REST document store

use serde_json::Value;

use crate::api::{ApiClient, ApiError};
use crate::backend::{DocumentStore, StoreError, StoreResult};
use crate::models::{AddResponse, DecrementRequest, DecrementResponse, Document, QueryRequest};

pub struct RestStore {
    client: ApiClient,
}

impl RestStore {
    pub fn new(client: ApiClient) -> Self {
        RestStore { client }
    }
}

fn collection_path(collection: &str) -> String {
    format!("/api/documents/{}", collection)
}

fn document_path(collection: &str, id: &str) -> String {
    format!("/api/documents/{}/{}", collection, id)
}

fn store_error(err: ApiError, collection: &str, id: &str) -> StoreError {
    match err {
        ApiError::NotFound(_) => StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        },
        ApiError::Conflict(message) => StoreError::Conflict(message),
        ApiError::Unprocessable(message) => StoreError::Invalid(message),
        other => StoreError::Backend(other.to_string()),
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl DocumentStore for RestStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        match self.client.get::<Document>(&document_path(collection, id)).await {
            Ok(doc) => Ok(Some(doc.data)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(store_error(e, collection, id)),
        }
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<()> {
        self.client
            .put_no_response(&document_path(collection, id), &data)
            .await
            .map_err(|e| store_error(e, collection, id))
    }

    async fn query_eq(&self, collection: &str, field: &str, value: Value) -> StoreResult<Vec<Document>> {
        let request = QueryRequest {
            field: field.to_string(),
            value,
        };
        self.client
            .post(&format!("{}/query", collection_path(collection)), &request)
            .await
            .map_err(|e| store_error(e, collection, ""))
    }

    async fn add(&self, collection: &str, data: Value) -> StoreResult<String> {
        let response: AddResponse = self
            .client
            .post(&collection_path(collection), &data)
            .await
            .map_err(|e| store_error(e, collection, ""))?;
        Ok(response.id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        self.client
            .patch_no_response(&document_path(collection, id), &patch)
            .await
            .map_err(|e| store_error(e, collection, id))
    }

    async fn decrement_if_positive(&self, collection: &str, id: &str, field: &str) -> StoreResult<Option<i64>> {
        let request = DecrementRequest {
            field: field.to_string(),
        };
        let response: DecrementResponse = self
            .client
            .post(&format!("{}/decrement", document_path(collection, id)), &request)
            .await
            .map_err(|e| store_error(e, collection, id))?;
        Ok(response.value)
    }
}
