//! Document routes
//!
//! Signed-in callers may read and query any collection. Writes are guarded:
//! - an account record under `users` is created once, by its owner, with the
//!   initial quota; afterwards its quota and invitation key change only
//!   through the decrement route
//! - invitation edges are appended by the invitee and never rewritten

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::backend::{DocumentStore, StoreError};
use crate::models::{
    AddResponse, DecrementRequest, DecrementResponse, Document, QueryRequest, INVITATIONS, INVITATION_KEY_FIELD,
    QUOTA_FIELD, USERS,
};
use crate::server::auth::Claims;
use crate::server::{reject, AppState, Rejection};
use crate::signup::SignupConfig;

/// Account fields clients may not patch
const PROTECTED_ACCOUNT_FIELDS: [&str; 2] = [QUOTA_FIELD, INVITATION_KEY_FIELD];

fn store_rejection(err: StoreError) -> Rejection {
    match &err {
        StoreError::NotFound { .. } => reject(StatusCode::NOT_FOUND, &err.to_string()),
        StoreError::Conflict(_) => reject(StatusCode::CONFLICT, &err.to_string()),
        StoreError::NotAnInteger { .. } | StoreError::Invalid(_) => {
            reject(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
        }
        StoreError::Backend(_) => {
            tracing::error!("Document store error: {}", err);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

fn check_owner(collection: &str, id: &str, claims: &Claims) -> Result<(), Rejection> {
    if collection == USERS && id != claims.sub {
        return Err(reject(StatusCode::FORBIDDEN, "Account records can only be written by their owner"));
    }
    Ok(())
}

fn refuse_edge_rewrite(collection: &str) -> Result<(), Rejection> {
    if collection == INVITATIONS {
        return Err(reject(StatusCode::FORBIDDEN, "Invitation records cannot be rewritten"));
    }
    Ok(())
}

/// PUT: account records start with the initial quota
fn check_set(collection: &str, id: &str, data: &Value, claims: &Claims) -> Result<(), Rejection> {
    refuse_edge_rewrite(collection)?;
    check_owner(collection, id, claims)?;
    if collection == USERS {
        let initial = SignupConfig::default().initial_invitations;
        if data.get(QUOTA_FIELD).and_then(Value::as_i64) != Some(initial) {
            return Err(reject(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("New account records start with {} invitations", initial),
            ));
        }
    }
    Ok(())
}

/// PATCH: owners may change their profile, not their quota or key
fn check_update(collection: &str, id: &str, patch: &Value, claims: &Claims) -> Result<(), Rejection> {
    refuse_edge_rewrite(collection)?;
    check_owner(collection, id, claims)?;
    if collection == USERS {
        let touches_protected = patch
            .as_object()
            .is_some_and(|fields| PROTECTED_ACCOUNT_FIELDS.iter().any(|f| fields.contains_key(*f)));
        if touches_protected {
            return Err(reject(StatusCode::FORBIDDEN, "Invitation quota and key cannot be edited"));
        }
    }
    Ok(())
}

/// POST: account records are keyed by uid; edges are written by their invitee
fn check_add(collection: &str, data: &Value, claims: &Claims) -> Result<(), Rejection> {
    match collection {
        USERS => Err(reject(StatusCode::FORBIDDEN, "Account records are keyed by uid")),
        INVITATIONS if data.get("to").and_then(Value::as_str) != Some(claims.sub.as_str()) => Err(reject(
            StatusCode::FORBIDDEN,
            "Invitation records can only be written by the invited account",
        )),
        _ => Ok(()),
    }
}

fn check_decrement(collection: &str, field: &str) -> Result<(), Rejection> {
    if collection != USERS || field != QUOTA_FIELD {
        return Err(reject(StatusCode::FORBIDDEN, "Only invitation quotas can be decremented"));
    }
    Ok(())
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    _claims: Claims,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>, Rejection> {
    state
        .store
        .get(&collection, &id)
        .await
        .map_err(store_rejection)?
        .map(|data| Json(Document { id: id.clone(), data }))
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Document not found"))
}

pub async fn set_document(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path((collection, id)): Path<(String, String)>,
    Json(data): Json<Value>,
) -> Result<StatusCode, Rejection> {
    check_set(&collection, &id, &data, &claims)?;
    let written = if collection == USERS {
        state.store.insert(&collection, &id, data).await
    } else {
        state.store.set(&collection, &id, data).await
    };
    written.map_err(store_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_document(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<StatusCode, Rejection> {
    check_update(&collection, &id, &patch, &claims)?;
    state.store.update(&collection, &id, patch).await.map_err(store_rejection)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_document(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(collection): Path<String>,
    Json(data): Json<Value>,
) -> Result<(StatusCode, Json<AddResponse>), Rejection> {
    check_add(&collection, &data, &claims)?;
    let id = state.store.add(&collection, data).await.map_err(store_rejection)?;
    Ok((StatusCode::CREATED, Json(AddResponse { id })))
}

pub async fn query_documents(
    State(state): State<Arc<AppState>>,
    _claims: Claims,
    Path(collection): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Vec<Document>>, Rejection> {
    state
        .store
        .query_eq(&collection, &req.field, req.value)
        .await
        .map(Json)
        .map_err(store_rejection)
}

pub async fn decrement_field(
    State(state): State<Arc<AppState>>,
    _claims: Claims,
    Path((collection, id)): Path<(String, String)>,
    Json(req): Json<DecrementRequest>,
) -> Result<Json<DecrementResponse>, Rejection> {
    check_decrement(&collection, &req.field)?;
    let value = state
        .store
        .decrement_if_positive(&collection, &id, &req.field)
        .await
        .map_err(store_rejection)?;
    Ok(Json(DecrementResponse { value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(uid: &str) -> Claims {
        Claims {
            sub: uid.to_string(),
            email: None,
            exp: 0,
        }
    }

    #[test]
    fn test_only_owner_writes_account_record() {
        assert!(check_owner(USERS, "u1", &claims("u1")).is_ok());

        let (status, _) = check_owner(USERS, "u2", &claims("u1")).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        assert!(check_owner("invitations", "e1", &claims("u1")).is_ok());
    }

    #[test]
    fn test_new_account_record_starts_with_initial_quota() {
        let fresh = json!({ "invitation": 3, "invitationKey": "k" });
        assert!(check_set(USERS, "u1", &fresh, &claims("u1")).is_ok());

        let inflated = json!({ "invitation": 999, "invitationKey": "k" });
        let (status, _) = check_set(USERS, "u1", &inflated, &claims("u1")).unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = check_set(USERS, "u2", &fresh, &claims("u1")).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_owner_cannot_patch_quota_or_key() {
        let profile = json!({ "name": "Ada" });
        assert!(check_update(USERS, "u1", &profile, &claims("u1")).is_ok());

        for patch in [json!({ "invitation": 999 }), json!({ "name": "Ada", "invitationKey": "mine" })] {
            let (status, _) = check_update(USERS, "u1", &patch, &claims("u1")).unwrap_err();
            assert_eq!(status, StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_invitation_edges_are_append_only() {
        let edge = json!({ "from": "u1", "to": "u2" });

        let (status, _) = check_set(INVITATIONS, "e1", &edge, &claims("u2")).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = check_update(INVITATIONS, "e1", &json!({ "to": "u3" }), &claims("u2")).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        assert!(check_add(INVITATIONS, &edge, &claims("u2")).is_ok());
        let (status, _) = check_add(INVITATIONS, &edge, &claims("u3")).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = check_add(USERS, &json!({}), &claims("u2")).unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_only_quota_field_is_decremented() {
        assert!(check_decrement(USERS, QUOTA_FIELD).is_ok());
        assert!(check_decrement(USERS, "credits").is_err());
        assert!(check_decrement(INVITATIONS, QUOTA_FIELD).is_err());
    }

    #[test]
    fn test_store_errors_map_to_status_codes() {
        let status = |err| store_rejection(err).0;
        assert_eq!(
            status(StoreError::NotFound { collection: "users".into(), id: "u1".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(StoreError::Conflict("dup".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(StoreError::NotAnInteger { field: "invitation".into() }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(StoreError::Backend("down".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
