//! Account and invitation record operations

use serde_json::Value;

use crate::backend::{DocumentStore, StoreResult};
use crate::models::{
    AccountRecord, Document, InvitationEdge, INVITATIONS, INVITATION_KEY_FIELD, QUOTA_FIELD, USERS,
};

pub async fn get_account(store: &dyn DocumentStore, uid: &str) -> StoreResult<Option<AccountRecord>> {
    match store.get(USERS, uid).await? {
        Some(data) => Ok(Some(serde_json::from_value(data)?)),
        None => Ok(None),
    }
}

pub async fn create_account(store: &dyn DocumentStore, uid: &str, record: &AccountRecord) -> StoreResult<()> {
    store.set(USERS, uid, serde_json::to_value(record)?).await
}

/// Accounts holding the given invitation key; normally zero or one
pub async fn find_by_invitation_key(store: &dyn DocumentStore, key: &str) -> StoreResult<Vec<Document>> {
    store
        .query_eq(USERS, INVITATION_KEY_FIELD, Value::String(key.to_string()))
        .await
}

pub async fn invitation_key_in_use(store: &dyn DocumentStore, key: &str) -> StoreResult<bool> {
    Ok(!find_by_invitation_key(store, key).await?.is_empty())
}

/// Append a "from invited to" edge, returning its id
pub async fn record_invitation(store: &dyn DocumentStore, from: &str, to: &str) -> StoreResult<String> {
    store
        .add(INVITATIONS, serde_json::to_value(InvitationEdge::new(from, to))?)
        .await
}

/// Take one invitation from the account's quota.
///
/// Returns the remaining quota, or `None` when nothing was left to take.
pub async fn consume_invitation(store: &dyn DocumentStore, uid: &str) -> StoreResult<Option<i64>> {
    store.decrement_if_positive(USERS, uid, QUOTA_FIELD).await
}

/// Edges whose inviter is `uid`
pub async fn list_invitations_by_inviter(store: &dyn DocumentStore, uid: &str) -> StoreResult<Vec<InvitationEdge>> {
    store
        .query_eq(INVITATIONS, "from", Value::String(uid.to_string()))
        .await?
        .iter()
        .map(|doc| Ok(doc.parse::<InvitationEdge>()?))
        .collect()
}
