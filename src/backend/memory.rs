//! In-memory backend
//!
//! Used by the tests and by the desktop demo mode (`SIGNUP_DEMO=1`). Every
//! call yields once before touching state, so concurrent callers interleave at
//! the same points they would over the network.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use super::auth::{AuthBroadcast, AuthError, AuthEvents, AuthProvider, AuthSnapshot};
use super::store::{integer_field, stamp_server_timestamp, DocumentStore, StoreError, StoreResult};
use super::random_alphanumeric;
use crate::models::{Document, FederatedProvider, Identity, MIN_PASSWORD_LEN};

/// Yield to the executor exactly once
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn yield_now() -> YieldNow {
    YieldNow(false)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ==================== Document store ====================

type Collection = BTreeMap<String, Value>;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, collection: &str) -> StoreResult<()> {
        if lock(&self.failing).contains(collection) {
            return Err(StoreError::Backend(format!("collection {} unavailable", collection)));
        }
        Ok(())
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Make every call touching `collection` fail with a backend error
    pub fn fail_collection(&self, collection: &str) {
        lock(&self.failing).insert(collection.to_string());
    }

    pub fn restore_collection(&self, collection: &str) {
        lock(&self.failing).remove(collection);
    }

    /// Snapshot of a whole collection, ordered by id
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        lock(&self.collections)
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document { id: id.clone(), data: data.clone() })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        yield_now().await;
        self.check(collection)?;
        Ok(lock(&self.collections)
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, mut data: Value) -> StoreResult<()> {
        yield_now().await;
        self.check(collection)?;
        stamp_server_timestamp(&mut data)?;
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    async fn query_eq(&self, collection: &str, field: &str, value: Value) -> StoreResult<Vec<Document>> {
        yield_now().await;
        self.check(collection)?;
        let collections = lock(&self.collections);
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, data)| data.get(field) == Some(&value))
            .map(|(id, data)| Document { id: id.clone(), data: data.clone() })
            .collect())
    }

    async fn add(&self, collection: &str, mut data: Value) -> StoreResult<String> {
        yield_now().await;
        self.check(collection)?;
        stamp_server_timestamp(&mut data)?;
        let id = random_alphanumeric(20);
        lock(&self.collections)
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        yield_now().await;
        self.check(collection)?;
        let Value::Object(patch) = patch else {
            return Err(StoreError::Invalid("patch must be a JSON object".to_string()));
        };

        let mut collections = lock(&self.collections);
        let record = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in patch {
            record.insert(key, value);
        }
        Ok(())
    }

    async fn decrement_if_positive(&self, collection: &str, id: &str, field: &str) -> StoreResult<Option<i64>> {
        yield_now().await;
        self.check(collection)?;

        // Check and write happen under one lock acquisition
        let mut collections = lock(&self.collections);
        let record = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let current = integer_field(record, field)?;
        if current <= 0 {
            return Ok(None);
        }
        record[field] = Value::from(current - 1);
        Ok(Some(current - 1))
    }
}

// ==================== Auth provider ====================

#[derive(Default)]
struct MemoryAuthInner {
    /// Accounts keyed by lowercased email
    accounts: HashMap<String, Identity>,
    current: Option<Identity>,
    pending_redirect: Option<Identity>,
    redirect_error: Option<AuthError>,
    federated_requests: Vec<FederatedProvider>,
}

/// Auth provider keeping accounts in memory.
///
/// Federated logins are simulated: `begin_federated_login` stages a synthetic
/// identity for the provider and the next `resolve_redirect_result` returns it.
#[derive(Default)]
pub struct MemoryAuth {
    inner: Mutex<MemoryAuthInner>,
    events: AuthBroadcast,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn sign_in(&self, identity: Identity) {
        lock(&self.inner).current = Some(identity.clone());
        self.events.publish(AuthSnapshot::signed_in(identity));
    }
}

#[cfg(test)]
impl MemoryAuth {
    pub fn stage_redirect_result(&self, identity: Identity) {
        lock(&self.inner).pending_redirect = Some(identity);
    }

    pub fn fail_next_redirect(&self, error: AuthError) {
        lock(&self.inner).redirect_error = Some(error);
    }

    /// Providers passed to `begin_federated_login`, oldest first
    pub fn federated_requests(&self) -> Vec<FederatedProvider> {
        lock(&self.inner).federated_requests.clone()
    }

    /// Push a provider failure to every subscriber
    pub fn report_error(&self, error: AuthError) {
        self.events.publish(AuthSnapshot::failed(error));
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl AuthProvider for MemoryAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        yield_now().await;
        if !email.contains('@') {
            return Err(AuthError::Other(format!("malformed email address: {}", email)));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let identity = {
            let mut inner = lock(&self.inner);
            let key = email.to_lowercase();
            if inner.accounts.contains_key(&key) {
                return Err(AuthError::DuplicateEmail);
            }
            let identity = Identity::with_email(&random_alphanumeric(28), email);
            inner.accounts.insert(key, identity.clone());
            identity
        };

        tracing::debug!(uid = %identity.uid, "Created in-memory account");
        self.sign_in(identity.clone());
        Ok(identity)
    }

    async fn begin_federated_login(&self, provider: FederatedProvider) -> Result<(), AuthError> {
        let mut inner = lock(&self.inner);
        inner.federated_requests.push(provider);
        inner.pending_redirect = Some(Identity {
            uid: format!("{}-{}", provider, random_alphanumeric(12)),
            email: None,
            display_name: Some(format!("{} user", provider)),
            photo_url: None,
        });
        Ok(())
    }

    async fn resolve_redirect_result(&self) -> Result<Option<Identity>, AuthError> {
        yield_now().await;
        let pending = {
            let mut inner = lock(&self.inner);
            if let Some(error) = inner.redirect_error.take() {
                return Err(error);
            }
            inner.pending_redirect.take()
        };

        if let Some(identity) = &pending {
            self.sign_in(identity.clone());
        }
        Ok(pending)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        lock(&self.inner).current = None;
        self.events.publish(AuthSnapshot::signed_out());
        Ok(())
    }

    fn current_user(&self) -> Option<Identity> {
        lock(&self.inner).current.clone()
    }

    fn subscribe(&self) -> AuthEvents {
        let current = match self.current_user() {
            Some(user) => AuthSnapshot::signed_in(user),
            None => AuthSnapshot::signed_out(),
        };
        self.events.subscribe(current)
    }
}
