//! Backend client contracts
//!
//! The signup workflow never talks to a concrete service. It receives an
//! [`AuthProvider`] and a [`DocumentStore`] through [`Backend`], which the app
//! builds once at the root and hands down as context.
//!
//! Implementations:
//! - REST clients talking to this crate's axum server (`crate::api`)
//! - In-memory doubles used by tests and the offline demo mode (`memory`)

pub mod auth;
pub mod memory;
pub mod store;

pub use auth::*;
pub use memory::{MemoryAuth, MemoryStore};
pub use store::*;

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

/// `Send + Sync` on native targets, nothing on wasm where futures are `!Send`
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSendSync for T {}

/// Handles to the two backend services, injected into the UI as context
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn DocumentStore>,
}

impl Backend {
    /// Backend served entirely from memory, used by the demo mode
    pub fn in_memory() -> Self {
        Backend {
            auth: Arc::new(MemoryAuth::new()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// REST backend at `api_url`; `redirect_code` is the one-time `auth_result`
    /// handed back after a federated login redirect, if any
    pub fn rest(
        api_url: &str,
        redirect_code: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, crate::api::ApiError> {
        let client = crate::api::ApiClient::new(api_url, timeout)?;
        let auth = crate::api::RestAuth::new(client.clone(), redirect_code);
        let store = crate::api::RestStore::new(client);
        Ok(Backend {
            auth: Arc::new(auth),
            store: Arc::new(store),
        })
    }
}

/// Random alphanumeric string drawn from the thread CSPRNG
pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
