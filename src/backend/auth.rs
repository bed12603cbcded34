//! Authentication provider contract

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use super::MaybeSendSync;
use crate::models::{FederatedProvider, Identity};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Email address is already registered")]
    DuplicateEmail,
    #[error("Password is too weak")]
    WeakPassword,
    #[error("Federated login unavailable: {0}")]
    Unsupported(String),
    #[error("Authentication service error: {0}")]
    Other(String),
}

/// Provider state as seen by subscribers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<Identity>,
    pub loading: bool,
    pub error: Option<AuthError>,
}

impl AuthSnapshot {
    pub fn signed_in(user: Identity) -> Self {
        AuthSnapshot { user: Some(user), loading: false, error: None }
    }

    pub fn signed_out() -> Self {
        AuthSnapshot::default()
    }

    pub fn failed(error: AuthError) -> Self {
        AuthSnapshot { user: None, loading: false, error: Some(error) }
    }
}

/// Stream of provider state changes; the first item is the state at subscription time
pub type AuthEvents = UnboundedReceiver<AuthSnapshot>;

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AuthProvider: MaybeSendSync {
    /// Create an email/password account and sign it in
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Leave the page for the provider's login screen
    async fn begin_federated_login(&self, provider: FederatedProvider) -> Result<(), AuthError>;

    /// Identity produced by a federated login that just redirected back, if any
    async fn resolve_redirect_result(&self) -> Result<Option<Identity>, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn current_user(&self) -> Option<Identity>;

    fn subscribe(&self) -> AuthEvents;
}

/// Fan-out of snapshots to every live subscriber
#[derive(Default)]
pub struct AuthBroadcast {
    senders: Mutex<Vec<UnboundedSender<AuthSnapshot>>>,
}

impl AuthBroadcast {
    pub fn subscribe(&self, current: AuthSnapshot) -> AuthEvents {
        let (tx, rx) = unbounded();
        let _ = tx.unbounded_send(current);
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, snapshot: AuthSnapshot) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        // Dropped receivers are pruned here
        senders.retain(|tx| tx.unbounded_send(snapshot.clone()).is_ok());
    }
}
