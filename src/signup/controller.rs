//! Signup workflow controller
//!
//! Each operation is one sequenced async function: every backend step is
//! awaited in order and every failure ends in a defined [`SignupError`] or a
//! logged, recovered outcome. Nothing is fired and forgotten.

use std::sync::Arc;

use super::accounts;
use super::config::SignupConfig;
use super::error::SignupError;
use crate::backend::{random_alphanumeric, AuthEvents, AuthProvider, DocumentStore, StoreError, StoreResult};
use crate::models::{AccountRecord, Identity};

/// Values captured from the signup form
#[derive(Debug, Clone, PartialEq)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub token: Option<String>,
}

/// What happened to one inviter while consuming their token
#[derive(Debug, Clone, PartialEq)]
pub enum ReferralOutcome {
    Consumed { remaining: i64 },
    QuotaExhausted,
    /// The decrement itself failed; logged
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Referral {
    pub referrer: String,
    /// Id of the invitation edge, if it was written
    pub edge: Option<String>,
    pub outcome: ReferralOutcome,
}

/// A freshly provisioned account and the invitations it consumed
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned {
    pub uid: String,
    pub account: AccountRecord,
    pub referrals: Vec<Referral>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectOutcome {
    /// No federated login was waiting; nothing was written
    NoPendingLogin,
    /// The provider failed to report a result; logged only
    ProviderFailed,
    /// A returning user; their account record is left untouched
    ExistingAccount(Identity),
    Provisioned(Provisioned),
}

/// Drives account creation and invitation consumption over injected backends
pub struct SignupController {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    config: SignupConfig,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl SignupController {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn DocumentStore>, config: SignupConfig) -> Self {
        Self { auth, store, config }
    }

    pub fn config(&self) -> &SignupConfig {
        &self.config
    }

    pub fn subscribe(&self) -> AuthEvents {
        self.auth.subscribe()
    }

    /// Finish a federated login that redirected back to the signup page
    pub async fn complete_redirect(&self, url_token: Option<&str>) -> Result<RedirectOutcome, SignupError> {
        let identity = match self.auth.resolve_redirect_result().await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Ok(RedirectOutcome::NoPendingLogin),
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve redirect login result");
                return Ok(RedirectOutcome::ProviderFailed);
            }
        };

        let Some(token) = non_empty(url_token) else {
            tracing::warn!(uid = %identity.uid, "Federated signup without an invitation token");
            return Err(SignupError::TokenMissing);
        };

        match accounts::get_account(self.store.as_ref(), &identity.uid).await {
            Ok(Some(_)) => {
                tracing::info!(uid = %identity.uid, "Federated login for an existing account");
                return Ok(RedirectOutcome::ExistingAccount(identity));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(uid = %identity.uid, error = %e, "Failed to look up account record");
                return Err(SignupError::AccountRegistrationFailed);
            }
        }

        let provisioned = self.provision(&identity, token).await?;
        Ok(RedirectOutcome::Provisioned(provisioned))
    }

    /// Create an email/password account and consume the invitation token
    pub async fn submit(&self, form: &SignupForm) -> Result<Provisioned, SignupError> {
        let Some(token) = non_empty(form.token.as_deref()) else {
            return Err(SignupError::InvitationTokenMissing);
        };

        let identity = self
            .auth
            .create_account(form.email.trim(), &form.password)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Account creation failed");
                SignupError::AuthenticationFailed
            })?;

        let has_email = identity.email.as_deref().is_some_and(|email| !email.is_empty());
        if identity.uid.is_empty() || !has_email {
            tracing::error!(uid = %identity.uid, "Provider returned an identity without id or email");
            return Err(SignupError::InvalidUser);
        }

        self.provision(&identity, token).await
    }

    pub async fn begin_federated_login(&self) -> Result<(), SignupError> {
        let provider = self.config.federated_provider;
        self.auth.begin_federated_login(provider).await.map_err(|e| {
            tracing::error!(%provider, error = %e, "Could not start federated login");
            SignupError::FederatedLogin
        })
    }

    pub async fn logout(&self) -> Result<(), SignupError> {
        self.auth.sign_out().await.map_err(|e| {
            tracing::error!(error = %e, "Sign out failed");
            SignupError::ProviderUnavailable
        })
    }

    /// Shared by both signup paths: write the account record, then consume the token
    async fn provision(&self, identity: &Identity, token: &str) -> Result<Provisioned, SignupError> {
        let store = self.store.as_ref();
        let uid = identity.uid.as_str();

        let key = self.fresh_invitation_key().await.map_err(|e| {
            tracing::error!(uid, error = %e, "Could not generate an invitation key");
            SignupError::AccountRegistrationFailed
        })?;
        let account = AccountRecord::new(
            identity.display_name.clone(),
            identity.photo_url.clone(),
            self.config.initial_invitations,
            key,
        );
        accounts::create_account(store, uid, &account).await.map_err(|e| {
            tracing::error!(uid, error = %e, "Failed to write account record");
            SignupError::AccountRegistrationFailed
        })?;
        tracing::info!(uid, "Account record created");

        let referrers = accounts::find_by_invitation_key(store, token).await.map_err(|e| {
            tracing::error!(uid, error = %e, "Invitation token lookup failed");
            SignupError::Backend(e.to_string())
        })?;

        if referrers.is_empty() {
            tracing::warn!(uid, "Invitation token matches no account");
            return Err(SignupError::InvalidToken);
        }
        if referrers.len() > 1 {
            tracing::warn!(uid, matches = referrers.len(), "Invitation token is shared by several accounts");
        }

        let mut referrals = Vec::with_capacity(referrers.len());
        for referrer in &referrers {
            referrals.push(self.consume_referral(&referrer.id, uid).await);
        }

        if referrals.iter().any(|r| r.outcome == ReferralOutcome::QuotaExhausted) {
            return Err(SignupError::ReferrerQuotaExceeded);
        }

        Ok(Provisioned {
            uid: uid.to_string(),
            account,
            referrals,
        })
    }

    async fn consume_referral(&self, referrer: &str, invitee: &str) -> Referral {
        let edge_first = self.config.record_edge_on_exhausted_quota;
        let mut edge = None;
        if edge_first {
            edge = self.write_edge(referrer, invitee).await;
        }

        let outcome = match accounts::consume_invitation(self.store.as_ref(), referrer).await {
            Ok(Some(remaining)) => ReferralOutcome::Consumed { remaining },
            Ok(None) => {
                tracing::warn!(referrer, "Inviter has no invitations left");
                ReferralOutcome::QuotaExhausted
            }
            Err(e) => {
                tracing::error!(referrer, error = %e, "Failed to consume invitation");
                ReferralOutcome::Failed
            }
        };

        if !edge_first && matches!(outcome, ReferralOutcome::Consumed { .. }) {
            edge = self.write_edge(referrer, invitee).await;
        }

        Referral {
            referrer: referrer.to_string(),
            edge,
            outcome,
        }
    }

    async fn write_edge(&self, from: &str, to: &str) -> Option<String> {
        match accounts::record_invitation(self.store.as_ref(), from, to).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(from, to, error = %e, "Failed to record invitation edge");
                None
            }
        }
    }

    async fn fresh_invitation_key(&self) -> StoreResult<String> {
        for _ in 0..self.config.key_attempts.max(1) {
            let key = random_alphanumeric(self.config.key_length);
            if !accounts::invitation_key_in_use(self.store.as_ref(), &key).await? {
                return Ok(key);
            }
            tracing::warn!("Generated invitation key already in use, drawing another");
        }
        Err(StoreError::Conflict("no unused invitation key found".to_string()))
    }
}
