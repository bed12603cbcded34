//! Workflow tests against the in-memory backends
//!
//! These cover the invitation-quota rules end to end: account provisioning,
//! edge recording, quota consumption, and the racing-signup guarantee.

use super::*;
use crate::backend::{AuthError, AuthProvider, DocumentStore, MemoryAuth, MemoryStore};
use crate::models::{AccountRecord, FederatedProvider, Identity, InvitationEdge, INVITATIONS, USERS};
use std::sync::Arc;

struct Harness {
    auth: Arc<MemoryAuth>,
    store: Arc<MemoryStore>,
    controller: SignupController,
}

fn harness_with(config: SignupConfig) -> Harness {
    let auth = Arc::new(MemoryAuth::new());
    let store = Arc::new(MemoryStore::new());
    let controller = SignupController::new(auth.clone(), store.clone(), config);
    Harness { auth, store, controller }
}

fn harness() -> Harness {
    harness_with(SignupConfig::default())
}

async fn seed_account(store: &MemoryStore, uid: &str, key: &str, quota: i64) {
    let record = AccountRecord::new(Some(uid.to_string()), None, quota, key.to_string());
    accounts::create_account(store, uid, &record).await.unwrap();
}

async fn quota_of(store: &MemoryStore, uid: &str) -> i64 {
    accounts::get_account(store, uid).await.unwrap().unwrap().invitation
}

fn edges(store: &MemoryStore) -> Vec<InvitationEdge> {
    store
        .documents(INVITATIONS)
        .iter()
        .map(|doc| doc.parse().unwrap())
        .collect()
}

fn form(email: &str, token: &str) -> SignupForm {
    SignupForm {
        email: email.to_string(),
        password: "password1".to_string(),
        token: Some(token.to_string()),
    }
}

// ==================== Submit path ====================

#[tokio::test]
async fn test_submit_consumes_one_invitation() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 2).await;

    let provisioned = h.controller.submit(&form("a@x.com", "abc123")).await.unwrap();

    // New account: quota 3 and a fresh key
    let created = accounts::get_account(&*h.store, &provisioned.uid).await.unwrap().unwrap();
    assert_eq!(created.invitation, 3);
    assert_eq!(created.invitation_key.len(), 20);
    assert_ne!(created.invitation_key, "abc123");
    assert!(created.timestamp.is_some());

    // Edge from the inviter, inviter quota decremented exactly once
    let edges = edges(&h.store);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from, "U1");
    assert_eq!(edges[0].to, provisioned.uid);
    assert!(edges[0].timestamp.is_some());
    assert_eq!(quota_of(&h.store, "U1").await, 1);

    assert_eq!(provisioned.referrals.len(), 1);
    assert_eq!(provisioned.referrals[0].outcome, ReferralOutcome::Consumed { remaining: 1 });
}

#[tokio::test]
async fn test_submit_with_unknown_token_still_creates_account() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 2).await;

    let result = h.controller.submit(&form("a@x.com", "nope")).await;
    assert_eq!(result, Err(SignupError::InvalidToken));

    let uid = h.auth.current_user().unwrap().uid;
    let created = accounts::get_account(&*h.store, &uid).await.unwrap().unwrap();
    assert_eq!(created.invitation, 3);
    assert!(edges(&h.store).is_empty());
    assert_eq!(quota_of(&h.store, "U1").await, 2);
}

#[tokio::test]
async fn test_submit_with_exhausted_inviter_keeps_quota_at_zero() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 0).await;

    let result = h.controller.submit(&form("a@x.com", "abc123")).await;
    assert_eq!(result, Err(SignupError::ReferrerQuotaExceeded));

    assert_eq!(quota_of(&h.store, "U1").await, 0);
    // Edge is still written before the quota check
    assert_eq!(edges(&h.store).len(), 1);
}

#[tokio::test]
async fn test_exhausted_inviter_without_edge_when_configured() {
    let h = harness_with(SignupConfig {
        record_edge_on_exhausted_quota: false,
        ..SignupConfig::default()
    });
    seed_account(&h.store, "U1", "abc123", 0).await;
    seed_account(&h.store, "U2", "def456", 1).await;

    let result = h.controller.submit(&form("a@x.com", "abc123")).await;
    assert_eq!(result, Err(SignupError::ReferrerQuotaExceeded));
    assert!(edges(&h.store).is_empty());

    // A successful decrement still records the edge
    h.controller.submit(&form("b@x.com", "def456")).await.unwrap();
    let edges = edges(&h.store);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from, "U2");
}

#[tokio::test]
async fn test_shared_token_evaluates_each_inviter() {
    let h = harness();
    seed_account(&h.store, "U1", "dup", 2).await;
    seed_account(&h.store, "U3", "dup", 0).await;

    let result = h.controller.submit(&form("a@x.com", "dup")).await;
    assert_eq!(result, Err(SignupError::ReferrerQuotaExceeded));

    assert_eq!(edges(&h.store).len(), 2);
    assert_eq!(quota_of(&h.store, "U1").await, 1);
    assert_eq!(quota_of(&h.store, "U3").await, 0);
}

#[tokio::test]
async fn test_shared_token_with_quota_left_everywhere_succeeds() {
    let h = harness();
    seed_account(&h.store, "U1", "dup", 2).await;
    seed_account(&h.store, "U3", "dup", 1).await;

    let provisioned = h.controller.submit(&form("a@x.com", "dup")).await.unwrap();

    assert_eq!(provisioned.referrals.len(), 2);
    assert_eq!(quota_of(&h.store, "U1").await, 1);
    assert_eq!(quota_of(&h.store, "U3").await, 0);
}

#[tokio::test]
async fn test_racing_signups_on_last_invitation() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 1).await;

    let first = form("a@x.com", "abc123");
    let second = form("b@x.com", "abc123");
    let (a, b) = tokio::join!(h.controller.submit(&first), h.controller.submit(&second));

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| **r == Err(SignupError::ReferrerQuotaExceeded))
            .count(),
        1
    );
    assert_eq!(quota_of(&h.store, "U1").await, 0);
}

#[tokio::test]
async fn test_submit_without_token_makes_no_calls() {
    let h = harness();

    let mut missing = form("a@x.com", "");
    assert_eq!(h.controller.submit(&missing).await, Err(SignupError::InvitationTokenMissing));
    missing.token = None;
    assert_eq!(h.controller.submit(&missing).await, Err(SignupError::InvitationTokenMissing));

    assert!(h.auth.current_user().is_none());
    assert!(h.store.documents(USERS).is_empty());
}

#[tokio::test]
async fn test_auth_failures_map_to_generic_message() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 3).await;

    let mut weak = form("a@x.com", "abc123");
    weak.password = "short".to_string();
    assert_eq!(h.controller.submit(&weak).await, Err(SignupError::AuthenticationFailed));

    h.controller.submit(&form("a@x.com", "abc123")).await.unwrap();
    assert_eq!(
        h.controller.submit(&form("a@x.com", "abc123")).await,
        Err(SignupError::AuthenticationFailed)
    );
    assert_eq!(quota_of(&h.store, "U1").await, 2);
}

#[tokio::test]
async fn test_account_write_failure_is_surfaced() {
    let h = harness();
    h.store.fail_collection(USERS);

    let result = h.controller.submit(&form("a@x.com", "abc123")).await;
    assert_eq!(result, Err(SignupError::AccountRegistrationFailed));
    assert!(edges(&h.store).is_empty());
}

#[tokio::test]
async fn test_edge_write_failure_is_log_only() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 2).await;
    h.store.fail_collection(INVITATIONS);

    let provisioned = h.controller.submit(&form("a@x.com", "abc123")).await.unwrap();

    assert_eq!(provisioned.referrals[0].edge, None);
    assert_eq!(quota_of(&h.store, "U1").await, 1);
}

// ==================== Redirect path ====================

#[tokio::test]
async fn test_redirect_without_pending_login_writes_nothing() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 2).await;

    let outcome = h.controller.complete_redirect(Some("abc123")).await.unwrap();

    assert_eq!(outcome, RedirectOutcome::NoPendingLogin);
    assert_eq!(h.store.documents(USERS).len(), 1);
    assert!(edges(&h.store).is_empty());
}

#[tokio::test]
async fn test_redirect_without_url_token_writes_nothing() {
    let h = harness();
    h.auth.stage_redirect_result(Identity::with_email("gh-1", "gh@x.com"));

    let result = h.controller.complete_redirect(None).await;

    assert_eq!(result, Err(SignupError::TokenMissing));
    assert!(h.store.documents(USERS).is_empty());
}

#[tokio::test]
async fn test_redirect_provisions_through_the_shared_routine() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 2).await;
    h.auth.stage_redirect_result(Identity {
        uid: "gh-1".to_string(),
        email: None,
        display_name: Some("Octo Cat".to_string()),
        photo_url: Some("https://avatars.example/1.png".to_string()),
    });

    let outcome = h.controller.complete_redirect(Some("abc123")).await.unwrap();

    let RedirectOutcome::Provisioned(provisioned) = outcome else {
        panic!("expected a provisioned account, got {:?}", outcome);
    };
    assert_eq!(provisioned.uid, "gh-1");
    let created = accounts::get_account(&*h.store, "gh-1").await.unwrap().unwrap();
    assert_eq!(created.name.as_deref(), Some("Octo Cat"));
    assert_eq!(created.image.as_deref(), Some("https://avatars.example/1.png"));
    assert_eq!(created.invitation, 3);

    let edges = edges(&h.store);
    assert_eq!(edges.len(), 1);
    assert!(edges[0].timestamp.is_some());
    assert_eq!(quota_of(&h.store, "U1").await, 1);
}

#[tokio::test]
async fn test_redirect_for_existing_account_leaves_it_untouched() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 2).await;
    seed_account(&h.store, "gh-1", "mine", 1).await;
    h.auth.stage_redirect_result(Identity::with_email("gh-1", "gh@x.com"));

    let outcome = h.controller.complete_redirect(Some("abc123")).await.unwrap();

    assert!(matches!(outcome, RedirectOutcome::ExistingAccount(_)));
    assert_eq!(quota_of(&h.store, "gh-1").await, 1);
    assert_eq!(quota_of(&h.store, "U1").await, 2);
    assert!(edges(&h.store).is_empty());
}

#[tokio::test]
async fn test_redirect_checks_token_before_existing_account() {
    let h = harness();
    seed_account(&h.store, "gh-1", "mine", 1).await;
    h.auth.stage_redirect_result(Identity::with_email("gh-1", "gh@x.com"));

    let result = h.controller.complete_redirect(None).await;

    assert_eq!(result, Err(SignupError::TokenMissing));
    assert_eq!(quota_of(&h.store, "gh-1").await, 1);
    assert!(edges(&h.store).is_empty());
}

#[tokio::test]
async fn test_redirect_provider_failure_is_log_only() {
    let h = harness();
    h.auth.fail_next_redirect(AuthError::Other("popup closed".to_string()));

    let outcome = h.controller.complete_redirect(Some("abc123")).await.unwrap();
    assert_eq!(outcome, RedirectOutcome::ProviderFailed);
}

// ==================== Federated login / logout ====================

#[tokio::test]
async fn test_provider_errors_reach_subscribers() {
    use futures::StreamExt;

    let h = harness();
    let mut events = h.controller.subscribe();
    let mut state = SignupState::default();

    let initial = events.next().await.unwrap();
    assert_eq!(state.on_auth_snapshot(initial), None);

    h.auth.report_error(AuthError::Other("quota service down".to_string()));
    let failed = events.next().await.unwrap();
    assert_eq!(state.on_auth_snapshot(failed), None);
    assert_eq!(state.error(), Some(&SignupError::ProviderUnavailable));
}

#[tokio::test]
async fn test_federated_login_uses_configured_provider() {
    let h = harness();
    h.controller.begin_federated_login().await.unwrap();
    assert_eq!(h.auth.federated_requests(), vec![FederatedProvider::Github]);
}

#[tokio::test]
async fn test_logout_signs_out() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 2).await;
    h.controller.submit(&form("a@x.com", "abc123")).await.unwrap();
    assert!(h.auth.current_user().is_some());

    h.controller.logout().await.unwrap();
    assert!(h.auth.current_user().is_none());
}

#[tokio::test]
async fn test_generated_keys_are_unique_across_signups() {
    let h = harness();
    seed_account(&h.store, "U1", "abc123", 3).await;

    let mut keys = Vec::new();
    for email in ["a@x.com", "b@x.com", "c@x.com"] {
        let provisioned = h.controller.submit(&form(email, "abc123")).await.unwrap();
        keys.push(provisioned.account.invitation_key);
    }
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 3);

    let store: &dyn DocumentStore = &*h.store;
    assert_eq!(accounts::find_by_invitation_key(store, "abc123").await.unwrap().len(), 1);
    assert_eq!(quota_of(&h.store, "U1").await, 0);
}
