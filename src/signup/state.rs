//! Signup page state machine
//!
//! One value holds everything the page renders. Async work is started from a
//! `begin_*` transition and reported back through the matching `finish_*`,
//! so results that settle late can never leave the page half-updated.

use super::controller::{Provisioned, RedirectOutcome, SignupForm};
use super::error::SignupError;
use crate::backend::AuthSnapshot;
use crate::models::Identity;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SignupPhase {
    #[default]
    Idle,
    AwaitingRedirectResolution,
    Submitting,
    Error(SignupError),
    Authenticated,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Replace the current history entry with the landing route.
    /// `notice` carries a user-visible error that would otherwise be lost.
    NavigateToLanding { notice: Option<String> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignupState {
    pub email: String,
    pub password: String,
    pub token: Option<String>,
    pub user: Option<Identity>,
    pub auth_loading: bool,
    pub phase: SignupPhase,
    /// Provider failure reported while a request was in flight, shown once it settles
    pending_provider_error: Option<SignupError>,
}

fn normalize_token(token: Option<String>) -> Option<String> {
    token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl SignupState {
    pub fn set_email(&mut self, email: String) {
        self.email = email;
    }

    pub fn set_password(&mut self, password: String) {
        self.password = password;
    }

    pub fn set_token(&mut self, token: String) {
        self.token = normalize_token(Some(token));
    }

    /// Take the token from the page URL; absent or empty clears it
    pub fn capture_token(&mut self, url_token: Option<String>) {
        self.token = normalize_token(url_token);
    }

    /// A form submission is in flight
    pub fn is_sending(&self) -> bool {
        self.phase == SignupPhase::Submitting
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            SignupPhase::Submitting | SignupPhase::AwaitingRedirectResolution
        )
    }

    pub fn error(&self) -> Option<&SignupError> {
        match &self.phase {
            SignupPhase::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    pub fn begin_redirect_resolution(&mut self) {
        if self.phase == SignupPhase::Idle {
            self.phase = SignupPhase::AwaitingRedirectResolution;
        }
    }

    pub fn finish_redirect(&mut self, result: Result<RedirectOutcome, SignupError>) -> Option<Effect> {
        if self.phase != SignupPhase::AwaitingRedirectResolution {
            return None;
        }
        self.settle(result.map(|_| ()))
    }

    /// Validate the form and go in flight; `None` means nothing should be sent
    pub fn begin_submit(&mut self) -> Option<SignupForm> {
        if self.is_busy() || self.phase == SignupPhase::Authenticated {
            return None;
        }
        let Some(token) = self.token.clone() else {
            self.phase = SignupPhase::Error(SignupError::InvitationTokenMissing);
            return None;
        };

        self.phase = SignupPhase::Submitting;
        Some(SignupForm {
            email: self.email.clone(),
            password: self.password.clone(),
            token: Some(token),
        })
    }

    pub fn finish_submit(&mut self, result: Result<Provisioned, SignupError>) -> Option<Effect> {
        if self.phase != SignupPhase::Submitting {
            return None;
        }
        self.settle(result.map(|_| ()))
    }

    /// Surface a failure from an operation that does not go in flight
    pub fn fail(&mut self, error: SignupError) {
        if !self.is_busy() && error.is_user_visible() {
            self.phase = SignupPhase::Error(error);
        }
    }

    pub fn on_auth_snapshot(&mut self, snapshot: AuthSnapshot) -> Option<Effect> {
        self.auth_loading = snapshot.loading;
        if let Some(error) = snapshot.error {
            tracing::error!(error = %error, "Authentication provider reported an error");
            if self.is_busy() {
                self.pending_provider_error = Some(SignupError::ProviderUnavailable);
            } else {
                self.fail(SignupError::ProviderUnavailable);
            }
        }
        self.user = snapshot.user;
        self.navigate_if_signed_in()
    }

    fn settle(&mut self, result: Result<(), SignupError>) -> Option<Effect> {
        self.phase = match result {
            Ok(()) => SignupPhase::Idle,
            Err(e) if e.is_user_visible() => SignupPhase::Error(e),
            Err(_) => SignupPhase::Idle,
        };
        // A more specific error from the request wins over the deferred provider error
        if let Some(pending) = self.pending_provider_error.take() {
            if self.phase == SignupPhase::Idle {
                self.phase = SignupPhase::Error(pending);
            }
        }
        self.navigate_if_signed_in()
    }

    /// Navigation waits until nothing is in flight so provisioning is never cut short
    fn navigate_if_signed_in(&mut self) -> Option<Effect> {
        if self.user.is_none() || self.is_busy() || self.phase == SignupPhase::Authenticated {
            return None;
        }
        let notice = self.error_message();
        self.phase = SignupPhase::Authenticated;
        Some(Effect::NavigateToLanding { notice })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> AuthSnapshot {
        AuthSnapshot::signed_in(Identity::with_email("u1", "a@x.com"))
    }

    #[test]
    fn test_capture_token_normalizes() {
        let mut state = SignupState::default();
        state.capture_token(Some("  abc123 ".into()));
        assert_eq!(state.token.as_deref(), Some("abc123"));

        state.capture_token(Some(String::new()));
        assert_eq!(state.token, None);

        state.set_token("xyz".into());
        assert_eq!(state.token.as_deref(), Some("xyz"));
        state.capture_token(None);
        assert_eq!(state.token, None);
    }

    #[test]
    fn test_submit_without_token_errors_without_going_in_flight() {
        let mut state = SignupState::default();
        state.set_email("a@x.com".into());

        assert!(state.begin_submit().is_none());
        assert!(!state.is_sending());
        assert_eq!(state.error(), Some(&SignupError::InvitationTokenMissing));
    }

    #[test]
    fn test_submit_goes_in_flight_once() {
        let mut state = SignupState::default();
        state.set_email("a@x.com".into());
        state.set_password("password1".into());
        state.set_token("abc123".into());

        let form = state.begin_submit().unwrap();
        assert_eq!(form.email, "a@x.com");
        assert_eq!(form.token.as_deref(), Some("abc123"));
        assert!(state.is_sending());

        // Second click while in flight is ignored
        assert!(state.begin_submit().is_none());
    }

    #[test]
    fn test_identity_change_while_submitting_defers_navigation() {
        let mut state = SignupState::default();
        state.set_token("abc123".into());
        state.begin_submit().unwrap();

        assert_eq!(state.on_auth_snapshot(signed_in()), None);
        assert!(state.is_sending());

        let effect = state.finish_submit(Err(SignupError::InvalidToken));
        assert_eq!(
            effect,
            Some(Effect::NavigateToLanding {
                notice: Some(SignupError::InvalidToken.to_string())
            })
        );
        assert_eq!(state.phase, SignupPhase::Authenticated);
    }

    #[test]
    fn test_identity_change_when_idle_navigates_once() {
        let mut state = SignupState::default();
        assert_eq!(
            state.on_auth_snapshot(signed_in()),
            Some(Effect::NavigateToLanding { notice: None })
        );
        assert_eq!(state.on_auth_snapshot(signed_in()), None);
    }

    #[test]
    fn test_signed_out_snapshot_does_not_navigate() {
        let mut state = SignupState::default();
        assert_eq!(state.on_auth_snapshot(AuthSnapshot::signed_out()), None);
        assert_eq!(state.phase, SignupPhase::Idle);
    }

    #[test]
    fn test_provider_error_surfaces_fixed_message() {
        let mut state = SignupState::default();
        let snapshot = AuthSnapshot::failed(crate::backend::AuthError::Other("503".into()));

        assert_eq!(state.on_auth_snapshot(snapshot), None);
        assert_eq!(state.error(), Some(&SignupError::ProviderUnavailable));
    }

    #[test]
    fn test_provider_error_during_submit_shows_after_settling() {
        let mut state = SignupState::default();
        state.set_token("abc123".into());
        state.begin_submit().unwrap();

        let snapshot = AuthSnapshot::failed(crate::backend::AuthError::Other("503".into()));
        assert_eq!(state.on_auth_snapshot(snapshot), None);
        assert!(state.is_sending());
        assert_eq!(state.error(), None);

        assert_eq!(state.finish_submit(Err(SignupError::Backend("query failed".into()))), None);
        assert_eq!(state.error(), Some(&SignupError::ProviderUnavailable));
    }

    #[test]
    fn test_request_error_takes_precedence_over_deferred_provider_error() {
        let mut state = SignupState::default();
        state.begin_redirect_resolution();

        let snapshot = AuthSnapshot::failed(crate::backend::AuthError::Other("503".into()));
        state.on_auth_snapshot(snapshot);
        state.finish_redirect(Err(SignupError::TokenMissing));
        assert_eq!(state.error(), Some(&SignupError::TokenMissing));

        // Consumed once; a later clean submit does not resurrect it
        state.set_token("abc123".into());
        state.begin_submit().unwrap();
        state.finish_submit(Err(SignupError::Backend("x".into())));
        assert_eq!(state.error(), None);
    }

    #[test]
    fn test_log_only_failure_returns_to_idle() {
        let mut state = SignupState::default();
        state.set_token("abc123".into());
        state.begin_submit().unwrap();

        assert_eq!(state.finish_submit(Err(SignupError::Backend("query failed".into()))), None);
        assert_eq!(state.phase, SignupPhase::Idle);
        assert_eq!(state.error_message(), None);
    }

    #[test]
    fn test_redirect_resolution_without_login_returns_to_idle() {
        let mut state = SignupState::default();
        state.begin_redirect_resolution();
        assert!(state.is_busy());

        assert_eq!(state.finish_redirect(Ok(RedirectOutcome::NoPendingLogin)), None);
        assert_eq!(state.phase, SignupPhase::Idle);
    }

    #[test]
    fn test_stale_finish_is_ignored() {
        let mut state = SignupState::default();
        assert_eq!(state.finish_submit(Err(SignupError::InvalidToken)), None);
        assert_eq!(state.phase, SignupPhase::Idle);
    }
}
