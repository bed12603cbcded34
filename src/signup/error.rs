use thiserror::Error;

/// How a failed workflow step is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Shown to the user
    User,
    /// Logged, the UI returns to idle
    LogOnly,
}

/// Terminal failure of a signup workflow operation.
///
/// `Display` is the message shown to the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignupError {
    /// Federated login came back without an invitation token in the URL
    #[error("The invitation token is missing.")]
    TokenMissing,

    /// Form submitted with an empty token field
    #[error("Please enter your invitation token.")]
    InvitationTokenMissing,

    #[error("Authentication failed. Check that this address is not already registered and that the password has at least 8 characters.")]
    AuthenticationFailed,

    /// Provider returned an identity without an email address
    #[error("Authentication failed. Check that this address is not already registered and that the password has at least 8 characters.")]
    InvalidUser,

    #[error("This invitation token is not valid.")]
    InvalidToken,

    #[error("Your inviter has no invitations left.")]
    ReferrerQuotaExceeded,

    #[error("Registering your account failed. Please try again.")]
    AccountRegistrationFailed,

    #[error("The authentication service is having trouble. Please try again shortly.")]
    ProviderUnavailable,

    #[error("Could not start the sign-in redirect.")]
    FederatedLogin,

    #[error("Backend error: {0}")]
    Backend(String),
}

impl SignupError {
    pub fn severity(&self) -> Severity {
        match self {
            SignupError::Backend(_) => Severity::LogOnly,
            _ => Severity::User,
        }
    }

    pub fn is_user_visible(&self) -> bool {
        self.severity() == Severity::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_are_log_only() {
        assert_eq!(SignupError::Backend("x".into()).severity(), Severity::LogOnly);
        assert!(SignupError::InvalidToken.is_user_visible());
        assert!(SignupError::ReferrerQuotaExceeded.is_user_visible());
    }

    #[test]
    fn test_invalid_user_shares_generic_message() {
        assert_eq!(
            SignupError::InvalidUser.to_string(),
            SignupError::AuthenticationFailed.to_string()
        );
    }
}
