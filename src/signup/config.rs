//! Signup workflow configuration

use crate::models::FederatedProvider;

/// Workflow constants
#[derive(Debug, Clone, PartialEq)]
pub struct SignupConfig {
    /// Invitations granted to a freshly provisioned account
    pub initial_invitations: i64,

    /// Length of generated invitation keys
    pub key_length: usize,

    /// Attempts at drawing an invitation key no other account holds
    pub key_attempts: usize,

    /// Route shown once the user is authenticated
    pub landing_route: String,

    /// Provider used by the "sign up with ..." button
    pub federated_provider: FederatedProvider,

    /// Write the invitation edge even when the inviter's quota is exhausted.
    /// When false the edge is written only after a successful decrement.
    pub record_edge_on_exhausted_quota: bool,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            initial_invitations: 3,
            key_length: 20,
            key_attempts: 5,
            landing_route: "/mypage".to_string(),
            federated_provider: FederatedProvider::Github,
            record_edge_on_exhausted_quota: true,
        }
    }
}
