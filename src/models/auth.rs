use serde::{Deserialize, Serialize};

/// Shortest password accepted at signup
pub const MIN_PASSWORD_LEN: usize = 8;

/// Identity returned by the authentication provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
}

impl Identity {
    pub fn with_email(uid: &str, email: &str) -> Self {
        Identity {
            uid: uid.to_string(),
            email: Some(email.to_string()),
            display_name: None,
            photo_url: None,
        }
    }
}

/// Federated identity providers reachable through a redirect login
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FederatedProvider {
    #[default]
    Github,
}

impl FederatedProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            FederatedProvider::Github => "github",
        }
    }
}

impl std::fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectResultRequest {
    pub code: String,
}

/// Error body returned by the backend on rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
