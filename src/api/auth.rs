//! REST authentication provider

use reqwest::Url;
use std::sync::{Mutex, PoisonError, RwLock};

use crate::api::{ApiClient, ApiError};
use crate::backend::{AuthBroadcast, AuthError, AuthEvents, AuthProvider, AuthSnapshot};
use crate::models::{FederatedProvider, Identity, RedirectResultRequest, SessionResponse, SignupRequest};

/// Query parameter carrying the one-time code after a federated redirect
pub const REDIRECT_RESULT_PARAM: &str = "auth_result";

pub struct RestAuth {
    client: ApiClient,
    current: RwLock<Option<Identity>>,
    redirect_code: Mutex<Option<String>>,
    events: AuthBroadcast,
}

impl RestAuth {
    pub fn new(client: ApiClient, redirect_code: Option<String>) -> Self {
        RestAuth {
            client,
            current: RwLock::new(None),
            redirect_code: Mutex::new(redirect_code),
            events: AuthBroadcast::default(),
        }
    }

    fn start_session(&self, session: SessionResponse) -> Identity {
        self.client.set_token(Some(session.token));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(session.user.clone());
        self.events.publish(AuthSnapshot::signed_in(session.user.clone()));
        session.user
    }
}

fn signup_error(err: ApiError) -> AuthError {
    match err {
        ApiError::Conflict(_) => AuthError::DuplicateEmail,
        ApiError::Unprocessable(_) => AuthError::WeakPassword,
        other => AuthError::Other(other.to_string()),
    }
}

/// Value of a query parameter in `href`
#[cfg(any(target_arch = "wasm32", test))]
pub fn query_param(href: &str, name: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// `href` with every occurrence of the query parameter `name` removed
pub fn without_query_param(href: &str, name: &str) -> Option<String> {
    let mut url = Url::parse(href).ok()?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some(url.to_string())
}

/// Backend URL that starts the provider's login and comes back to `return_to`
pub fn federated_start_url(base_url: &str, provider: FederatedProvider, return_to: &str) -> Result<Url, AuthError> {
    let return_to = without_query_param(return_to, REDIRECT_RESULT_PARAM)
        .ok_or_else(|| AuthError::Other(format!("invalid return address: {}", return_to)))?;
    Url::parse_with_params(
        &format!("{}/api/auth/oauth/{}/start", base_url, provider),
        &[("return_to", return_to)],
    )
    .map_err(|e| AuthError::Other(e.to_string()))
}

#[cfg(target_arch = "wasm32")]
fn current_href() -> Result<String, AuthError> {
    web_sys::window()
        .ok_or_else(|| AuthError::Unsupported("no browser window".to_string()))?
        .location()
        .href()
        .map_err(|_| AuthError::Other("cannot read page address".to_string()))
}

#[cfg(not(target_arch = "wasm32"))]
fn current_href() -> Result<String, AuthError> {
    Err(AuthError::Unsupported("redirect login needs a browser".to_string()))
}

#[cfg(target_arch = "wasm32")]
fn navigate_to(url: &str) -> Result<(), AuthError> {
    web_sys::window()
        .ok_or_else(|| AuthError::Unsupported("no browser window".to_string()))?
        .location()
        .set_href(url)
        .map_err(|_| AuthError::Other("redirect blocked".to_string()))
}

#[cfg(not(target_arch = "wasm32"))]
fn navigate_to(_url: &str) -> Result<(), AuthError> {
    Err(AuthError::Unsupported("redirect login needs a browser".to_string()))
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl AuthProvider for RestAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let request = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let session: SessionResponse = self
            .client
            .post("/api/auth/signup", &request)
            .await
            .map_err(signup_error)?;

        Ok(self.start_session(session))
    }

    async fn begin_federated_login(&self, provider: FederatedProvider) -> Result<(), AuthError> {
        let here = current_href()?;
        let target = federated_start_url(self.client.base_url(), provider, &here)?;
        tracing::info!(%provider, "Redirecting to federated login");
        navigate_to(target.as_str())
    }

    async fn resolve_redirect_result(&self) -> Result<Option<Identity>, AuthError> {
        let code = self
            .redirect_code
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(code) = code else {
            return Ok(None);
        };

        let result = self
            .client
            .post::<SessionResponse, _>("/api/auth/redirect-result", &RedirectResultRequest { code })
            .await;

        match result {
            Ok(session) => Ok(Some(self.start_session(session))),
            // Already redeemed or expired: the page was reloaded after the login finished
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => {
                let error = AuthError::Other(e.to_string());
                self.events.publish(AuthSnapshot::failed(error.clone()));
                Err(error)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.client.set_token(None);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.events.publish(AuthSnapshot::signed_out());
        Ok(())
    }

    fn current_user(&self) -> Option<Identity> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn subscribe(&self) -> AuthEvents {
        let current = match self.current_user() {
            Some(user) => AuthSnapshot::signed_in(user),
            None => AuthSnapshot::signed_out(),
        };
        self.events.subscribe(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        let href = "http://localhost:8080/signup?token=abc123&auth_result=xyz";
        assert_eq!(query_param(href, "token").as_deref(), Some("abc123"));
        assert_eq!(query_param(href, REDIRECT_RESULT_PARAM).as_deref(), Some("xyz"));
        assert_eq!(query_param(href, "missing"), None);
        assert_eq!(query_param("not a url", "token"), None);
    }

    #[test]
    fn test_without_query_param() {
        let href = "http://localhost:8080/signup?token=abc123&auth_result=xyz";
        assert_eq!(
            without_query_param(href, REDIRECT_RESULT_PARAM).as_deref(),
            Some("http://localhost:8080/signup?token=abc123")
        );
        assert_eq!(
            without_query_param("http://localhost:8080/signup?auth_result=xyz", REDIRECT_RESULT_PARAM).as_deref(),
            Some("http://localhost:8080/signup")
        );
    }

    #[test]
    fn test_federated_start_url_keeps_token_in_return_address() {
        let url = federated_start_url(
            "http://localhost:3000",
            FederatedProvider::Github,
            "http://localhost:8080/signup?token=abc123&auth_result=old",
        )
        .unwrap();

        assert_eq!(url.path(), "/api/auth/oauth/github/start");
        assert_eq!(
            query_param(url.as_str(), "return_to").as_deref(),
            Some("http://localhost:8080/signup?token=abc123")
        );
    }

    #[test]
    fn test_signup_errors_map_to_auth_errors() {
        assert_eq!(signup_error(ApiError::Conflict(String::new())), AuthError::DuplicateEmail);
        assert_eq!(signup_error(ApiError::Unprocessable(String::new())), AuthError::WeakPassword);
        assert!(matches!(signup_error(ApiError::Network("down".into())), AuthError::Other(_)));
    }

    #[tokio::test]
    async fn test_resolve_without_code_makes_no_request() {
        // Nothing listens on this port; a request would fail
        let client = ApiClient::new("http://127.0.0.1:9", crate::api::DEFAULT_REQUEST_TIMEOUT).unwrap();
        let auth = RestAuth::new(client, None);
        assert_eq!(auth.resolve_redirect_result().await, Ok(None));
    }

    #[tokio::test]
    async fn test_federated_login_needs_a_browser_on_native() {
        let client = ApiClient::new("http://127.0.0.1:9", crate::api::DEFAULT_REQUEST_TIMEOUT).unwrap();
        let auth = RestAuth::new(client, None);
        assert!(matches!(
            auth.begin_federated_login(FederatedProvider::Github).await,
            Err(AuthError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let client = ApiClient::new("http://127.0.0.1:9", crate::api::DEFAULT_REQUEST_TIMEOUT).unwrap();
        client.set_token(Some("jwt".to_string()));
        let auth = RestAuth::new(client.clone(), None);

        auth.sign_out().await.unwrap();
        assert_eq!(client.get_token(), None);
        assert_eq!(auth.current_user(), None);
    }
}
