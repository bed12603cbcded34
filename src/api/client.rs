use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Access denied")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Rejected: {0}")]
    Unprocessable(String),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Invalid response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// HTTP client for the signup backend, carrying the session token once signed in
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: String,
    client: Client,
    token: RwLock<Option<String>>,
}

/// Native request timeout unless `API_TIMEOUT_SECS` says otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl ApiClient {
    /// `timeout` bounds every native request so a hung backend resolves to an error
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // On wasm, we can't use timeout
        #[cfg(target_arch = "wasm32")]
        let client = {
            let _ = timeout;
            Client::new()
        };

        #[cfg(not(target_arch = "wasm32"))]
        let client = Client::builder().timeout(timeout).build()?;

        Ok(ApiClient {
            inner: Arc::new(ApiClientInner {
                base_url: base_url.trim_end_matches('/').to_string(),
                client,
                token: RwLock::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        let mut guard = self.inner.token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = token;
    }

    pub fn get_token(&self) -> Option<String> {
        self.inner.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        let mut request = self.inner.client.request(method, &url);

        if let Some(token) = self.get_token() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path).send().await?;
        self.handle_response(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        self.handle_response(response).await
    }

    pub async fn put_no_response<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let response = self.request(Method::PUT, path).json(body).send().await?;
        self.handle_empty_response(response).await
    }

    pub async fn patch_no_response<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let response = self.request(Method::PATCH, path).json(body).send().await?;
        self.handle_empty_response(response).await
    }

    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<(), ApiError> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
            _ => Err(Self::error_for(response).await),
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                response.json::<T>().await.map_err(|e| ApiError::Parse(e.to_string()))
            }
            _ => Err(Self::error_for(response).await),
        }
    }

    async fn error_for(response: reqwest::Response) -> ApiError {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::NOT_FOUND => ApiError::NotFound(response.text().await.unwrap_or_default()),
            StatusCode::CONFLICT => ApiError::Conflict(response.text().await.unwrap_or_default()),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                ApiError::Unprocessable(response.text().await.unwrap_or_default())
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                ApiError::Server(format!("{}: {}", status, text))
            }
        }
    }
}
