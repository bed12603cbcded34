//! GitHub OAuth login
//!
//! `start` sends the browser to GitHub with a random `state`. The callback
//! exchanges the code, upserts the identity, and bounces the browser back to
//! the page that started the login with a one-time `auth_result` code. The
//! page trades that code for a session through `/api/auth/redirect-result`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::api::REDIRECT_RESULT_PARAM;
use crate::backend::random_alphanumeric;
use crate::models::{FederatedProvider, Identity};
use crate::server::db::identities::{self, FederatedProfile};
use crate::server::{reject, AppState, Rejection};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";

/// How long a started login may take to come back from GitHub
const LOGIN_TTL: Duration = Duration::from_secs(10 * 60);
/// How long the page has to redeem its `auth_result` code
const RESULT_TTL: Duration = Duration::from_secs(5 * 60);

struct PendingLogin {
    return_to: Url,
    started: Instant,
}

struct IssuedResult {
    identity: Identity,
    issued: Instant,
}

/// In-flight federated logins and unredeemed results
#[derive(Default)]
pub struct OAuthSessions {
    pending: Mutex<HashMap<String, PendingLogin>>,
    results: Mutex<HashMap<String, IssuedResult>>,
}

impl OAuthSessions {
    /// Remember where to send the browser back to; returns the `state` value
    fn begin(&self, return_to: Url) -> String {
        let state = random_alphanumeric(32);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|_, login| login.started.elapsed() < LOGIN_TTL);
        pending.insert(state.clone(), PendingLogin { return_to, started: Instant::now() });
        state
    }

    fn finish(&self, state: &str) -> Option<Url> {
        let login = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state)?;
        (login.started.elapsed() < LOGIN_TTL).then_some(login.return_to)
    }

    /// Issue a one-time code for `identity`
    fn issue(&self, identity: Identity) -> String {
        let code = random_alphanumeric(32);
        let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        results.retain(|_, result| result.issued.elapsed() < RESULT_TTL);
        results.insert(code.clone(), IssuedResult { identity, issued: Instant::now() });
        code
    }

    /// Consume a code; a second redemption finds nothing
    pub fn redeem(&self, code: &str) -> Option<Identity> {
        let result = self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(code)?;
        (result.issued.elapsed() < RESULT_TTL).then_some(result.identity)
    }
}

/// Only send codes back to the frontend's own origin
fn allowed_return_to(return_to: &str, app_url: &str) -> Option<Url> {
    let target = Url::parse(return_to).ok()?;
    let app = Url::parse(app_url).ok()?;
    (target.origin() == app.origin()).then_some(target)
}

fn callback_url(public_url: &str) -> String {
    format!("{}/api/auth/oauth/{}/callback", public_url, FederatedProvider::Github)
}

#[derive(Debug, Deserialize)]
pub struct StartParams {
    pub return_to: String,
}

pub async fn github_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StartParams>,
) -> Result<Redirect, Rejection> {
    let github = state
        .config
        .github
        .as_ref()
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "GitHub login is not configured"))?;

    let return_to = allowed_return_to(&params.return_to, &state.config.app_url)
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "Invalid return address"))?;

    let oauth_state = state.oauth.begin(return_to);
    let authorize = Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", github.client_id.as_str()),
            ("redirect_uri", callback_url(&state.config.public_url).as_str()),
            ("scope", "read:user user:email"),
            ("state", oauth_state.as_str()),
        ],
    )
    .map_err(|_| reject(StatusCode::INTERNAL_SERVER_ERROR, "Invalid authorize URL"))?;

    Ok(Redirect::to(authorize.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl GithubUser {
    fn into_profile(self) -> FederatedProfile {
        FederatedProfile {
            provider: FederatedProvider::Github.to_string(),
            subject: self.id.to_string(),
            email: self.email,
            display_name: Some(self.name.unwrap_or(self.login)),
            photo_url: self.avatar_url,
        }
    }
}

async fn fetch_github_user(state: &AppState, code: &str) -> Result<GithubUser, Rejection> {
    let github = state
        .config
        .github
        .as_ref()
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "GitHub login is not configured"))?;

    let token: AccessTokenResponse = state
        .http
        .post(TOKEN_URL)
        .header("Accept", "application/json")
        .json(&serde_json::json!({
            "client_id": github.client_id,
            "client_secret": github.client_secret,
            "code": code,
            "redirect_uri": callback_url(&state.config.public_url),
        }))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            tracing::error!("GitHub token exchange failed: {}", e);
            reject(StatusCode::BAD_GATEWAY, "GitHub token exchange failed")
        })?
        .json()
        .await
        .map_err(|_| reject(StatusCode::BAD_GATEWAY, "Invalid GitHub token response"))?;

    let access_token = token.access_token.ok_or_else(|| {
        tracing::warn!("GitHub refused the code: {:?}", token.error_description);
        reject(StatusCode::BAD_REQUEST, "GitHub refused the login")
    })?;

    state
        .http
        .get(USER_URL)
        .bearer_auth(access_token)
        .header("User-Agent", "invite-signup")
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            tracing::error!("GitHub user lookup failed: {}", e);
            reject(StatusCode::BAD_GATEWAY, "GitHub user lookup failed")
        })?
        .json()
        .await
        .map_err(|_| reject(StatusCode::BAD_GATEWAY, "Invalid GitHub user response"))
}

pub async fn github_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, Rejection> {
    let mut return_to = state
        .oauth
        .finish(&params.state)
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "Unknown or expired login"))?;

    let profile = fetch_github_user(&state, &params.code).await?.into_profile();

    let uid = uuid::Uuid::new_v4().simple().to_string();
    let row = identities::upsert_federated_identity(&state.db, &uid, &profile)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store federated identity: {}", e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store identity")
        })?;
    tracing::info!(uid = %row.uid, provider = %profile.provider, "Federated login completed");

    let code = state.oauth.issue(row.to_identity());
    return_to.query_pairs_mut().append_pair(REDIRECT_RESULT_PARAM, &code);
    Ok(Redirect::to(return_to.as_str()))
}
