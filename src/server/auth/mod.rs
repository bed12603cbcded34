//! Authentication module with JWT

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use bcrypt::{hash, DEFAULT_COST};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{ErrorBody, Identity, RedirectResultRequest, SessionResponse, SignupRequest, MIN_PASSWORD_LEN};
use crate::server::{db, reject, AppState, Rejection};

const SESSION_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,     // identity uid
    pub email: Option<String>,
    pub exp: usize,      // expiration timestamp
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Create a JWT token for an identity
pub fn create_token(identity: &Identity, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(SESSION_HOURS)).timestamp() as usize;

    let claims = Claims {
        sub: identity.uid.clone(),
        email: identity.email.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate a JWT token and extract claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// JWT Auth extractor - extracts Claims from Authorization header
impl FromRequestParts<Arc<AppState>> for Claims {
    type Rejection = (StatusCode, Json<ErrorBody>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Missing authorization header"))?;

        validate_token(bearer.token(), &state.config.jwt_secret)
            .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid token"))
    }
}

/// Check a signup request before touching the database
pub fn validate_signup(req: &SignupRequest) -> Result<(), Rejection> {
    let email = req.email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(reject(StatusCode::UNPROCESSABLE_ENTITY, "Invalid email address"));
    };
    if local.is_empty() || domain.is_empty() {
        return Err(reject(StatusCode::UNPROCESSABLE_ENTITY, "Invalid email address"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

pub(crate) fn session_for(identity: Identity, secret: &str) -> Result<SessionResponse, Rejection> {
    let token = create_token(&identity, secret).map_err(|e| {
        tracing::error!("Token generation failed: {}", e);
        reject(StatusCode::INTERNAL_SERVER_ERROR, "Token generation error")
    })?;
    Ok(SessionResponse { token, user: identity })
}

/// Email/password signup handler
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<SessionResponse>, Rejection> {
    validate_signup(&req)?;
    let email = req.email.trim();

    let existing = db::identities::get_password_identity_by_email(&state.db, email)
        .await
        .map_err(|e| {
            tracing::error!("Identity lookup failed: {}", e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        })?;
    if existing.is_some() {
        return Err(reject(StatusCode::CONFLICT, "Email already registered"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|_| reject(StatusCode::INTERNAL_SERVER_ERROR, "Password hashing error"))?;

    let uid = uuid::Uuid::new_v4().simple().to_string();
    let row = db::identities::create_password_identity(&state.db, &uid, email, &password_hash)
        .await
        .map_err(|e| match &e {
            // Lost a race with a concurrent signup for the same email
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                reject(StatusCode::CONFLICT, "Email already registered")
            }
            _ => {
                tracing::error!("Failed to create identity: {}", e);
                reject(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user")
            }
        })?;

    tracing::info!(uid = %row.uid, "Created password identity");
    session_for(row.to_identity(), &state.config.jwt_secret).map(Json)
}

/// Exchange the one-time code from a federated redirect for a session
pub async fn redirect_result(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RedirectResultRequest>,
) -> Result<Json<SessionResponse>, Rejection> {
    let identity = state
        .oauth
        .redeem(&req.code)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Unknown or expired login result"))?;

    session_for(identity, &state.config.jwt_secret).map(Json)
}
