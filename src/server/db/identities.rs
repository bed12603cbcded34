//! Identity database operations

use sqlx::PgPool;
use crate::models::Identity;

/// Provider name stored for email/password identities
pub const PASSWORD_PROVIDER: &str = "password";

#[derive(Debug, sqlx::FromRow)]
pub struct IdentityRow {
    pub uid: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl IdentityRow {
    pub fn to_identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

pub async fn get_password_identity_by_email(pool: &PgPool, email: &str) -> Result<Option<IdentityRow>, sqlx::Error> {
    sqlx::query_as::<_, IdentityRow>(
        r#"
        SELECT uid, email, password_hash, display_name, photo_url
        FROM identities
        WHERE provider = 'password' AND LOWER(email) = LOWER($1)
        "#
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn create_password_identity(
    pool: &PgPool,
    uid: &str,
    email: &str,
    password_hash: &str,
) -> Result<IdentityRow, sqlx::Error> {
    sqlx::query_as::<_, IdentityRow>(
        r#"
        INSERT INTO identities (uid, email, password_hash, provider, provider_subject)
        VALUES ($1, $2, $3, $4, $2)
        RETURNING uid, email, password_hash, display_name, photo_url
        "#
    )
    .bind(uid)
    .bind(email)
    .bind(password_hash)
    .bind(PASSWORD_PROVIDER)
    .fetch_one(pool)
    .await
}

/// Profile reported by a federated provider
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub provider: String,
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Insert the identity on first login; later logins refresh the profile and keep the uid
pub async fn upsert_federated_identity(
    pool: &PgPool,
    uid: &str,
    profile: &FederatedProfile,
) -> Result<IdentityRow, sqlx::Error> {
    sqlx::query_as::<_, IdentityRow>(
        r#"
        INSERT INTO identities (uid, email, display_name, photo_url, provider, provider_subject)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (provider, provider_subject) DO UPDATE
        SET email = EXCLUDED.email,
            display_name = EXCLUDED.display_name,
            photo_url = EXCLUDED.photo_url
        RETURNING uid, email, password_hash, display_name, photo_url
        "#
    )
    .bind(uid)
    .bind(&profile.email)
    .bind(&profile.display_name)
    .bind(&profile.photo_url)
    .bind(&profile.provider)
    .bind(&profile.subject)
    .fetch_one(pool)
    .await
}
