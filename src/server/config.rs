//! Server configuration from environment variables
//!
//! - DATABASE_URL: PostgreSQL connection string (required)
//! - PORT: listen port, defaults to 3000
//! - JWT_SECRET: session token signing key
//! - PUBLIC_URL: externally reachable base URL of this server, used for OAuth callbacks
//! - APP_URL: origin of the frontend; federated logins only return there (defaults to PUBLIC_URL)
//! - GITHUB_CLIENT_ID / GITHUB_CLIENT_SECRET: enable GitHub login when both are set

use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEV_JWT_SECRET: &str = "invite-signup-dev-secret";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub public_url: String,
    pub app_url: String,
    pub github: Option<GithubConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let port = match var("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let public_url = var("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        reqwest::Url::parse(&public_url).map_err(|_| ConfigError::Invalid {
            name: "PUBLIC_URL",
            value: public_url.clone(),
        })?;

        let app_url = var("APP_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| public_url.clone());
        reqwest::Url::parse(&app_url).map_err(|_| ConfigError::Invalid {
            name: "APP_URL",
            value: app_url.clone(),
        })?;

        let github = match (var("GITHUB_CLIENT_ID"), var("GITHUB_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GithubConfig { client_id, client_secret }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("GITHUB_CLIENT_SECRET")),
            (None, Some(_)) => return Err(ConfigError::Missing("GITHUB_CLIENT_ID")),
        };

        Ok(AppConfig {
            database_url,
            port,
            jwt_secret,
            public_url,
            app_url,
            github,
        })
    }
}
