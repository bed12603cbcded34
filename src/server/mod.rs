//! Server-side code for the signup backend
//!
//! This module contains all backend functionality:
//! - Database access (PostgreSQL via sqlx)
//! - Authentication (JWT, bcrypt, GitHub OAuth)
//! - Document routes backing the signup workflow

pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod oauth;

use axum::{
    http::{Method, StatusCode},
    routing::{get, post},
    Json,
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::AppConfig;

use crate::models::ErrorBody;

/// Handler rejection: status plus a JSON message
pub type Rejection = (StatusCode, Json<ErrorBody>);

pub fn reject(status: StatusCode, message: &str) -> Rejection {
    (status, Json(ErrorBody { message: message.to_string() }))
}

/// Application state shared across all routes
pub struct AppState {
    pub db: PgPool,
    pub store: db::PgStore,
    pub config: AppConfig,
    pub oauth: oauth::OAuthSessions,
    /// Outbound client for the OAuth provider
    pub http: reqwest::Client,
}

/// Create the Axum router with all API routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(health_check))

        // Auth routes
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/redirect-result", post(auth::redirect_result))
        .route("/api/auth/oauth/github/start", get(oauth::github_start))
        .route("/api/auth/oauth/github/callback", get(oauth::github_callback))

        // Document routes
        .route("/api/documents/{collection}", post(documents::add_document))
        .route("/api/documents/{collection}/query", post(documents::query_documents))
        .route(
            "/api/documents/{collection}/{id}",
            get(documents::get_document)
                .put(documents::set_document)
                .patch(documents::update_document),
        )
        .route("/api/documents/{collection}/{id}/decrement", post(documents::decrement_field))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// Health check
async fn health_check() -> &'static str {
    "OK"
}

pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    // Initialize database
    let pool = db::init_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    if config.github.is_none() {
        tracing::info!("GitHub login not configured; federated signup disabled");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let port = config.port;
    let state = AppState {
        store: db::PgStore::new(pool.clone()),
        db: pool,
        config,
        oauth: oauth::OAuthSessions::default(),
        http,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
