//! Invite Signup - Full Stack Dioxus Application
//!
//! Invitation-only signup: new users join with a token handed out by an
//! existing member, either with email/password or through a GitHub login.
//!
//! Runs in fullstack mode with Axum backend and Dioxus frontend.

mod api;
mod backend;
mod components;
mod models;
mod routes;
mod signup;
mod state;

#[cfg(not(target_arch = "wasm32"))]
mod server;

use dioxus::prelude::*;
use backend::Backend;
use components::common::Notification;
use models::AccountRecord;
use routes::Route;

/// Invitation token seeded into the in-memory demo backend
const DEMO_TOKEN: &str = "WELCOME-DEMO";

fn main() {
    // On wasm, just run the app
    #[cfg(target_arch = "wasm32")]
    {
        run_app();
    }

    // On native, handle server vs app mode
    #[cfg(not(target_arch = "wasm32"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("invite_signup=info")))
            .init();

        // Load environment variables
        dotenvy::dotenv().ok();

        let args: Vec<String> = std::env::args().collect();

        if args.contains(&"--server".to_string()) {
            // Run server only
            if let Err(e) = block_on_server() {
                tracing::error!("Server error: {:#}", e);
                std::process::exit(1);
            }
        } else {
            if !demo_mode() {
                // Desktop mode with embedded server
                std::thread::spawn(|| {
                    if let Err(e) = block_on_server() {
                        tracing::error!("Embedded server error: {:#}", e);
                    }
                });

                // Give server time to start
                std::thread::sleep(std::time::Duration::from_millis(500));
            }

            run_app();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn block_on_server() -> anyhow::Result<()> {
    let config = server::AppConfig::from_env()?;
    tracing::info!("Starting signup server on port {}", config.port);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(server::run_server(config))
}

fn run_app() {
    dioxus::launch(App);
}

#[cfg(not(target_arch = "wasm32"))]
fn demo_mode() -> bool {
    std::env::var("SIGNUP_DEMO").is_ok()
}

#[cfg(target_arch = "wasm32")]
fn demo_mode() -> bool {
    false
}

/// API base URL and the `auth_result` code handed back by a federated redirect
#[cfg(target_arch = "wasm32")]
fn backend_address() -> (String, Option<String>) {
    // On web, use the same origin as the page (for same-origin API requests)
    let location = web_sys::window().map(|w| w.location());
    let api_url = location
        .as_ref()
        .and_then(|l| l.origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let redirect_code = location
        .and_then(|l| l.href().ok())
        .and_then(|href| api::query_param(&href, api::REDIRECT_RESULT_PARAM));
    (api_url, redirect_code)
}

#[cfg(not(target_arch = "wasm32"))]
fn backend_address() -> (String, Option<String>) {
    let api_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    (api_url, None)
}

#[cfg(target_arch = "wasm32")]
fn request_timeout() -> std::time::Duration {
    api::DEFAULT_REQUEST_TIMEOUT
}

#[cfg(not(target_arch = "wasm32"))]
fn request_timeout() -> std::time::Duration {
    parse_timeout(std::env::var("API_TIMEOUT_SECS").ok().as_deref())
}

/// Seconds from `API_TIMEOUT_SECS`; absent, zero or malformed values keep the default
#[cfg(not(target_arch = "wasm32"))]
fn parse_timeout(value: Option<&str>) -> std::time::Duration {
    let Some(raw) = value else {
        return api::DEFAULT_REQUEST_TIMEOUT;
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => std::time::Duration::from_secs(secs),
        _ => {
            tracing::warn!(value = raw, "Ignoring invalid API_TIMEOUT_SECS");
            api::DEFAULT_REQUEST_TIMEOUT
        }
    }
}

/// In-memory backend with one inviter holding [`DEMO_TOKEN`]
fn demo_backend() -> Backend {
    let backend = Backend::in_memory();
    let inviter = AccountRecord::new(
        Some("Demo inviter".to_string()),
        None,
        signup::SignupConfig::default().initial_invitations,
        DEMO_TOKEN.to_string(),
    );
    let seeded = futures::executor::block_on(signup::accounts::create_account(
        backend.store.as_ref(),
        "demo-inviter",
        &inviter,
    ));
    match seeded {
        Ok(()) => tracing::info!("Demo mode: sign up with invitation token {}", DEMO_TOKEN),
        Err(e) => tracing::warn!("Could not seed the demo inviter: {}", e),
    }
    backend
}

fn connect_backend() -> Backend {
    if demo_mode() {
        return demo_backend();
    }

    let (api_url, redirect_code) = backend_address();
    match Backend::rest(&api_url, redirect_code, request_timeout()) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("Could not create API client for {}: {}; using the demo backend", api_url, e);
            demo_backend()
        }
    }
}

#[component]
fn App() -> Element {
    use_context_provider(connect_backend);

    rsx! {
        // Global styles
        style { {include_str!("../assets/styles.css")} }

        // Notification toast
        Notification {}

        Router::<Route> {}
    }
}
