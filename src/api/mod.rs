pub mod client;
pub mod auth;
pub mod documents;

pub use client::*;
pub use auth::RestAuth;
#[cfg(target_arch = "wasm32")]
pub use auth::query_param;
pub use auth::REDIRECT_RESULT_PARAM;
pub use documents::RestStore;
