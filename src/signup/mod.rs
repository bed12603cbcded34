//! Invitation-only signup workflow
//!
//! - `controller`: sequenced async operations over the injected backends
//! - `state`: the page state machine driven by those operations
//! - `accounts`: typed access to account and invitation records

pub mod accounts;
pub mod config;
pub mod controller;
pub mod error;
pub mod state;

#[cfg(test)]
mod tests;

pub use config::SignupConfig;
pub use controller::*;
pub use error::SignupError;
pub use state::{Effect, SignupState};
