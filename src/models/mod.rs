pub mod account;
pub mod auth;
pub mod document;

pub use account::*;
pub use auth::*;
pub use document::*;
