pub mod common;
pub mod mypage;
pub mod signup;

pub use mypage::LandingPage;
pub use signup::SignupPage;
