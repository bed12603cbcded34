use dioxus::prelude::*;

use crate::components::{LandingPage, SignupPage};

#[derive(Routable, Clone, PartialEq, Debug)]
#[rustfmt::skip]
pub enum Route {
    #[redirect("/", || Route::Signup { token: String::new() })]
    #[route("/signup?:token")]
    Signup { token: String },

    #[route("/mypage")]
    MyPage {},
}

// Route handler components
#[component]
fn Signup(token: String) -> Element {
    rsx! {
        SignupPage { token }
    }
}

#[component]
fn MyPage() -> Element {
    rsx! {
        LandingPage {}
    }
}
