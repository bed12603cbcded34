use dioxus::prelude::*;
use std::rc::Rc;

use crate::backend::{Backend, StoreError};
use crate::components::common::{Card, ErrorMessage, LoadingSpinner};
use crate::models::AccountRecord;
use crate::routes::Route;
use crate::signup::{accounts, SignupConfig, SignupController};
use crate::state::{show_notification, NotificationType};

#[derive(Clone, PartialEq)]
struct Overview {
    account: Option<AccountRecord>,
    invited: usize,
}

/// Landing page for signed-in users: their quota and the link to hand out
#[component]
pub fn LandingPage() -> Element {
    let backend = use_context::<Backend>();
    let user = backend.auth.current_user();
    let controller = use_hook(|| {
        Rc::new(SignupController::new(
            backend.auth.clone(),
            backend.store.clone(),
            SignupConfig::default(),
        ))
    });

    let overview = {
        let store = backend.store.clone();
        let uid = user.as_ref().map(|u| u.uid.clone());
        use_resource(move || {
            let store = store.clone();
            let uid = uid.clone();
            async move {
                let Some(uid) = uid else {
                    return Ok(None);
                };
                let account = accounts::get_account(store.as_ref(), &uid).await?;
                let invited = accounts::list_invitations_by_inviter(store.as_ref(), &uid).await?.len();
                Ok::<_, StoreError>(Some(Overview { account, invited }))
            }
        })
    };

    let logout = move |_| {
        let controller = controller.clone();
        spawn(async move {
            match controller.logout().await {
                Ok(()) => {
                    show_notification("You have been signed out.", NotificationType::Success);
                    navigator().replace(Route::Signup { token: String::new() });
                }
                Err(e) => show_notification(&e.to_string(), NotificationType::Error),
            }
        });
    };

    let Some(user) = user else {
        return rsx! {
            div { class: "min-h-screen flex items-center justify-center bg-gray-100",
                Card { class: "w-full max-w-md text-center",
                    p { class: "text-gray-600 mb-4", "You are not signed in." }
                    Link {
                        class: "text-blue-600 hover:text-blue-700 font-medium",
                        to: Route::Signup { token: String::new() },
                        "Go to signup"
                    }
                }
            }
        };
    };

    let display_name = user
        .display_name
        .clone()
        .or_else(|| user.email.clone())
        .unwrap_or_else(|| "there".to_string());

    rsx! {
        div { class: "min-h-screen bg-gray-100",
            header { class: "bg-white border-b px-6 py-3 flex items-center justify-between",
                h1 { class: "text-xl font-bold text-gray-800", "My page" }
                div { class: "flex items-center gap-4",
                    span { class: "text-gray-600", "Welcome, {display_name}" }
                    button {
                        class: "px-4 py-2 text-gray-600 hover:bg-gray-100 rounded-lg",
                        onclick: logout,
                        "Logout"
                    }
                }
            }

            div { class: "max-w-2xl mx-auto p-6",
                match &*overview.read() {
                    None => rsx! { LoadingSpinner {} },
                    Some(Err(e)) => rsx! {
                        ErrorMessage { message: format!("Could not load your account: {}", e) }
                    },
                    Some(Ok(None)) | Some(Ok(Some(Overview { account: None, .. }))) => rsx! {
                        Card {
                            p { class: "text-gray-600", "Your account is still being set up." }
                        }
                    },
                    Some(Ok(Some(Overview { account: Some(account), invited }))) => rsx! {
                        AccountSummary { account: account.clone(), invited: *invited }
                    },
                }
            }
        }
    }
}

#[component]
fn AccountSummary(account: AccountRecord, invited: usize) -> Element {
    let invite_path = account.invite_path();

    rsx! {
        Card {
            div { class: "grid grid-cols-2 gap-6 mb-6",
                div {
                    p { class: "text-sm text-gray-500", "Invitations left" }
                    p { class: "text-3xl font-bold", "{account.invitation}" }
                }
                div {
                    p { class: "text-sm text-gray-500", "People you invited" }
                    p { class: "text-3xl font-bold", "{invited}" }
                }
            }

            div { class: "mb-4",
                p { class: "text-sm text-gray-500 mb-1", "Your invitation token" }
                p { class: "font-mono bg-gray-50 border rounded px-3 py-2 break-all", "{account.invitation_key}" }
            }

            if account.has_invitations_left() {
                div {
                    p { class: "text-sm text-gray-500 mb-1", "Invite link" }
                    p { class: "font-mono bg-gray-50 border rounded px-3 py-2 break-all", "{invite_path}" }
                }
            } else {
                p { class: "text-sm text-gray-500", "You have used all of your invitations." }
            }
        }
    }
}
