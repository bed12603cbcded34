use dioxus::prelude::*;
use futures::StreamExt;
use std::rc::Rc;

use crate::backend::Backend;
use crate::components::common::{Card, ErrorMessage};
use crate::routes::Route;
use crate::signup::{Effect, SignupConfig, SignupController, SignupState};
use crate::state::{clear_notification, show_notification, NotificationType};

/// Carry out a transition's side effect
fn apply_effect(effect: Option<Effect>, landing_route: &str) {
    let Some(Effect::NavigateToLanding { notice }) = effect else {
        return;
    };
    if let Some(notice) = notice {
        show_notification(&notice, NotificationType::Error);
    }
    match landing_route.parse::<Route>() {
        Ok(route) => {
            navigator().replace(route);
        }
        Err(e) => tracing::error!(landing_route, "Landing route does not resolve: {}", e),
    }
}

#[component]
pub fn SignupPage(token: String) -> Element {
    let backend = use_context::<Backend>();
    let controller = use_hook(|| {
        Rc::new(SignupController::new(
            backend.auth.clone(),
            backend.store.clone(),
            SignupConfig::default(),
        ))
    });
    // Token comes from the URL; a pending redirect login is resolved before anything else
    let mut state = use_signal(|| {
        let mut initial = SignupState::default();
        initial.capture_token(Some(token.clone()));
        initial.begin_redirect_resolution();
        initial
    });

    {
        let controller = controller.clone();
        use_hook(move || {
            let url_token = state.peek().token.clone();

            spawn(async move {
                let result = controller.complete_redirect(url_token.as_deref()).await;
                let effect = state.write().finish_redirect(result);
                apply_effect(effect, &controller.config().landing_route);
            });
        });
    }

    // Follow the signed-in user
    {
        let controller = controller.clone();
        use_future(move || {
            let controller = controller.clone();
            async move {
                let mut events = controller.subscribe();
                while let Some(snapshot) = events.next().await {
                    let effect = state.write().on_auth_snapshot(snapshot);
                    apply_effect(effect, &controller.config().landing_route);
                }
            }
        });
    }

    let submit = {
        let controller = controller.clone();
        move |e: FormEvent| {
            e.prevent_default();
            let Some(form) = state.write().begin_submit() else {
                return;
            };
            let controller = controller.clone();
            spawn(async move {
                let result = controller.submit(&form).await;
                let effect = state.write().finish_submit(result);
                apply_effect(effect, &controller.config().landing_route);
            });
        }
    };

    let federated = {
        let controller = controller.clone();
        move |_| {
            let controller = controller.clone();
            let provider = controller.config().federated_provider;
            show_notification(&format!("Redirecting to {}...", provider), NotificationType::Info);
            spawn(async move {
                if let Err(e) = controller.begin_federated_login().await {
                    clear_notification();
                    state.write().fail(e);
                }
            });
        }
    };

    let provider = controller.config().federated_provider;
    let current = state.read();
    let busy = current.is_busy();
    let sending = current.is_sending();
    let error = current.error_message();
    let token_value = current.token.clone().unwrap_or_default();

    rsx! {
        div { class: "min-h-screen flex items-center justify-center bg-gray-100",
            Card { class: "w-full max-w-md",
                div { class: "text-center mb-8",
                    span { class: "text-5xl", "\u{2709}" }
                    h1 { class: "text-2xl font-bold mt-4", "Join by invitation" }
                    p { class: "text-gray-500", "Sign up with the token you were given" }
                }

                if let Some(err) = error {
                    ErrorMessage { message: err }
                }

                form {
                    onsubmit: submit,

                    div { class: "mb-4",
                        label { class: "block text-sm font-medium text-gray-700 mb-1", "Email" }
                        input {
                            class: "w-full px-4 py-3 border border-gray-300 rounded-lg focus:outline-none focus:ring-2 focus:ring-blue-500",
                            r#type: "email",
                            placeholder: "your.email@example.com",
                            value: "{current.email}",
                            disabled: busy,
                            oninput: move |e| state.write().set_email(e.value()),
                        }
                    }

                    div { class: "mb-4",
                        label { class: "block text-sm font-medium text-gray-700 mb-1", "Password" }
                        input {
                            class: "w-full px-4 py-3 border border-gray-300 rounded-lg focus:outline-none focus:ring-2 focus:ring-blue-500",
                            r#type: "password",
                            placeholder: "At least 8 characters",
                            value: "{current.password}",
                            disabled: busy,
                            oninput: move |e| state.write().set_password(e.value()),
                        }
                    }

                    div { class: "mb-6",
                        label { class: "block text-sm font-medium text-gray-700 mb-1", "Invitation token" }
                        input {
                            class: "w-full px-4 py-3 border border-gray-300 rounded-lg font-mono focus:outline-none focus:ring-2 focus:ring-blue-500",
                            r#type: "text",
                            placeholder: "Paste your invitation token",
                            value: "{token_value}",
                            disabled: busy,
                            oninput: move |e| state.write().set_token(e.value()),
                        }
                    }

                    button {
                        class: "w-full py-3 bg-blue-600 text-white rounded-lg hover:bg-blue-700 font-medium disabled:opacity-50",
                        r#type: "submit",
                        disabled: busy,
                        if sending { "Creating account..." } else { "Sign Up" }
                    }
                }

                div { class: "my-6 flex items-center gap-3 text-sm text-gray-400",
                    div { class: "flex-1 border-t" }
                    "or"
                    div { class: "flex-1 border-t" }
                }

                button {
                    class: "w-full py-3 bg-gray-800 text-white rounded-lg hover:bg-gray-900 font-medium disabled:opacity-50",
                    r#type: "button",
                    disabled: busy,
                    onclick: federated,
                    "Sign up with {provider}"
                }
            }
        }
    }
}
