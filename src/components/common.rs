use dioxus::prelude::*;
use crate::state::UI_STATE;

const NOTIFICATION_MILLIS: u32 = 6000;

#[component]
pub fn LoadingSpinner() -> Element {
    rsx! {
        div { class: "flex items-center justify-center p-4",
            div { class: "animate-spin rounded-full h-8 w-8 border-b-2 border-blue-600" }
        }
    }
}

#[component]
pub fn ErrorMessage(message: String) -> Element {
    rsx! {
        div { class: "bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded mb-4",
            p { "{message}" }
        }
    }
}

#[component]
pub fn Card(children: Element, #[props(default = "".to_string())] class: String) -> Element {
    rsx! {
        div { class: "bg-white rounded-lg shadow-lg p-8 {class}",
            {children}
        }
    }
}

#[component]
pub fn Notification() -> Element {
    let notification = UI_STATE.read().notification.clone();

    // Auto-dismiss
    {
        let has_notification = notification.is_some();
        use_effect(move || {
            if has_notification {
                spawn(async move {
                    #[cfg(target_arch = "wasm32")]
                    {
                        gloo_timers::future::TimeoutFuture::new(NOTIFICATION_MILLIS).await;
                    }
                    #[cfg(not(target_arch = "wasm32"))]
                    {
                        tokio::time::sleep(std::time::Duration::from_millis(NOTIFICATION_MILLIS as u64)).await;
                    }
                    crate::state::clear_notification();
                });
            }
        });
    }

    if let Some(notif) = notification {
        let color_class = notif.notification_type.color_class();
        let icon = notif.notification_type.icon();
        rsx! {
            div {
                class: "fixed top-4 right-4 z-50 {color_class} text-white px-6 py-4 rounded-lg shadow-xl max-w-sm animate-slide-in",
                div { class: "flex items-start gap-3",
                    span { class: "text-xl flex-shrink-0", "{icon}" }
                    div { class: "flex-1",
                        p { class: "font-medium", "{notif.message}" }
                    }
                    button {
                        class: "ml-2 text-white hover:text-gray-200 flex-shrink-0",
                        onclick: move |_| {
                            crate::state::clear_notification();
                        },
                        "\u{2715}"
                    }
                }
            }
        }
    } else {
        rsx! {}
    }
}
