use leptos::ev;
use leptos::prelude::*;

use agentic_console::models::{ChatMessage, MessageRole, MessageStatus};

use crate::state::AppState;

/// Main chat area with the conversation, including in-flight replies, and
/// the input.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let error = state.error;
    let conversation = state.conversation;

    view! {
        <main class="chat-area">
            // Error banner
            {move || {
                error.get().map(|err| {
                    view! {
                        <div class="error-banner">{err}</div>
                    }
                })
            }}

            <div class="chat-header">
                <h1>"Chat"</h1>
                <p>"Interagissez avec vos agents intelligents"</p>
            </div>

            // Messages
            <div class="messages-container">
                <For
                    each=move || conversation.get().messages().to_vec()
                    key=|m| (m.id.clone(), m.content.len(), m.status)
                    let:msg
                >
                    <MessageBubble message=msg />
                </For>
            </div>

            <ChatInput />
        </main>
    }
}

/// A single chat message bubble. An empty streaming placeholder renders as a
/// typing indicator.
#[component]
fn MessageBubble(message: ChatMessage) -> impl IntoView {
    let css_class = match (message.role, message.status) {
        (MessageRole::User, _) => "message user",
        (_, MessageStatus::Failed) => "message assistant failed",
        (_, MessageStatus::Streaming) => "message assistant streaming-cursor",
        _ => "message assistant",
    };
    let time = message.timestamp.format("%H:%M").to_string();
    let typing = message.is_streaming() && message.content.is_empty();

    view! {
        <div class=css_class>
            <div class="role-label">{message.role.as_str()}</div>
            {if typing {
                view! { <div class="typing"><span></span><span></span><span></span></div> }.into_any()
            } else {
                view! { <div class="content">{message.content}</div> }.into_any()
            }}
            <div class="timestamp">{time}</div>
        </div>
    }
}

/// Chat input form with textarea and send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (input, set_input) = signal(String::new());

    let is_sending = {
        let state = state.clone();
        move || state.is_streaming()
    };

    let send = {
        let is_sending = is_sending.clone();
        move || {
            let text = input.get().trim().to_string();
            if text.is_empty() || is_sending() {
                return;
            }
            set_input.set(String::new());
            state.send_message(text);
        }
    };

    let send_clone = send.clone();
    let on_keydown = move |ev: ev::KeyboardEvent| {
        if ev.key() == "Enter" && !ev.shift_key() {
            ev.prevent_default();
            send_clone();
        }
    };

    let on_submit = move |_| {
        send();
    };

    let button_disabled = {
        let is_sending = is_sending.clone();
        move || is_sending() || input.get().trim().is_empty()
    };
    let button_label = {
        let is_sending = is_sending.clone();
        move || if is_sending() { "Envoi…" } else { "Envoyer" }
    };

    view! {
        <div class="input-area">
            <div class="input-row">
                <textarea
                    rows="1"
                    placeholder="Tapez votre message… (Entrée pour envoyer, Maj+Entrée pour un saut de ligne)"
                    prop:value=input
                    on:input=move |ev| {
                        set_input.set(event_target_value(&ev));
                    }
                    on:keydown=on_keydown
                    disabled=is_sending
                />
                <button
                    class="send-btn"
                    on:click=on_submit
                    disabled=button_disabled
                >
                    {button_label}
                </button>
            </div>
        </div>
    }
}
