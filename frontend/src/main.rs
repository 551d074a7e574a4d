mod api;
mod components;
mod sse;
mod state;
mod storage;

use leptos::mount::mount_to_body;
use leptos::prelude::*;

use components::chat::ChatArea;
use components::login::LoginForm;
use components::sidebar::Sidebar;
use state::AppState;

/// Root application component.
#[component]
fn App() -> impl IntoView {
    let state = AppState::provide(storage::restore_session());
    let user = state.user;

    // Pick up a session persisted by an earlier visit
    state.restore();

    view! {
        {move || {
            if user.get().is_some() {
                view! {
                    <div class="app-container">
                        <Sidebar />
                        <ChatArea />
                    </div>
                }
                .into_any()
            } else {
                view! { <LoginForm /> }.into_any()
            }
        }}
    }
}

fn main() {
    console_log::init_with_level(log::Level::Debug).expect("Failed to init logger");
    mount_to_body(App);
}
