use leptos::prelude::*;

use agentic_console::models::ReplyMode;

use crate::state::AppState;

/// Sidebar with the signed-in user, reply mode toggle, and history actions.
#[component]
pub fn Sidebar() -> impl IntoView {
    let state = expect_context::<AppState>();
    let user = state.user;
    let mode = state.mode;
    let set_mode = state.set_mode;

    let on_clear = {
        let state = state.clone();
        move |_| state.clear_history()
    };
    let on_reload = {
        let state = state.clone();
        move |_| state.load_history()
    };
    let on_logout = move |_| state.logout();

    view! {
        <aside class="sidebar">
            <div class="sidebar-header">
                <h2>"AgenticAI"</h2>
                <div class="user-name">
                    {move || user.get().map(|u| u.display_name().to_string()).unwrap_or_default()}
                </div>
            </div>
            <label class="mode-toggle">
                <input
                    type="checkbox"
                    prop:checked=move || mode.get() == ReplyMode::Streaming
                    on:change=move |ev| {
                        let streaming = event_target_checked(&ev);
                        set_mode.set(if streaming { ReplyMode::Streaming } else { ReplyMode::SingleShot });
                    }
                />
                "Réponses en continu"
            </label>
            <button class="sidebar-btn" on:click=on_reload>"Recharger l'historique"</button>
            <button class="sidebar-btn" on:click=on_clear>"Effacer l'historique"</button>
            <button class="sidebar-btn logout" on:click=on_logout>"Déconnexion"</button>
        </aside>
    }
}
