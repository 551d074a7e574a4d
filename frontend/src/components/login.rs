use leptos::ev;
use leptos::prelude::*;

use agentic_console::models::RegisterRequest;

use crate::state::AppState;

/// Email/password form shown while no session is active. Switches to
/// account creation, which also asks for a username and an optional full
/// name.
#[component]
pub fn LoginForm() -> impl IntoView {
    let state = expect_context::<AppState>();
    let error = state.error;
    let (creating, set_creating) = signal(false);
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (username, set_username) = signal(String::new());
    let (full_name, set_full_name) = signal(String::new());

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        let email = email.get().trim().to_string();
        let password = password.get();
        if email.is_empty() || password.is_empty() {
            return;
        }
        if !creating.get_untracked() {
            state.login(email, password);
            return;
        }

        let username = username.get().trim().to_string();
        if username.is_empty() {
            return;
        }
        let full_name = full_name.get().trim().to_string();
        state.register(RegisterRequest {
            email,
            username,
            password,
            full_name: (!full_name.is_empty()).then_some(full_name),
        });
    };

    view! {
        <main class="login-page">
            <form class="login-card" on:submit=on_submit>
                <h1>"AgenticAI"</h1>
                {move || error.get().map(|err| view! { <div class="error-banner">{err}</div> })}
                <input
                    type="email"
                    placeholder="Email"
                    prop:value=email
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                />
                <Show when=move || creating.get()>
                    <input
                        type="text"
                        placeholder="Nom d'utilisateur"
                        prop:value=username
                        on:input=move |ev| set_username.set(event_target_value(&ev))
                    />
                    <input
                        type="text"
                        placeholder="Nom complet (optionnel)"
                        prop:value=full_name
                        on:input=move |ev| set_full_name.set(event_target_value(&ev))
                    />
                </Show>
                <input
                    type="password"
                    placeholder="Mot de passe"
                    prop:value=password
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                />
                <button type="submit" class="send-btn">
                    {move || if creating.get() { "Créer un compte" } else { "Se connecter" }}
                </button>
                <button
                    type="button"
                    class="link-btn"
                    on:click=move |_| set_creating.update(|c| *c = !*c)
                >
                    {move || {
                        if creating.get() { "J'ai déjà un compte" } else { "Créer un compte" }
                    }}
                </button>
            </form>
        </main>
    }
}
