use agentic_console::session::Session;
use web_sys::Storage;

const TOKEN_KEY: &str = "access_token";

fn local_storage() -> Option<Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

/// Session restored from the token kept in `localStorage`, if any.
pub fn restore_session() -> Session {
    match local_storage().and_then(|s| s.get_item(TOKEN_KEY).ok().flatten()) {
        Some(token) => Session::with_token(token),
        None => Session::new(),
    }
}

pub fn persist_token(token: &str) {
    if let Some(storage) = local_storage() {
        if storage.set_item(TOKEN_KEY, token).is_err() {
            log::warn!("Could not persist the access token");
        }
    }
}

pub fn forget_token() {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(TOKEN_KEY);
    }
}
