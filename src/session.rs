use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::models::{Token, User};

/// Credentials held while the user is signed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub user: Option<User>,
}

/// Explicit authentication context handed to whatever issues requests.
///
/// Set on login, cleared on logout or when the server answers 401. Clones
/// share the same state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<Option<Credentials>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that starts signed in with an existing token.
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.establish_token(token);
        session
    }

    pub fn establish(&self, token: &Token) {
        self.establish_token(token.access_token.clone());
    }

    pub fn establish_token(&self, token: impl Into<String>) {
        *self.write() = Some(Credentials { token: token.into(), user: None });
        debug!("Session established");
    }

    /// Attaches the profile of the signed-in user. Ignored when signed out.
    pub fn set_user(&self, user: User) {
        if let Some(creds) = self.write().as_mut() {
            creds.user = Some(user);
        }
    }

    pub fn clear(&self) {
        if self.write().take().is_some() {
            info!("Session cleared");
        }
    }

    pub fn bearer(&self) -> Option<String> {
        self.read().as_ref().map(|c| c.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().and_then(|c| c.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Credentials>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Credentials>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_set_on_login_cleared_on_logout() {
        let session = Session::new();
        assert!(!session.is_authenticated());
        assert_eq!(session.bearer(), None);

        session.establish(&Token {
            access_token: "jwt-abc".into(),
            token_type: "bearer".into(),
            expires_in: 1800,
        });
        assert_eq!(session.bearer().as_deref(), Some("jwt-abc"));

        session.clear();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn clones_share_state() {
        let session = Session::with_token("t");
        let view = session.clone();
        session.clear();
        assert_eq!(view.bearer(), None);
    }

    #[test]
    fn user_is_not_attached_when_signed_out() {
        let session = Session::new();
        let user: User = serde_json::from_value(serde_json::json!({
            "id": "u1", "email": "a@b.fr", "username": "alice",
            "role": "user", "status": "active",
            "created_at": "2025-01-01T00:00:00", "updated_at": "2025-01-01T00:00:00",
            "max_agents": 50, "max_documents": 1000, "max_storage_mb": 5000
        }))
        .unwrap();
        session.set_user(user.clone());
        assert_eq!(session.user(), None);

        session.establish_token("t");
        session.set_user(user);
        assert_eq!(session.user().map(|u| u.username), Some("alice".to_string()));
    }
}
