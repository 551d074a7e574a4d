use crate::errors::AppError;
use crate::models::{RegisterRequest, ReplyMode};

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Runtime settings of the terminal console, read from the environment
/// (after `.env`, when present).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub token: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Set to create the account when the credentials are unknown.
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub mode: ReplyMode,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mode = match get("AGENTIC_CHAT_MODE") {
            Some(raw) => raw
                .parse::<ReplyMode>()
                .map_err(|_| AppError::config("AGENTIC_CHAT_MODE", raw.trim()))?,
            None => ReplyMode::default(),
        };

        Ok(Self {
            api_url: get("AGENTIC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token: get("AGENTIC_TOKEN"),
            email: get("AGENTIC_EMAIL"),
            password: get("AGENTIC_PASSWORD"),
            username: get("AGENTIC_USERNAME"),
            full_name: get("AGENTIC_FULL_NAME"),
            mode,
        })
    }

    pub fn login_credentials(&self) -> Option<(&str, &str)> {
        Some((self.email.as_deref()?, self.password.as_deref()?))
    }

    /// Account to create when signing in with the configured credentials
    /// is rejected. Needs a username on top of the login credentials.
    pub fn registration(&self) -> Option<RegisterRequest> {
        let (email, password) = self.login_credentials()?;
        Some(RegisterRequest {
            email: email.to_string(),
            username: self.username.clone()?,
            password: password.to_string(),
            full_name: self.full_name.clone(),
        })
    }
}
