use thiserror::Error;

/// Top-level client error. Every variant carries enough text to be shown to
/// the user or logged as-is.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("Network error: {message}")]
    Transport { message: String },

    #[error("Server error: {status}")]
    Status { status: u16 },

    #[error("{detail}")]
    Api { status: u16, detail: String },

    #[error("Session expired or credentials rejected")]
    Unauthorized,

    // ── Boundary errors ──────────────────────────────────────────────────────
    #[error("Parse error: {message}")]
    Decode { message: String },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("Invalid setting {key}: {value}")]
    Config { key: String, value: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn transport(message: impl Into<String>) -> Self {
        AppError::Transport { message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        AppError::Decode { message: message.into() }
    }

    pub fn config(key: impl Into<String>, value: impl Into<String>) -> Self {
        AppError::Config { key: key.into(), value: value.into() }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Unauthorized)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::EmptyField { .. })
    }

    /// Errors that mean the remote side never produced a usable answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::Transport { .. }
                | AppError::Status { .. }
                | AppError::Api { .. }
                | AppError::Unauthorized
        )
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AppError::decode(e.to_string())
        } else if let Some(status) = e.status() {
            AppError::Status { status: status.as_u16() }
        } else {
            AppError::transport(e.to_string())
        }
    }
}
