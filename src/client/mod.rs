//! Boundary to the remote orchestrator API.

#[cfg(not(target_arch = "wasm32"))]
mod http;

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpApi;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::errors::AppError;
use crate::models::{
    ChatHistory, ChatReply, ChatRequest, ClearHistoryResponse, LoginRequest, RegisterRequest,
    Token, User, UserStats,
};

/// Body of a streamed chat reply, chunked however the network delivered it.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, AppError>>;

/// Calls the chat and auth endpoints of the orchestrator. Implementations
/// attach the session's bearer credential to every request.
#[async_trait]
pub trait OrchestratorApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<Token, AppError>;

    async fn register(&self, request: &RegisterRequest) -> Result<User, AppError>;

    async fn current_user(&self) -> Result<User, AppError>;

    async fn user_stats(&self) -> Result<UserStats, AppError>;

    async fn logout(&self) -> Result<(), AppError>;

    /// Single-shot chat: the whole reply in one response.
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, AppError>;

    /// Opens the streaming chat endpoint. Resolves once a success status has
    /// been received; the returned stream yields the raw body.
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, AppError>;

    async fn chat_history(&self) -> Result<ChatHistory, AppError>;

    async fn clear_chat_history(&self) -> Result<ClearHistoryResponse, AppError>;
}
