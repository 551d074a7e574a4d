use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use super::{ByteStream, OrchestratorApi};
use crate::errors::AppError;
use crate::models::{
    ApiErrorBody, ChatHistory, ChatReply, ChatRequest, ClearHistoryResponse, LoginRequest,
    RegisterRequest, Token, User, UserStats,
};
use crate::session::Session;

/// `reqwest` implementation of [`OrchestratorApi`].
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    session: Session,
}

impl HttpApi {
    pub fn new(base_url: &str, session: Session) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match self.session.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and turns every non-success status into an error.
    /// A 401 also ends the session.
    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        let resp = builder.send().await.map_err(|e| {
            warn!("Orchestrator unreachable at {}: {e}", self.base_url);
            AppError::from(e)
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.session.clear();
            return Err(AppError::Unauthorized);
        }

        let code = status.as_u16();
        match resp.json::<ApiErrorBody>().await {
            Ok(body) => Err(AppError::Api { status: code, detail: body.message() }),
            Err(_) => Err(AppError::Status { status: code }),
        }
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AppError> {
        let resp = self.dispatch(builder).await?;
        resp.json::<T>().await.map_err(|e| {
            error!("Unexpected response shape from orchestrator: {e}");
            AppError::decode(e.to_string())
        })
    }
}

#[async_trait]
impl OrchestratorApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<Token, AppError> {
        self.call(self.request(Method::POST, "/api/auth/login").json(request)).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, AppError> {
        self.call(self.request(Method::POST, "/api/auth/register").json(request)).await
    }

    async fn current_user(&self) -> Result<User, AppError> {
        self.call(self.request(Method::GET, "/api/auth/me")).await
    }

    async fn user_stats(&self) -> Result<UserStats, AppError> {
        self.call(self.request(Method::GET, "/api/auth/me/stats")).await
    }

    async fn logout(&self) -> Result<(), AppError> {
        self.dispatch(self.request(Method::POST, "/api/auth/logout")).await?;
        Ok(())
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, AppError> {
        self.call(self.request(Method::POST, "/api/chat/send").json(request)).await
    }

    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, AppError> {
        let builder = self
            .request(Method::POST, "/api/chat/stream")
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(request);
        let resp = self.dispatch(builder).await?;
        debug!("Chat stream opened ({})", resp.status());

        Ok(resp
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(|e| AppError::transport(e.to_string()))
            .boxed())
    }

    async fn chat_history(&self) -> Result<ChatHistory, AppError> {
        self.call(self.request(Method::GET, "/api/chat/history")).await
    }

    async fn clear_chat_history(&self) -> Result<ClearHistoryResponse, AppError> {
        self.call(self.request(Method::DELETE, "/api/chat/history")).await
    }
}
