use agentic_console::errors::AppError;
use agentic_console::models::{
    ApiErrorBody, ChatHistory, ChatReply, ChatRequest, ClearHistoryResponse, LoginRequest,
    RegisterRequest, Token, User,
};
use agentic_console::session::Session;
use gloo_net::http::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// Base URL of the orchestrator API.
const API_BASE: &str = match option_env!("AGENTIC_API_URL") {
    Some(url) => url,
    None => "http://localhost:8000",
};

fn url(path: &str) -> String {
    format!("{API_BASE}{path}")
}

fn authorized(builder: RequestBuilder, session: &Session) -> RequestBuilder {
    match session.bearer() {
        Some(token) => builder.header("Authorization", &format!("Bearer {token}")),
        None => builder,
    }
}

/// Maps non-success statuses to errors; a 401 also ends the session.
async fn check(resp: Response, session: &Session) -> Result<Response, AppError> {
    if resp.ok() {
        return Ok(resp);
    }
    let status = resp.status();
    if status == 401 {
        session.clear();
        return Err(AppError::Unauthorized);
    }
    match resp.json::<ApiErrorBody>().await {
        Ok(body) => Err(AppError::Api { status, detail: body.message() }),
        Err(_) => Err(AppError::Status { status }),
    }
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, AppError> {
    resp.json::<T>().await.map_err(|e| AppError::decode(e.to_string()))
}

async fn send(builder: RequestBuilder, session: &Session) -> Result<Response, AppError> {
    let resp = authorized(builder, session)
        .send()
        .await
        .map_err(|e| AppError::transport(e.to_string()))?;
    check(resp, session).await
}

async fn send_json<B: serde::Serialize>(
    builder: RequestBuilder,
    body: &B,
    session: &Session,
) -> Result<Response, AppError> {
    let request = authorized(builder, session)
        .json(body)
        .map_err(|e| AppError::Unexpected(format!("Serialize error: {e}")))?;
    let resp = request.send().await.map_err(|e| AppError::transport(e.to_string()))?;
    check(resp, session).await
}

// ── Auth ──────────────────────────────────────────────────────────────────────

pub async fn login(request: &LoginRequest, session: &Session) -> Result<Token, AppError> {
    let builder = gloo_net::http::Request::post(&url("/api/auth/login"));
    parse(send_json(builder, request, session).await?).await
}

pub async fn register(request: &RegisterRequest, session: &Session) -> Result<User, AppError> {
    let builder = gloo_net::http::Request::post(&url("/api/auth/register"));
    parse(send_json(builder, request, session).await?).await
}

pub async fn current_user(session: &Session) -> Result<User, AppError> {
    parse(send(gloo_net::http::Request::get(&url("/api/auth/me")), session).await?).await
}

pub async fn logout(session: &Session) -> Result<(), AppError> {
    send(gloo_net::http::Request::post(&url("/api/auth/logout")), session).await?;
    Ok(())
}

// ── Chat ──────────────────────────────────────────────────────────────────────

/// Non-streaming chat call.
pub async fn send_chat(request: &ChatRequest, session: &Session) -> Result<ChatReply, AppError> {
    let builder = gloo_net::http::Request::post(&url("/api/chat/send"));
    parse(send_json(builder, request, session).await?).await
}

/// Opens the streaming chat endpoint and returns the response whose body
/// carries the `data: ` lines.
pub async fn open_chat_stream(
    request: &ChatRequest,
    session: &Session,
) -> Result<Response, AppError> {
    let builder = gloo_net::http::Request::post(&url("/api/chat/stream"))
        .header("Accept", "text/event-stream");
    send_json(builder, request, session).await
}

pub async fn chat_history(session: &Session) -> Result<ChatHistory, AppError> {
    parse(send(gloo_net::http::Request::get(&url("/api/chat/history")), session).await?).await
}

pub async fn clear_chat_history(session: &Session) -> Result<ClearHistoryResponse, AppError> {
    parse(send(gloo_net::http::Request::delete(&url("/api/chat/history")), session).await?).await
}
