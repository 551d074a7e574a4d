use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;

/// Greeting shown at the top of an empty conversation.
pub const GREETING: &str =
    "Bonjour ! Je suis votre assistant AgenticAI. Comment puis-je vous aider aujourd'hui ?";

// ── Chat messages ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a message's content. Only `Streaming` messages accept
/// content updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Streaming,
    #[default]
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "server_time")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            agent_id: None,
            status: MessageStatus::Complete,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Empty assistant message that a streamed reply is written into.
    pub fn placeholder() -> Self {
        Self {
            status: MessageStatus::Streaming,
            ..Self::new(MessageRole::Assistant, String::new())
        }
    }

    /// Assistant message built from a single-shot reply, stamped with the
    /// server's time when it can be read.
    pub fn from_reply(reply: &ChatReply) -> Self {
        Self {
            timestamp: server_time::parse(&reply.timestamp).unwrap_or_else(Utc::now),
            agent_id: reply.agent_used.clone(),
            ..Self::new(MessageRole::Assistant, reply.message.clone())
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

// ── Chat endpoints ────────────────────────────────────────────────────────────

/// Body of both `/api/chat/send` and `/api/chat/stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), context: Map::new() }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Full reply of the non-streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub trace_id: String,
    #[serde(default)]
    pub agent_used: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    pub status: String,
    pub user_id: String,
}

/// Which endpoint an outgoing message goes through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyMode {
    #[default]
    Streaming,
    SingleShot,
}

impl std::str::FromStr for ReplyMode {
    type Err = AppError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" | "streaming" => Ok(ReplyMode::Streaming),
            "send" | "single" | "single-shot" => Ok(ReplyMode::SingleShot),
            other => Err(AppError::config("chat mode", other)),
        }
    }
}

// ── Auth endpoints ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(with = "server_time")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "server_time")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "server_time::option")]
    pub last_login: Option<DateTime<Utc>>,
    pub max_agents: u32,
    pub max_documents: u32,
    pub max_storage_mb: u32,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    #[serde(default)]
    pub agents_count: u32,
    #[serde(default)]
    pub documents_count: u32,
    #[serde(default)]
    pub storage_used_mb: f64,
    #[serde(default)]
    pub total_queries: u64,
    #[serde(default, with = "server_time::option")]
    pub last_activity: Option<DateTime<Utc>>,
}

// ── Error payload ─────────────────────────────────────────────────────────────

/// `{"detail": ...}` body the orchestrator returns on failure. Validation
/// failures carry a list instead of a string.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub detail: Value,
}

impl ApiErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Server timestamps arrive either as RFC 3339 or as naive ISO 8601 in UTC.
pub mod server_time {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => s.serialize_some(&dt.to_rfc3339()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp: {raw}"))
                }),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn reply_with_naive_server_timestamp_is_parsed_as_utc() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"message":"Salut","trace_id":"t-1","agent_used":"ollama.qwen2.5","timestamp":"2025-03-04T10:20:30.123456"}"#,
        )
        .unwrap();
        let msg = ChatMessage::from_reply(&reply);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.content, "Salut");
        assert_eq!(msg.timestamp.hour(), 10);
        assert_eq!(msg.agent_id.as_deref(), Some("ollama.qwen2.5"));
        assert_eq!(msg.status, MessageStatus::Complete);
    }

    #[test]
    fn history_messages_default_to_complete() {
        let history: ChatHistory = serde_json::from_str(
            r#"{"messages":[{"id":"1","role":"user","content":"hi","timestamp":"2025-01-01T00:00:00Z"}],"user_id":"u1"}"#,
        )
        .unwrap();
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].status, MessageStatus::Complete);
        assert_eq!(history.messages[0].role, MessageRole::User);
    }

    #[test]
    fn unknown_role_is_rejected_at_the_boundary() {
        let raw = r#"{"id":"1","role":"robot","content":"x","timestamp":"2025-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<ChatMessage>(raw).is_err());
    }

    #[test]
    fn request_context_is_an_open_map() {
        let req = ChatRequest::new("Bonjour").with_context("agent_id", "chat.default");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["content"], "Bonjour");
        assert_eq!(json["context"]["agent_id"], "chat.default");
    }

    #[test]
    fn validation_detail_list_is_rendered_as_text() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"detail":[{"loc":["body","content"],"msg":"field required"}]}"#)
                .unwrap();
        assert!(body.message().contains("field required"));
    }

    #[test]
    fn reply_mode_parses_config_values() {
        assert_eq!("stream".parse::<ReplyMode>().unwrap(), ReplyMode::Streaming);
        assert_eq!("SEND".parse::<ReplyMode>().unwrap(), ReplyMode::SingleShot);
        assert!(matches!(
            "carrier-pigeon".parse::<ReplyMode>(),
            Err(AppError::Config { value, .. }) if value == "carrier-pigeon"
        ));
    }
}
