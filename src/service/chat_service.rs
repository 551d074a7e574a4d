use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::client::OrchestratorApi;
use crate::errors::AppError;
use crate::models::{
    ChatMessage, ChatRequest, LoginRequest, MessageStatus, RegisterRequest, ReplyMode, User,
    UserStats,
};
use crate::service::conversation::{ContentObserver, ConversationHandle};
use crate::session::Session;
use crate::stream::{StreamConsumer, StreamState, STREAM_FAILURE_NOTICE};

/// Result of one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    /// Id of the assistant message holding the reply.
    pub reply_id: String,
    pub state: StreamState,
}

/// Commands of the chat view: sign in and out, send a message in either
/// reply mode, and load or clear the server-side history.
#[derive(Clone)]
pub struct ChatService<A> {
    api: A,
    session: Session,
    conversation: ConversationHandle,
}

impl<A: OrchestratorApi> ChatService<A> {
    pub fn new(api: A, session: Session, conversation: ConversationHandle) -> Self {
        Self { api, session, conversation }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn conversation(&self) -> &ConversationHandle {
        &self.conversation
    }

    // ── Session ───────────────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> Result<User, AppError> {
        let request = LoginRequest { email: email.to_string(), password: password.to_string() };
        let token = self.api.login(&request).await?;
        self.session.establish(&token);
        self.refresh_user().await
    }

    /// Creates the account, then signs in with the same credentials.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, AppError> {
        let created = self.api.register(request).await?;
        info!("Account {} created", created.username);
        self.login(&request.email, &request.password).await
    }

    /// Signs in with the request's credentials, creating the account first
    /// when the server rejects them.
    pub async fn login_or_register(&self, request: &RegisterRequest) -> Result<User, AppError> {
        match self.login(&request.email, &request.password).await {
            Err(e) if e.is_unauthorized() => {
                info!("No account for {}, registering", request.email);
                self.register(request).await
            }
            signed_in => signed_in,
        }
    }

    /// Fetches the signed-in user's profile and attaches it to the session.
    pub async fn refresh_user(&self) -> Result<User, AppError> {
        let user = self.api.current_user().await?;
        info!("Signed in as {}", user.email);
        self.session.set_user(user.clone());
        Ok(user)
    }

    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!("Logout request failed, clearing session anyway: {e}");
        }
        self.session.clear();
        self.conversation.lock().reset();
    }

    pub async fn stats(&self) -> Result<UserStats, AppError> {
        self.api.user_stats().await
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    pub async fn send(
        &self,
        text: &str,
        context: Map<String, Value>,
        mode: ReplyMode,
    ) -> Result<SendOutcome, AppError> {
        self.send_observed(text, context, mode, None).await
    }

    /// Sends `text` and writes the reply into a new assistant message.
    /// `observer` is told about every content change of that message.
    ///
    /// Transport failures do not surface as `Err`: the reply message shows
    /// [`STREAM_FAILURE_NOTICE`] and the outcome is [`StreamState::Failed`].
    pub async fn send_observed(
        &self,
        text: &str,
        context: Map<String, Value>,
        mode: ReplyMode,
        observer: Option<ContentObserver>,
    ) -> Result<SendOutcome, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::EmptyField { field_name: "content".to_string() });
        }

        self.conversation.push(ChatMessage::user(text));
        let request = ChatRequest { content: text.to_string(), context };

        match mode {
            ReplyMode::Streaming => Ok(self.stream_reply(&request, observer).await),
            ReplyMode::SingleShot => Ok(self.single_reply(&request, observer).await),
        }
    }

    async fn stream_reply(
        &self,
        request: &ChatRequest,
        observer: Option<ContentObserver>,
    ) -> SendOutcome {
        let mut sink = self.conversation.bind_placeholder();
        if let Some(observer) = observer {
            sink = sink.with_observer(observer);
        }
        let reply_id = sink.message_id().to_string();
        debug!("Streaming reply into {reply_id}");

        let (state, _) = StreamConsumer::new(sink).run(self.api.open_chat_stream(request)).await;
        SendOutcome { reply_id, state }
    }

    async fn single_reply(
        &self,
        request: &ChatRequest,
        mut observer: Option<ContentObserver>,
    ) -> SendOutcome {
        let (message, state) = match self.api.send_chat(request).await {
            Ok(reply) => {
                debug!("Reply {} answered by {:?}", reply.trace_id, reply.agent_used);
                (ChatMessage::from_reply(&reply), StreamState::Completed)
            }
            Err(e) => {
                if e.is_transport() {
                    warn!("Chat request failed: {e}");
                } else {
                    error!("Chat reply could not be used: {e}");
                }
                let message = ChatMessage {
                    status: MessageStatus::Failed,
                    ..ChatMessage::assistant(STREAM_FAILURE_NOTICE)
                };
                (message, StreamState::Failed)
            }
        };

        if let Some(observer) = observer.as_mut() {
            observer(&message.content);
        }
        let reply_id = self.conversation.push(message);
        SendOutcome { reply_id, state }
    }

    // ── History ───────────────────────────────────────────────────────────────

    /// Replaces the local conversation with the server's history. Returns
    /// the number of messages received.
    pub async fn load_history(&self) -> Result<usize, AppError> {
        let history = self.api.chat_history().await?;
        let count = history.messages.len();
        self.conversation.lock().replace(history.messages);
        Ok(count)
    }

    pub async fn clear_history(&self) -> Result<(), AppError> {
        let resp = self.api.clear_chat_history().await?;
        debug!("History {} for user {}", resp.status, resp.user_id);
        self.conversation.lock().reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ByteStream;
    use crate::models::{
        ChatHistory, ChatReply, ClearHistoryResponse, MessageRole, Token,
    };
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::collections::HashMap;

    /// Scripted orchestrator: each prompt maps to the body chunks it streams.
    #[derive(Default)]
    struct ScriptedApi {
        bodies: HashMap<String, Vec<&'static str>>,
        refuse: bool,
    }

    #[async_trait]
    impl OrchestratorApi for ScriptedApi {
        async fn login(&self, _: &LoginRequest) -> Result<Token, AppError> {
            Ok(Token { access_token: "jwt".into(), token_type: "bearer".into(), expires_in: 60 })
        }

        async fn register(&self, _: &RegisterRequest) -> Result<User, AppError> {
            Err(AppError::Unexpected("not scripted".into()))
        }

        async fn current_user(&self) -> Result<User, AppError> {
            Err(AppError::Unauthorized)
        }

        async fn user_stats(&self) -> Result<UserStats, AppError> {
            Err(AppError::Unauthorized)
        }

        async fn logout(&self) -> Result<(), AppError> {
            Err(AppError::transport("offline"))
        }

        async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, AppError> {
            if self.refuse {
                return Err(AppError::Status { status: 503 });
            }
            Ok(ChatReply {
                message: format!("echo: {}", request.content),
                trace_id: "trace-1".into(),
                agent_used: Some("ollama.qwen2.5".into()),
                timestamp: "2025-05-06T07:08:09.000001".into(),
            })
        }

        async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, AppError> {
            if self.refuse {
                return Err(AppError::transport("connection refused"));
            }
            let chunks = self.bodies.get(&request.content).cloned().unwrap_or_default();
            Ok(stream::iter(chunks)
                .then(|chunk| async move {
                    tokio::task::yield_now().await;
                    Ok::<_, AppError>(chunk.as_bytes().to_vec())
                })
                .boxed())
        }

        async fn chat_history(&self) -> Result<ChatHistory, AppError> {
            Ok(ChatHistory { messages: Vec::new(), user_id: "u1".into() })
        }

        async fn clear_chat_history(&self) -> Result<ClearHistoryResponse, AppError> {
            Ok(ClearHistoryResponse { status: "cleared".into(), user_id: "u1".into() })
        }
    }

    fn service(api: ScriptedApi) -> ChatService<ScriptedApi> {
        ChatService::new(api, Session::with_token("jwt"), ConversationHandle::default())
    }

    fn message_of(svc: &ChatService<ScriptedApi>, id: &str) -> ChatMessage {
        svc.conversation().lock().get(id).cloned().unwrap()
    }

    #[tokio::test]
    async fn streamed_reply_fills_a_single_placeholder() {
        let mut api = ScriptedApi::default();
        api.bodies.insert(
            "Bonjour".into(),
            vec![
                "data: {\"content\":\"Sal",
                "ut\"}\n\ndata: {\"content\":\" !\"}\n",
                "data: {\"content\":\"\",\"done\":true,\"agent\":\"ollama.qwen2.5\"}\n",
            ],
        );
        let svc = service(api);

        let outcome = svc.send("Bonjour", Map::new(), ReplyMode::Streaming).await.unwrap();
        assert_eq!(outcome.state, StreamState::Completed);

        let messages = svc.conversation().snapshot();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[2].id, outcome.reply_id);
        assert_eq!(messages[2].content, "Salut !");
        assert_eq!(messages[2].status, MessageStatus::Complete);
        assert_eq!(messages[2].agent_id.as_deref(), Some("ollama.qwen2.5"));
    }

    #[tokio::test]
    async fn both_reply_modes_record_the_answering_agent() {
        let mut api = ScriptedApi::default();
        api.bodies.insert(
            "ping".into(),
            vec!["data: {\"content\":\"pong\",\"done\":true,\"agent\":\"ollama.qwen2.5\"}\n"],
        );
        let svc = service(api);

        let streamed = svc.send("ping", Map::new(), ReplyMode::Streaming).await.unwrap();
        let single = svc.send("ping", Map::new(), ReplyMode::SingleShot).await.unwrap();

        assert_eq!(
            message_of(&svc, &streamed.reply_id).agent_id,
            message_of(&svc, &single.reply_id).agent_id
        );
        assert_eq!(message_of(&svc, &streamed.reply_id).agent_id.as_deref(), Some("ollama.qwen2.5"));
    }

    #[tokio::test]
    async fn refused_stream_leaves_failure_notice() {
        let svc = service(ScriptedApi { refuse: true, ..Default::default() });
        let outcome = svc.send("Bonjour", Map::new(), ReplyMode::Streaming).await.unwrap();

        assert_eq!(outcome.state, StreamState::Failed);
        let reply = message_of(&svc, &outcome.reply_id);
        assert_eq!(reply.content, STREAM_FAILURE_NOTICE);
        assert_eq!(reply.status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn concurrent_streams_never_cross_write() {
        let mut api = ScriptedApi::default();
        api.bodies.insert(
            "first".into(),
            vec!["data: {\"content\":\"A1\"}\n", "data: {\"content\":\"A2\"}\n", "data: {\"content\":\"A3\"}\n"],
        );
        api.bodies.insert(
            "second".into(),
            vec!["data: {\"content\":\"B1\"}\n", "data: {\"content\":\"B2\"}\n", "data: {\"done\":true}\n"],
        );
        let svc = service(api);

        let (a, b) = tokio::join!(
            svc.send("first", Map::new(), ReplyMode::Streaming),
            svc.send("second", Map::new(), ReplyMode::Streaming),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.reply_id, b.reply_id);
        assert_eq!(message_of(&svc, &a.reply_id).content, "A1A2A3");
        assert_eq!(message_of(&svc, &b.reply_id).content, "B1B2");
        assert_eq!(a.state, StreamState::Completed);
        assert_eq!(b.state, StreamState::Completed);
    }

    #[tokio::test]
    async fn single_shot_mode_adds_one_complete_reply() {
        let svc = service(ScriptedApi::default());
        let outcome = svc.send("ping", Map::new(), ReplyMode::SingleShot).await.unwrap();

        assert_eq!(outcome.state, StreamState::Completed);
        let messages = svc.conversation().snapshot();
        assert_eq!(messages.len(), 3);
        let reply = &messages[2];
        assert_eq!(reply.content, "echo: ping");
        assert_eq!(reply.agent_id.as_deref(), Some("ollama.qwen2.5"));
        assert!(!reply.is_streaming());
    }

    #[tokio::test]
    async fn single_shot_failure_is_degraded_not_thrown() {
        let svc = service(ScriptedApi { refuse: true, ..Default::default() });
        let outcome = svc.send("ping", Map::new(), ReplyMode::SingleShot).await.unwrap();
        assert_eq!(outcome.state, StreamState::Failed);
        assert_eq!(message_of(&svc, &outcome.reply_id).content, STREAM_FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn blank_input_is_rejected_before_any_message_is_added() {
        let svc = service(ScriptedApi::default());
        let err = svc.send("   ", Map::new(), ReplyMode::Streaming).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(svc.conversation().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn logout_clears_session_even_when_server_is_unreachable() {
        let svc = service(ScriptedApi::default());
        svc.logout().await;
        assert!(!svc.session().is_authenticated());
    }

    #[tokio::test]
    async fn clearing_history_resets_to_greeting() {
        let svc = service(ScriptedApi::default());
        svc.send("ping", Map::new(), ReplyMode::SingleShot).await.unwrap();
        svc.clear_history().await.unwrap();
        assert_eq!(svc.conversation().snapshot().len(), 1);
        assert_eq!(svc.load_history().await.unwrap(), 0);
    }
}
