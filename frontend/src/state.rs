use leptos::prelude::*;
use leptos::task::spawn_local;

use agentic_console::errors::AppError;
use agentic_console::models::{
    ChatMessage, ChatRequest, LoginRequest, MessageStatus, RegisterRequest, ReplyMode, User,
};
use agentic_console::service::conversation::Conversation;
use agentic_console::session::Session;
use agentic_console::stream::{MessageSink, StreamConsumer, StreamState, STREAM_FAILURE_NOTICE};

use crate::{api, sse, storage};

/// Writes a streamed reply into its placeholder inside the conversation
/// signal. Once the view is unmounted the signal is disposed and updates are
/// dropped.
struct SignalSink {
    conversation: WriteSignal<Conversation>,
    message_id: String,
}

impl SignalSink {
    fn apply(&self, update: impl FnOnce(&mut Conversation, &str) -> bool) {
        let id = self.message_id.as_str();
        if self.conversation.try_update(|conv| update(conv, id)).is_none() {
            log::debug!("Chat view disposed, dropping update for {id}");
        }
    }
}

impl MessageSink for SignalSink {
    fn publish(&mut self, content: &str) {
        self.apply(|conv, id| conv.update_content(id, content));
    }

    fn complete(&mut self, agent: Option<&str>) {
        self.apply(|conv, id| conv.complete(id, agent));
    }

    fn fail(&mut self, notice: &str) {
        self.apply(|conv, id| conv.fail(id, notice));
    }
}

/// Shared application state, provided via Leptos context.
#[derive(Clone)]
pub struct AppState {
    pub session: Session,

    // --- Read signals (for components to subscribe to) ---
    pub user: ReadSignal<Option<User>>,
    pub conversation: ReadSignal<Conversation>,
    pub mode: ReadSignal<ReplyMode>,
    pub pending_replies: ReadSignal<usize>,
    pub error: ReadSignal<Option<String>>,

    // --- Write signals (for mutating state) ---
    pub set_user: WriteSignal<Option<User>>,
    pub set_conversation: WriteSignal<Conversation>,
    pub set_mode: WriteSignal<ReplyMode>,
    pub set_pending_replies: WriteSignal<usize>,
    pub set_error: WriteSignal<Option<String>>,
}

impl AppState {
    /// Create a new `AppState` around `session` and provide it in the current
    /// Leptos context.
    pub fn provide(session: Session) -> Self {
        let (user, set_user) = signal(None::<User>);
        let (conversation, set_conversation) = signal(Conversation::new());
        let (mode, set_mode) = signal(ReplyMode::default());
        let (pending_replies, set_pending_replies) = signal(0usize);
        let (error, set_error) = signal(None::<String>);

        let state = Self {
            session,
            user,
            conversation,
            mode,
            pending_replies,
            error,
            set_user,
            set_conversation,
            set_mode,
            set_pending_replies,
            set_error,
        };

        provide_context(state.clone());
        state
    }

    pub fn is_streaming(&self) -> bool {
        self.pending_replies.get() > 0
    }

    /// Loads the profile for a session restored from storage.
    pub fn restore(&self) {
        if !self.session.is_authenticated() {
            return;
        }
        let state = self.clone();
        spawn_local(async move {
            match api::current_user(&state.session).await {
                Ok(user) => state.signed_in(user),
                Err(e) => {
                    log::warn!("Stored session rejected: {e}");
                    state.check_session();
                }
            }
        });
    }

    pub fn login(&self, email: String, password: String) {
        let state = self.clone();
        self.set_error.set(None);

        spawn_local(async move {
            let request = LoginRequest { email, password };
            let result = state.sign_in(&request).await;
            state.finish_sign_in(result, "Login");
        });
    }

    /// Creates the account, then signs in with the same credentials.
    pub fn register(&self, request: RegisterRequest) {
        let state = self.clone();
        self.set_error.set(None);

        spawn_local(async move {
            let result = async {
                let created = api::register(&request, &state.session).await?;
                log::info!("Account {} created", created.username);
                let login = LoginRequest { email: request.email, password: request.password };
                state.sign_in(&login).await
            }
            .await;
            state.finish_sign_in(result, "Registration");
        });
    }

    async fn sign_in(&self, request: &LoginRequest) -> Result<User, AppError> {
        let token = api::login(request, &self.session).await?;
        self.session.establish(&token);
        storage::persist_token(&token.access_token);
        api::current_user(&self.session).await
    }

    fn finish_sign_in(&self, result: Result<User, AppError>, action: &str) {
        match result {
            Ok(user) => self.signed_in(user),
            Err(e) => {
                log::error!("{action} failed: {e}");
                self.session.clear();
                let _ = self.set_error.try_set(Some(e.to_string()));
            }
        }
    }

    pub fn logout(&self) {
        let state = self.clone();
        spawn_local(async move {
            if let Err(e) = api::logout(&state.session).await {
                log::warn!("Logout request failed: {e}");
            }
            state.session.clear();
            state.check_session();
        });
    }

    /// Send a message, streaming the reply unless single-shot mode is set.
    pub fn send_message(&self, text: String) {
        let mode = self.mode.get_untracked();
        self.set_conversation.update(|conv| {
            conv.push(ChatMessage::user(text.clone()));
        });
        self.set_pending_replies.update(|n| *n += 1);
        self.set_error.set(None);

        let state = self.clone();
        spawn_local(async move {
            let request = ChatRequest::new(text);
            let outcome = match mode {
                ReplyMode::Streaming => state.stream_reply(request).await,
                ReplyMode::SingleShot => state.single_reply(request).await,
            };
            if outcome == StreamState::Failed {
                state.check_session();
            }
            let _ = state.set_pending_replies.try_update(|n| *n = n.saturating_sub(1));
        });
    }

    async fn stream_reply(&self, request: ChatRequest) -> StreamState {
        let placeholder = ChatMessage::placeholder();
        let message_id = placeholder.id.clone();
        self.set_conversation.update(|conv| {
            conv.push(placeholder);
        });

        let sink = SignalSink { conversation: self.set_conversation, message_id };
        let opening = sse::open(request, self.session.clone());
        let (outcome, _) = StreamConsumer::new(sink).run(opening).await;
        outcome
    }

    async fn single_reply(&self, request: ChatRequest) -> StreamState {
        let (message, outcome) = match api::send_chat(&request, &self.session).await {
            Ok(reply) => (ChatMessage::from_reply(&reply), StreamState::Completed),
            Err(e) => {
                log::error!("Chat request failed: {e}");
                let message = ChatMessage {
                    status: MessageStatus::Failed,
                    ..ChatMessage::assistant(STREAM_FAILURE_NOTICE)
                };
                (message, StreamState::Failed)
            }
        };
        let _ = self.set_conversation.try_update(|conv| {
            conv.push(message);
        });
        outcome
    }

    pub fn load_history(&self) {
        let state = self.clone();
        spawn_local(async move {
            match api::chat_history(&state.session).await {
                Ok(history) => {
                    let _ = state.set_conversation.try_update(|conv| conv.replace(history.messages));
                }
                Err(e) => state.report(e),
            }
        });
    }

    pub fn clear_history(&self) {
        let state = self.clone();
        spawn_local(async move {
            match api::clear_chat_history(&state.session).await {
                Ok(_) => {
                    let _ = state.set_conversation.try_update(Conversation::reset);
                }
                Err(e) => state.report(e),
            }
        });
    }

    fn signed_in(&self, user: User) {
        self.session.set_user(user.clone());
        let _ = self.set_user.try_set(Some(user));
        self.load_history();
    }

    /// Reflects a session that was cleared by logout or by a 401.
    fn check_session(&self) {
        if self.session.is_authenticated() {
            return;
        }
        storage::forget_token();
        let _ = self.set_user.try_set(None);
        let _ = self.set_conversation.try_update(Conversation::reset);
    }

    fn report(&self, e: AppError) {
        log::error!("Request failed: {e}");
        self.check_session();
        let _ = self.set_error.try_set(Some(e.to_string()));
    }
}
