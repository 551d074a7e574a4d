use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::trace;

use crate::models::{ChatMessage, MessageStatus, GREETING};
use crate::stream::MessageSink;

/// Ordered messages of the chat view.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// A fresh conversation opened by the assistant's greeting.
    pub fn new() -> Self {
        Self { messages: vec![ChatMessage::assistant(GREETING)] }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Replaces the content of a message that is still streaming. Finalized
    /// messages are left untouched and `false` is returned.
    pub fn update_content(&mut self, id: &str, content: &str) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.content.clear();
                msg.content.push_str(content);
                true
            }
            None => false,
        }
    }

    /// Freezes a streaming message as complete, recording the agent that
    /// answered when the server named one.
    pub fn complete(&mut self, id: &str, agent: Option<&str>) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                if let Some(agent) = agent {
                    msg.agent_id = Some(agent.to_string());
                }
                msg.status = MessageStatus::Complete;
                true
            }
            None => false,
        }
    }

    /// Freezes a streaming message as failed; `notice` replaces its content.
    pub fn fail(&mut self, id: &str, notice: &str) -> bool {
        match self.streaming_mut(id) {
            Some(msg) => {
                msg.content = notice.to_string();
                msg.status = MessageStatus::Failed;
                true
            }
            None => false,
        }
    }

    /// Swaps in messages loaded from the server. An empty history shows the
    /// greeting instead.
    pub fn replace(&mut self, messages: Vec<ChatMessage>) {
        if messages.is_empty() {
            self.reset();
        } else {
            self.messages = messages;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn streaming_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id && m.is_streaming())
    }
}

/// Shared handle the chat view holds on its conversation. Streams only keep
/// a weak reference, so dropping every handle discards late updates.
#[derive(Debug, Clone, Default)]
pub struct ConversationHandle {
    inner: Arc<Mutex<Conversation>>,
}

impl ConversationHandle {
    pub fn new(conversation: Conversation) -> Self {
        Self { inner: Arc::new(Mutex::new(conversation)) }
    }

    pub fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().messages().to_vec()
    }

    pub fn push(&self, message: ChatMessage) -> String {
        self.lock().push(message)
    }

    /// Appends a new placeholder and returns the sink bound to it.
    pub fn bind_placeholder(&self) -> PlaceholderSink {
        let id = self.push(ChatMessage::placeholder());
        PlaceholderSink { conversation: Arc::downgrade(&self.inner), message_id: id, observer: None }
    }
}

/// Callback told about every content change of a placeholder.
pub type ContentObserver = Box<dyn FnMut(&str) + Send>;

/// [`MessageSink`] writing into one placeholder of a [`Conversation`].
pub struct PlaceholderSink {
    conversation: Weak<Mutex<Conversation>>,
    message_id: String,
    observer: Option<ContentObserver>,
}

impl PlaceholderSink {
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn with_observer(mut self, observer: ContentObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs `update` on the bound conversation. Returns whether the
    /// placeholder actually changed.
    fn apply(&mut self, update: impl FnOnce(&mut Conversation, &str) -> bool) -> bool {
        let Some(conversation) = self.conversation.upgrade() else {
            trace!("Conversation dropped, discarding update for {}", self.message_id);
            return false;
        };
        let mut guard = conversation.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let applied = update(&mut *guard, &self.message_id);
        if !applied {
            trace!("Message {} is no longer streaming, update ignored", self.message_id);
        }
        applied
    }

    fn notify(&mut self, content: &str) {
        if let Some(observer) = self.observer.as_mut() {
            observer(content);
        }
    }
}

impl MessageSink for PlaceholderSink {
    fn publish(&mut self, content: &str) {
        if self.apply(|conv, id| conv.update_content(id, content)) {
            self.notify(content);
        }
    }

    fn complete(&mut self, agent: Option<&str>) {
        self.apply(|conv, id| conv.complete(id, agent));
    }

    fn fail(&mut self, notice: &str) {
        if self.apply(|conv, id| conv.fail(id, notice)) {
            self.notify(notice);
        }
    }
}
