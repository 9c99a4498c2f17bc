use std::sync::Arc;

use crate::config::SIMPLE_CHAT_ERROR;
use crate::models::{Message, Role};
use crate::providers::ChatBackend;
use crate::services::chat::collect_reply;

/// A single throwaway conversation: the user's message goes in immediately,
/// the whole reply is appended once the backend answers.
pub struct SimpleChat {
    backend: Arc<dyn ChatBackend>,
    messages: Vec<Message>,
}

impl SimpleChat {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the reply, or `None` when the input was blank.
    pub async fn send(&mut self, input: &str) -> Option<&Message> {
        if input.trim().is_empty() {
            return None;
        }
        self.messages.push(Message::new(Role::User, input));

        let reply = match collect_reply(self.backend.as_ref(), input).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error sending message to backend: {}", e);
                SIMPLE_CHAT_ERROR.to_string()
            }
        };
        self.messages.push(Message::new(Role::Assistant, reply));
        self.messages.last()
    }
}
