use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, Role};
use super::now;
use crate::config::{DEFAULT_SYSTEM_PROMPT, DEFAULT_TITLE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pinned: bool,
    pub messages: Vec<Message>,
}

impl Conversation {
    /// A fresh conversation titled "New chat" and seeded with the system prompt.
    pub fn new() -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            created_at: now,
            updated_at: now,
            pinned: false,
            messages: vec![Message::new(Role::System, DEFAULT_SYSTEM_PROMPT)],
        }
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_visible())
    }

    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::User)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
