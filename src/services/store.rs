use anyhow::{Context, Result};

use super::database::Database;
use crate::config::STORE_KEY;
use crate::models::Conversation;

/// Persists the whole conversation collection as one JSON record.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    db: Database,
}

impl ConversationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Never fails: a missing, unreadable or malformed record yields an
    /// empty collection.
    pub async fn load(&self) -> Vec<Conversation> {
        let raw = match self.db.get_value(STORE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read conversations: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Conversation>>(&raw) {
            Ok(conversations) => {
                tracing::debug!("Loaded {} conversations", conversations.len());
                conversations
            }
            Err(e) => {
                tracing::warn!("Discarding malformed conversation data: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn save(&self, conversations: &[Conversation]) -> Result<()> {
        let json =
            serde_json::to_string(conversations).context("Failed to serialize conversations")?;
        self.db
            .set_value(STORE_KEY, &json)
            .await
            .context("Failed to persist conversations")
    }
}
