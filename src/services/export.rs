use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Conversation;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub exported_at: String,
    pub chats: Vec<Conversation>,
}

pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("chats-{}.json", at.format("%Y-%m-%d"))
}

pub fn export_to_json(conversations: &[Conversation], at: DateTime<Utc>) -> Result<String> {
    let payload = ExportPayload {
        exported_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        chats: conversations.to_vec(),
    };
    serde_json::to_string_pretty(&payload).context("Failed to serialize export")
}

/// Write the full collection to `dir`, named after the export date.
pub fn write_export(dir: &Path, conversations: &[Conversation], at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;
    let path = dir.join(export_filename(at));
    let json = export_to_json(conversations, at)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    tracing::info!("Exported {} conversations to {}", conversations.len(), path.display());
    Ok(path)
}

pub fn export_to_markdown(conversation: &Conversation) -> String {
    let mut output = format!("# {}\n\n", conversation.title);
    output.push_str(&format!(
        "> Date: {}\n\n",
        conversation.created_at.format("%Y-%m-%d %H:%M")
    ));

    output.push_str("---\n\n");

    for msg in conversation.visible_messages() {
        output.push_str(&format!(
            "### {}\n\n{}\n\n",
            msg.role.display_name(),
            msg.content
        ));
    }

    output
}
