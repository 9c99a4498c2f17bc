use std::path::PathBuf;

use anyhow::{Context, Result};

pub const APP_ID: &str = "chatline";

/// Key under which the full conversation collection is stored.
pub const STORE_KEY: &str = "gptlike.chats.v1";
pub const SETTINGS_KEY: &str = "app_settings";

pub const DEFAULT_TITLE: &str = "New chat";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, concise assistant. Keep answers short unless asked for detail.";

/// Auto-derived titles are cut to this many characters, ellipsis included.
pub const TITLE_MAX_CHARS: usize = 40;

pub const FAKE_FRAGMENT_CHARS: usize = 8;
pub const FAKE_FRAGMENT_DELAY_MS: u64 = 20;
pub const ECHO_DELAY_MS: u64 = 1000;

pub const STREAM_ERROR_NOTICE: &str = "\n\n> ⚠ Error contacting the backend. Please try again.";
pub const SIMPLE_CHAT_ERROR: &str = "Sorry, something went wrong. Please try again.";

/// Resolve the data directory: explicit override, then `XDG_DATA_HOME`,
/// then `$HOME/.local/share`.
pub fn data_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    let base = match std::env::var("XDG_DATA_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let home = std::env::var("HOME").context("Neither XDG_DATA_HOME nor HOME is set")?;
            PathBuf::from(home).join(".local/share")
        }
    };
    Ok(base.join(APP_ID))
}

pub fn db_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(format!("{}.db", APP_ID))
}
