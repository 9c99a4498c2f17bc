use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::config::{ECHO_DELAY_MS, FAKE_FRAGMENT_CHARS, FAKE_FRAGMENT_DELAY_MS, SETTINGS_KEY};
use crate::providers::BackendId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub backend: BackendId,
    pub endpoint: Option<String>,
    pub fake_fragment_chars: usize,
    pub fake_fragment_delay_ms: u64,
    pub echo_delay_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend: BackendId::Fake,
            endpoint: None,
            fake_fragment_chars: FAKE_FRAGMENT_CHARS,
            fake_fragment_delay_ms: FAKE_FRAGMENT_DELAY_MS,
            echo_delay_ms: ECHO_DELAY_MS,
        }
    }
}

impl AppSettings {
    /// Check the settings are usable before they are stored.
    pub fn validate(&self) -> Result<()> {
        if self.fake_fragment_chars == 0 {
            bail!("Fragment size must be at least one character");
        }
        if let Some(endpoint) = &self.endpoint {
            let url = url::Url::parse(endpoint)?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!("Endpoint must be an http or https URL: {}", endpoint);
            }
        }
        if self.backend == BackendId::Http && self.endpoint.is_none() {
            bail!("The http backend needs an endpoint");
        }
        Ok(())
    }
}

pub struct SettingsService;

impl SettingsService {
    pub async fn load(db: &Database) -> AppSettings {
        match db.get_value(SETTINGS_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed settings: {}", e);
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                tracing::warn!("Failed to read settings: {}", e);
                AppSettings::default()
            }
        }
    }

    pub async fn save(db: &Database, settings: &AppSettings) -> Result<()> {
        settings.validate()?;
        let json = serde_json::to_string(settings)?;
        db.set_value(SETTINGS_KEY, &json).await
    }
}
