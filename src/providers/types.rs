use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Fake,
    Echo,
    Http,
    Unconfigured,
}

impl BackendId {
    pub const ALL: [BackendId; 4] = [
        BackendId::Fake,
        BackendId::Echo,
        BackendId::Http,
        BackendId::Unconfigured,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Fake => "fake",
            BackendId::Echo => "echo",
            BackendId::Http => "http",
            BackendId::Unconfigured => "unconfigured",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendId::Fake => "Simulated stream",
            BackendId::Echo => "Delayed echo",
            BackendId::Http => "HTTP endpoint",
            BackendId::Unconfigured => "Not configured",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fake" => Some(BackendId::Fake),
            "echo" => Some(BackendId::Echo),
            "http" => Some(BackendId::Http),
            "unconfigured" | "none" => Some(BackendId::Unconfigured),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    Done,
    Error(String),
}

/// Request body sent to an HTTP generation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
}
