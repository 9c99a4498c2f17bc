use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::providers::traits::ChatBackend;
use crate::providers::types::{BackendError, BackendId, StreamEvent};

pub fn echo_reply(input: &str) -> String {
    format!("AI: You said \"{}\". I am processing this...", input)
}

/// Answers with the whole reply in one piece after a fixed delay.
pub struct EchoBackend {
    delay: Duration,
}

impl EchoBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ChatBackend for EchoBackend {
    fn backend_id(&self) -> BackendId {
        BackendId::Echo
    }

    async fn stream_reply(
        &self,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        tokio::time::sleep(self.delay).await;
        if tx.send(StreamEvent::Token(echo_reply(prompt))).await.is_ok() {
            let _ = tx.send(StreamEvent::Done).await;
        }
        Ok(())
    }
}

/// Stand-in for a real generation service. Always fails.
pub struct UnconfiguredBackend;

#[async_trait]
impl ChatBackend for UnconfiguredBackend {
    fn backend_id(&self) -> BackendId {
        BackendId::Unconfigured
    }

    async fn stream_reply(
        &self,
        _prompt: &str,
        _tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        Err(BackendError::NotConfigured(
            "no generation backend is wired up; set one with `chatline config --backend`"
                .to_string(),
        ))
    }
}
