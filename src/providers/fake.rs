use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::providers::traits::ChatBackend;
use crate::providers::types::{BackendError, BackendId, StreamEvent};

pub fn fake_reply(prompt: &str) -> String {
    format!(
        "You said: {}\n\nThis is a simulated reply. Point the backend setting at a real endpoint to replace it.\n\n```js\nconsole.log('Wire your /api/chat endpoint here');\n```",
        prompt
    )
}

/// Splits owned text into fragments of at most `size` characters, lazily.
#[derive(Debug, Clone)]
pub struct ReplyFragments {
    text: String,
    pos: usize,
    size: usize,
}

impl ReplyFragments {
    pub fn new(text: impl Into<String>, size: usize) -> Self {
        Self {
            text: text.into(),
            pos: 0,
            size: size.max(1),
        }
    }
}

impl Iterator for ReplyFragments {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.text[self.pos..];
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(self.size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let fragment = rest[..end].to_string();
        self.pos += end;
        Some(fragment)
    }
}

/// Simulated token stream: each fragment of the canned reply is yielded after
/// `delay`. Every call starts a fresh sequence.
pub fn fake_stream(prompt: &str, size: usize, delay: Duration) -> impl Stream<Item = String> {
    futures::stream::iter(ReplyFragments::new(fake_reply(prompt), size)).then(
        move |fragment| async move {
            tokio::time::sleep(delay).await;
            fragment
        },
    )
}

pub struct FakeBackend {
    fragment_chars: usize,
    delay: Duration,
}

impl FakeBackend {
    pub fn new(fragment_chars: usize, delay: Duration) -> Self {
        Self {
            fragment_chars,
            delay,
        }
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    fn backend_id(&self) -> BackendId {
        BackendId::Fake
    }

    async fn stream_reply(
        &self,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        let stream = fake_stream(prompt, self.fragment_chars, self.delay);
        futures::pin_mut!(stream);

        while let Some(fragment) = stream.next().await {
            if tx.send(StreamEvent::Token(fragment)).await.is_err() {
                return Ok(()); // receiver dropped
            }
        }
        let _ = tx.send(StreamEvent::Done).await;
        Ok(())
    }
}
