use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::providers::{BackendError, ChatBackend, StreamEvent};

/// Parameters needed to stream one assistant reply into a conversation.
pub struct StreamParams {
    pub backend: Arc<dyn ChatBackend>,
    pub conversation_id: String,
    /// Id of the assistant placeholder the fragments belong to.
    pub message_id: String,
    pub prompt: String,
}

/// Result from streaming: a fragment, completion, or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamResult {
    Fragment {
        conversation_id: String,
        message_id: String,
        fragment: String,
    },
    Done {
        conversation_id: String,
        message_id: String,
        stopped: bool,
    },
    Error {
        conversation_id: String,
        message_id: String,
        error: String,
    },
}

impl StreamResult {
    pub fn conversation_id(&self) -> &str {
        match self {
            StreamResult::Fragment {
                conversation_id, ..
            }
            | StreamResult::Done {
                conversation_id, ..
            }
            | StreamResult::Error {
                conversation_id, ..
            } => conversation_id,
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            StreamResult::Fragment { message_id, .. }
            | StreamResult::Done { message_id, .. }
            | StreamResult::Error { message_id, .. } => message_id,
        }
    }
}

/// Run a streaming reply, reporting every event through `on_event`. Exactly
/// one terminal event (`Done` or `Error`) is reported.
pub async fn run_streaming<F>(params: StreamParams, cancel_token: CancellationToken, mut on_event: F)
where
    F: FnMut(StreamResult) + Send,
{
    let (tx, mut rx) = tokio::sync::mpsc::channel::<StreamEvent>(64);

    let StreamParams {
        backend,
        conversation_id: conv_id,
        message_id,
        prompt,
    } = params;

    let stream_handle = tokio::spawn(async move {
        if let Err(e) = backend.stream_reply(&prompt, tx.clone()).await {
            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
        }
    });

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                stream_handle.abort();
                tracing::debug!("Stream for {} stopped", conv_id);
                on_event(StreamResult::Done {
                    conversation_id: conv_id,
                    message_id,
                    stopped: true,
                });
                return;
            }
            event = rx.recv() => {
                match event {
                    Some(StreamEvent::Token(fragment)) => {
                        on_event(StreamResult::Fragment {
                            conversation_id: conv_id.clone(),
                            message_id: message_id.clone(),
                            fragment,
                        });
                    }
                    Some(StreamEvent::Done) => {
                        on_event(StreamResult::Done {
                            conversation_id: conv_id,
                            message_id,
                            stopped: false,
                        });
                        return;
                    }
                    Some(StreamEvent::Error(error)) => {
                        tracing::warn!("Stream for {} failed: {}", conv_id, error);
                        on_event(StreamResult::Error {
                            conversation_id: conv_id,
                            message_id,
                            error,
                        });
                        return;
                    }
                    None => {
                        on_event(StreamResult::Done {
                            conversation_id: conv_id,
                            message_id,
                            stopped: false,
                        });
                        return;
                    }
                }
            }
        }
    }
}

/// Run a backend to completion and return the whole reply.
pub async fn collect_reply(backend: &dyn ChatBackend, prompt: &str) -> Result<String, BackendError> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<StreamEvent>(64);

    let (result, reply) = tokio::join!(backend.stream_reply(prompt, tx), async move {
        let mut reply = String::new();
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Token(token) => reply.push_str(&token),
                StreamEvent::Done => break,
                StreamEvent::Error(e) => return Err(BackendError::RequestFailed(e)),
            }
        }
        Ok(reply)
    });

    result?;
    reply
}
