use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;

use crate::providers::traits::ChatBackend;
use crate::providers::types::{BackendError, BackendId, ChatRequest, StreamEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Keys a JSON reply body may carry the answer under, in lookup order.
const REPLY_KEYS: [&str; 3] = ["response", "aiResponse", "reply"];

/// Posts `{ "message": ... }` to a generation endpoint. JSON bodies are read
/// whole; anything else is streamed through as text fragments.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::NotConfigured(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    fn backend_id(&self) -> BackendId {
        BackendId::Http
    }

    async fn stream_reply(
        &self,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError> {
        let body = ChatRequest {
            message: prompt.to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::RequestFailed(format!("{} {}", status, text)));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            let value: serde_json::Value = response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
            let reply = extract_reply(&value)?;
            if tx.send(StreamEvent::Token(reply)).await.is_ok() {
                let _ = tx.send(StreamEvent::Done).await;
            }
            return Ok(());
        }

        let mut stream = response.bytes_stream();
        let mut decoder = Utf8Decoder::default();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| BackendError::NetworkError(e.to_string()))?;
            let text = decoder.push(&bytes);
            if !text.is_empty() && tx.send(StreamEvent::Token(text)).await.is_err() {
                return Ok(()); // receiver dropped
            }
        }

        let rest = decoder.finish();
        if !rest.is_empty() {
            let _ = tx.send(StreamEvent::Token(rest)).await;
        }
        let _ = tx.send(StreamEvent::Done).await;
        Ok(())
    }
}

/// Pull the answer out of a JSON reply, or turn an `error` field into a failure.
pub fn extract_reply(value: &serde_json::Value) -> Result<String, BackendError> {
    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Err(BackendError::RequestFailed(error.to_string()));
    }
    REPLY_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .ok_or_else(|| {
            BackendError::InvalidResponse(format!("no reply field in {}", value))
        })
}

/// Decodes a byte stream as UTF-8, holding back a trailing partial character
/// until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn push(&mut self, bytes: &Bytes) -> String {
        self.pending.extend_from_slice(bytes);

        match std::str::from_utf8(&self.pending) {
            Ok(s) => {
                let decoded = s.to_string();
                self.pending.clear();
                decoded
            }
            Err(e) if e.error_len().is_none() => {
                let valid_up_to = e.valid_up_to();
                let decoded = String::from_utf8_lossy(&self.pending[..valid_up_to]).into_owned();
                self.pending.drain(..valid_up_to);
                decoded
            }
            Err(_) => {
                let decoded = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                decoded
            }
        }
    }

    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chat::collect_reply;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend_for(server: &MockServer) -> HttpBackend {
        HttpBackend::new(format!("{}/api/chat", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_json_reply_is_one_fragment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({ "message": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "aiResponse": "hi there" })))
            .mount(&server)
            .await;

        let reply = collect_reply(&backend_for(&server).await, "hello").await.unwrap();
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn test_text_body_is_streamed_through() {
        let server = MockServer::start().await;
        let body = "Streamed ⚠ reply\nwith two lines";
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let (tx, mut rx) = mpsc::channel(16);
        backend.stream_reply("hello", tx).await.unwrap();

        let mut text = String::new();
        let mut done = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Token(t) => text.push_str(&t),
                StreamEvent::Done => done = true,
                StreamEvent::Error(e) => panic!("unexpected error {}", e),
            }
        }
        assert!(done);
        assert_eq!(text, body);
    }

    #[tokio::test]
    async fn test_error_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = collect_reply(&backend_for(&server).await, "hello").await.unwrap_err();
        assert!(matches!(err, BackendError::RequestFailed(ref m) if m.contains("500") && m.contains("upstream down")));
    }

    #[tokio::test]
    async fn test_json_error_field_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "No prompt provided" })))
            .mount(&server)
            .await;

        let err = collect_reply(&backend_for(&server).await, "").await.unwrap_err();
        assert!(matches!(err, BackendError::RequestFailed(ref m) if m == "No prompt provided"));
    }

    #[test]
    fn test_extract_reply_keys() {
        assert_eq!(extract_reply(&json!({ "response": "hi" })).unwrap(), "hi");
        assert_eq!(extract_reply(&json!({ "aiResponse": "yo" })).unwrap(), "yo");
        assert_eq!(extract_reply(&json!({ "reply": "hey" })).unwrap(), "hey");
    }

    #[test]
    fn test_extract_reply_error_field() {
        let err = extract_reply(&json!({ "error": "No prompt provided" })).unwrap_err();
        assert!(matches!(err, BackendError::RequestFailed(ref m) if m == "No prompt provided"));
    }

    #[test]
    fn test_extract_reply_missing() {
        let err = extract_reply(&json!({ "ok": true })).unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[test]
    fn test_decoder_holds_partial_chars() {
        let text = "⚠ ok";
        let raw = text.as_bytes();
        let mut decoder = Utf8Decoder::default();

        assert_eq!(decoder.push(&Bytes::copy_from_slice(&raw[..1])), "");
        assert_eq!(decoder.push(&Bytes::copy_from_slice(&raw[1..4])), "⚠ ");
        assert_eq!(decoder.push(&Bytes::copy_from_slice(&raw[4..])), "ok");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::default();
        assert_eq!(decoder.push(&Bytes::from_static(b"a\xffb")), "a\u{fffd}b");
    }
}
