use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{BackendError, BackendId, StreamEvent};

/// A source of assistant replies. Implementations push `Token` fragments in
/// order and finish with `Done`; a returned error means the reply failed.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn backend_id(&self) -> BackendId;

    async fn stream_reply(
        &self,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), BackendError>;
}
