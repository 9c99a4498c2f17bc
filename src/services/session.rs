use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::chat::{self, StreamParams, StreamResult};
use super::conversation::{derived_title, filter_conversations, partition_pinned};
use super::export;
use super::store::ConversationStore;
use crate::config::STREAM_ERROR_NOTICE;
use crate::models::{Conversation, Message, Role};
use crate::providers::ChatBackend;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("A reply is already streaming in this conversation")]
    AlreadyStreaming,
}

/// Snapshot of the conversation collection and the active conversation.
/// Every operation returns a new snapshot and leaves `self` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    conversations: Vec<Conversation>,
    active_id: String,
}

impl ChatState {
    /// Build from loaded data; an empty collection gets one fresh conversation.
    /// The first conversation becomes active.
    pub fn from_conversations(mut conversations: Vec<Conversation>) -> Self {
        if conversations.is_empty() {
            conversations.push(Conversation::new());
        }
        let active_id = conversations[0].id.clone();
        Self {
            conversations,
            active_id,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active(&self) -> &Conversation {
        self.get(&self.active_id)
            .unwrap_or(&self.conversations[0])
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        filter_conversations(query, &self.conversations)
    }

    pub fn partitioned(&self) -> (Vec<&Conversation>, Vec<&Conversation>) {
        partition_pinned(&self.conversations)
    }

    fn update<F>(&self, id: &str, f: F) -> Result<Self, ChatError>
    where
        F: FnOnce(&mut Conversation),
    {
        let mut next = self.clone();
        let conv = next
            .conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.to_string()))?;
        f(conv);
        Ok(next)
    }

    /// New conversation first in the list, and active.
    pub fn create(&self) -> Self {
        let conv = Conversation::new();
        let mut next = self.clone();
        next.active_id = conv.id.clone();
        next.conversations.insert(0, conv);
        next
    }

    pub fn select(&self, id: &str) -> Result<Self, ChatError> {
        if self.get(id).is_none() {
            return Err(ChatError::ConversationNotFound(id.to_string()));
        }
        let mut next = self.clone();
        next.active_id = id.to_string();
        Ok(next)
    }

    /// A blank or absent title keeps the current one.
    pub fn rename(&self, id: &str, title: Option<&str>) -> Result<Self, ChatError> {
        match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => self.update(id, |c| {
                c.title = title.to_string();
                c.touch();
            }),
            None => self.update(id, |_| {}),
        }
    }

    pub fn delete(&self, id: &str) -> Result<Self, ChatError> {
        if self.get(id).is_none() {
            return Err(ChatError::ConversationNotFound(id.to_string()));
        }
        let remaining: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.id != id)
            .cloned()
            .collect();

        if remaining.is_empty() {
            return Ok(Self::from_conversations(remaining));
        }

        let active_id = if self.active_id == id {
            remaining[0].id.clone()
        } else {
            self.active_id.clone()
        };
        Ok(Self {
            conversations: remaining,
            active_id,
        })
    }

    pub fn toggle_pin(&self, id: &str) -> Result<Self, ChatError> {
        self.update(id, |c| c.pinned = !c.pinned)
    }

    /// Returns the new snapshot and the id of the appended message.
    pub fn append_message(
        &self,
        id: &str,
        role: Role,
        content: &str,
    ) -> Result<(Self, String), ChatError> {
        let message = Message::new(role, content);
        let message_id = message.id.clone();
        let next = self.update(id, |c| {
            c.messages.push(message);
            c.touch();
        })?;
        Ok((next, message_id))
    }

    /// Append to the last message when it is an assistant message. Anything
    /// else, an unknown conversation included, leaves the state unchanged.
    pub fn apply_stream_fragment(&self, id: &str, fragment: &str) -> Self {
        let ends_with_assistant = self
            .get(id)
            .and_then(|c| c.last_message())
            .is_some_and(|m| m.role == Role::Assistant);
        if !ends_with_assistant {
            return self.clone();
        }
        self.update(id, |c| {
            if let Some(last) = c.messages.last_mut() {
                last.content.push_str(fragment);
            }
            c.touch();
        })
        .unwrap_or_else(|_| self.clone())
    }

    /// Title the conversation after its first user message if it still has
    /// the default title.
    pub fn with_derived_title(&self, id: &str) -> Self {
        match self.get(id).and_then(derived_title) {
            Some(title) => self
                .rename(id, Some(&title))
                .unwrap_or_else(|_| self.clone()),
            None => self.clone(),
        }
    }
}

struct ActiveStream {
    message_id: String,
    cancel: CancellationToken,
}

/// Owns the conversation state, persists it after every change, and applies
/// streamed replies in arrival order.
pub struct ChatController {
    store: ConversationStore,
    backend: Arc<dyn ChatBackend>,
    state: ChatState,
    streams: HashMap<String, ActiveStream>,
    events_tx: mpsc::UnboundedSender<StreamResult>,
    events_rx: mpsc::UnboundedReceiver<StreamResult>,
}

impl ChatController {
    pub async fn open(store: ConversationStore, backend: Arc<dyn ChatBackend>) -> Result<Self> {
        let loaded = store.load().await;
        let was_empty = loaded.is_empty();
        let state = ChatState::from_conversations(loaded);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let controller = Self {
            store,
            backend,
            state,
            streams: HashMap::new(),
            events_tx,
            events_rx,
        };
        if was_empty {
            controller.persist().await?;
        }
        Ok(controller)
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn is_streaming(&self, conversation_id: &str) -> bool {
        self.streams.contains_key(conversation_id)
    }

    async fn persist(&self) -> Result<()> {
        self.store.save(self.state.conversations()).await
    }

    async fn commit(&mut self, next: ChatState) -> Result<()> {
        if next == self.state {
            return Ok(());
        }
        self.state = next;
        self.persist().await
    }

    pub async fn create(&mut self) -> Result<String> {
        let next = self.state.create();
        let id = next.active_id().to_string();
        self.commit(next).await?;
        tracing::info!("Created conversation {}", id);
        Ok(id)
    }

    pub async fn select(&mut self, id: &str) -> Result<()> {
        let next = self.state.select(id)?;
        self.commit(next).await
    }

    pub async fn rename(&mut self, id: &str, title: Option<&str>) -> Result<()> {
        let next = self.state.rename(id, title)?;
        self.commit(next).await
    }

    pub async fn delete(&mut self, id: &str) -> Result<()> {
        let next = self.state.delete(id)?;
        if let Some(stream) = self.streams.remove(id) {
            stream.cancel.cancel();
        }
        self.commit(next).await?;
        tracing::info!("Deleted conversation {}", id);
        Ok(())
    }

    pub async fn toggle_pin(&mut self, id: &str) -> Result<()> {
        let next = self.state.toggle_pin(id)?;
        self.commit(next).await
    }

    pub async fn append_message(&mut self, id: &str, role: Role, content: &str) -> Result<String> {
        let (next, message_id) = self.state.append_message(id, role, content)?;
        self.commit(next).await?;
        Ok(message_id)
    }

    /// Send user text to the active conversation and start streaming the
    /// reply. Returns `false` when the text is blank.
    pub async fn send(&mut self, text: &str) -> Result<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }
        let conversation_id = self.state.active_id().to_string();
        if self.is_streaming(&conversation_id) {
            return Err(ChatError::AlreadyStreaming.into());
        }

        self.append_message(&conversation_id, Role::User, text).await?;
        let message_id = self
            .append_message(&conversation_id, Role::Assistant, "")
            .await?;

        let cancel = CancellationToken::new();
        self.streams.insert(
            conversation_id.clone(),
            ActiveStream {
                message_id: message_id.clone(),
                cancel: cancel.clone(),
            },
        );

        let params = StreamParams {
            backend: self.backend.clone(),
            conversation_id: conversation_id.clone(),
            message_id,
            prompt: text.to_string(),
        };
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            chat::run_streaming(params, cancel, move |event| {
                let _ = tx.send(event);
            })
            .await;
        });

        tracing::debug!("Streaming reply into {}", conversation_id);
        Ok(true)
    }

    /// Stop the reply streaming into a conversation. What arrived so far stays.
    pub fn stop(&mut self, conversation_id: &str) {
        if let Some(stream) = self.streams.get(conversation_id) {
            stream.cancel.cancel();
        }
    }

    fn is_current(&self, event: &StreamResult) -> bool {
        self.streams
            .get(event.conversation_id())
            .is_some_and(|s| s.message_id == event.message_id())
    }

    /// Apply one stream event. Events for conversations without a matching
    /// registered stream are dropped, so a deleted conversation is never
    /// brought back.
    pub async fn handle_event(&mut self, event: StreamResult) -> Result<()> {
        if !self.is_current(&event) {
            tracing::debug!("Dropping stale stream event for {}", event.conversation_id());
            return Ok(());
        }
        let conversation_id = event.conversation_id().to_string();

        match event {
            StreamResult::Fragment { fragment, .. } => {
                let next = self.state.apply_stream_fragment(&conversation_id, &fragment);
                self.commit(next).await
            }
            StreamResult::Done { .. } => self.finish_stream(&conversation_id).await,
            StreamResult::Error { message_id, .. } => {
                let placeholder_is_last = self
                    .state
                    .get(&conversation_id)
                    .and_then(|c| c.last_message())
                    .is_some_and(|m| m.id == message_id && m.role == Role::Assistant);
                let next = if placeholder_is_last {
                    self.state
                        .apply_stream_fragment(&conversation_id, STREAM_ERROR_NOTICE)
                } else {
                    let (next, _) = self.state.append_message(
                        &conversation_id,
                        Role::Assistant,
                        STREAM_ERROR_NOTICE.trim_start(),
                    )?;
                    next
                };
                self.commit(next).await?;
                self.finish_stream(&conversation_id).await
            }
        }
    }

    async fn finish_stream(&mut self, conversation_id: &str) -> Result<()> {
        self.streams.remove(conversation_id);
        let next = self.state.with_derived_title(conversation_id);
        self.commit(next).await
    }

    /// Apply every stream event that has already arrived, without waiting.
    /// Returns how many events were taken off the queue.
    pub async fn pump(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event).await?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Wait for the next event belonging to a registered stream and apply it.
    /// Stale events are skipped. Returns `None` once no stream is active.
    pub async fn next_event(&mut self) -> Result<Option<StreamResult>> {
        while !self.streams.is_empty() {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            if self.is_current(&event) {
                self.handle_event(event.clone()).await?;
                return Ok(Some(event));
            }
            tracing::debug!("Dropping stale stream event for {}", event.conversation_id());
        }
        Ok(None)
    }

    /// Apply stream events until the given conversation has no stream left,
    /// calling `on_fragment` with each fragment applied to it.
    pub async fn wait_for_stream<F>(&mut self, conversation_id: &str, mut on_fragment: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        while self.is_streaming(conversation_id) {
            match self.next_event().await? {
                Some(StreamResult::Fragment {
                    conversation_id: target,
                    fragment,
                    ..
                }) if target == conversation_id => on_fragment(&fragment),
                Some(_) => {}
                None => break,
            }
        }
        Ok(())
    }

    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        self.state.search(query)
    }

    pub fn export_json(&self, dir: &Path) -> Result<PathBuf> {
        export::write_export(dir, self.state.conversations(), chrono::Utc::now())
    }

    /// Cancel every in-flight stream.
    pub fn shutdown(&mut self) {
        for (_, stream) in self.streams.drain() {
            stream.cancel.cancel();
        }
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::providers::echo::{echo_reply, EchoBackend, UnconfiguredBackend};
    use crate::providers::fake::{fake_reply, FakeBackend};
    use crate::services::database::Database;

    fn state_with(n: usize) -> ChatState {
        let mut state = ChatState::from_conversations(Vec::new());
        for _ in 1..n {
            state = state.create();
        }
        state
    }

    #[test]
    fn test_empty_load_gets_fresh_conversation() {
        let state = ChatState::from_conversations(Vec::new());
        assert_eq!(state.conversations().len(), 1);
        assert_eq!(state.active().title, "New chat");
        assert_eq!(state.active().messages.len(), 1);
        assert_eq!(state.active().messages[0].role, Role::System);
    }

    #[test]
    fn test_create_prepends_and_activates() {
        let state = state_with(1);
        let next = state.create();
        assert_eq!(next.conversations().len(), 2);
        assert_eq!(next.active_id(), next.conversations()[0].id);
        assert_eq!(state.conversations().len(), 1);
    }

    #[test]
    fn test_delete_only_conversation() {
        let state = state_with(1);
        let old_id = state.active_id().to_string();
        let next = state.delete(&old_id).unwrap();
        assert_eq!(next.conversations().len(), 1);
        assert_ne!(next.active_id(), old_id);
        assert_eq!(next.active().title, "New chat");
    }

    #[test]
    fn test_delete_active_falls_to_first_remaining() {
        let state = state_with(3);
        let ids: Vec<String> = state.conversations().iter().map(|c| c.id.clone()).collect();
        let next = state.delete(&ids[0]).unwrap();
        assert_eq!(next.active_id(), ids[1]);

        let next = state.select(&ids[2]).unwrap().delete(&ids[0]).unwrap();
        assert_eq!(next.active_id(), ids[2]);
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let state = state_with(1);
        assert_eq!(
            state.delete("nope"),
            Err(ChatError::ConversationNotFound("nope".to_string()))
        );
        assert!(state.rename("nope", Some("x")).is_err());
        assert!(state.toggle_pin("nope").is_err());
        assert!(state.select("nope").is_err());
    }

    #[test]
    fn test_rename_touches_only_target() {
        let state = state_with(3);
        let target = state.conversations()[1].id.clone();
        std::thread::sleep(Duration::from_millis(2));
        let next = state.rename(&target, Some("Renamed")).unwrap();

        for (before, after) in state.conversations().iter().zip(next.conversations()) {
            if before.id == target {
                assert_eq!(after.title, "Renamed");
                assert!(after.updated_at > before.updated_at);
                assert_eq!(after.messages, before.messages);
                assert_eq!(after.pinned, before.pinned);
                assert_eq!(after.created_at, before.created_at);
            } else {
                assert_eq!(after, before);
            }
        }
    }

    #[test]
    fn test_blank_rename_keeps_title() {
        let state = state_with(1);
        let id = state.active_id().to_string();
        assert_eq!(state.rename(&id, None).unwrap(), state);
        assert_eq!(state.rename(&id, Some("   ")).unwrap(), state);
    }

    #[test]
    fn test_toggle_pin() {
        let state = state_with(2);
        let id = state.conversations()[1].id.clone();
        let pinned = state.toggle_pin(&id).unwrap();
        assert!(pinned.get(&id).unwrap().pinned);
        let (p, o) = pinned.partitioned();
        assert_eq!((p.len(), o.len()), (1, 1));
        assert!(!pinned.toggle_pin(&id).unwrap().get(&id).unwrap().pinned);
    }

    #[test]
    fn test_fragment_ignored_after_user_message() {
        let state = state_with(1);
        let id = state.active_id().to_string();
        let (state, _) = state.append_message(&id, Role::User, "hi").unwrap();
        let next = state.apply_stream_fragment(&id, "stray");
        assert_eq!(next, state);
    }

    #[test]
    fn test_fragments_append_to_assistant() {
        let state = state_with(1);
        let id = state.active_id().to_string();
        let (state, _) = state.append_message(&id, Role::User, "hi").unwrap();
        let (state, _) = state.append_message(&id, Role::Assistant, "").unwrap();
        let state = state
            .apply_stream_fragment(&id, "Hel")
            .apply_stream_fragment(&id, "lo");
        assert_eq!(state.active().last_message().unwrap().content, "Hello");
        assert_eq!(state.apply_stream_fragment("missing", "x"), state);
    }

    #[test]
    fn test_derived_title_after_first_exchange() {
        let state = state_with(1);
        let id = state.active_id().to_string();
        let (state, _) = state
            .append_message(&id, Role::User, "Plan a weekend in Lisbon with kids please")
            .unwrap();
        let state = state.with_derived_title(&id);
        assert_eq!(state.active().title, "Plan a weekend in Lisbon with kids plea…");
    }

    async fn controller(backend: Arc<dyn ChatBackend>) -> ChatController {
        let store = ConversationStore::new(Database::new_in_memory().unwrap());
        ChatController::open(store, backend).await.unwrap()
    }

    fn fake() -> Arc<dyn ChatBackend> {
        Arc::new(FakeBackend::new(8, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_open_persists_fresh_conversation() {
        let store = ConversationStore::new(Database::new_in_memory().unwrap());
        let controller = ChatController::open(store.clone(), fake()).await.unwrap();
        assert_eq!(store.load().await, controller.state().conversations());
    }

    #[tokio::test]
    async fn test_send_streams_full_reply() {
        let mut controller = controller(fake()).await;
        let id = controller.state().active_id().to_string();
        let before = controller.state().active().messages.len();

        assert!(controller.send("  hello  ").await.unwrap());
        assert!(controller.is_streaming(&id));

        let mut seen = String::new();
        controller
            .wait_for_stream(&id, |f| seen.push_str(f))
            .await
            .unwrap();

        let conv = controller.state().active();
        assert_eq!(conv.messages.len(), before + 2);
        assert_eq!(conv.messages[before].role, Role::User);
        assert_eq!(conv.messages[before].content, "hello");
        assert_eq!(conv.messages[before + 1].role, Role::Assistant);
        assert_eq!(conv.messages[before + 1].content, fake_reply("hello"));
        assert_eq!(seen, fake_reply("hello"));
        assert_eq!(conv.title, "hello");
        assert!(!controller.is_streaming(&id));
    }

    #[tokio::test]
    async fn test_blank_send_is_ignored() {
        let mut controller = controller(fake()).await;
        let before = controller.state().clone();
        assert!(!controller.send("   ").await.unwrap());
        assert_eq!(controller.state(), &before);
    }

    #[tokio::test]
    async fn test_second_send_while_streaming_rejected() {
        let mut controller = controller(Arc::new(EchoBackend::new(Duration::from_secs(30)))).await;
        controller.send("one").await.unwrap();
        let err = controller.send("two").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChatError>(),
            Some(&ChatError::AlreadyStreaming)
        );
    }

    #[tokio::test]
    async fn test_backend_failure_appends_notice() {
        let mut controller = controller(Arc::new(UnconfiguredBackend)).await;
        let id = controller.state().active_id().to_string();
        controller.send("hello").await.unwrap();
        controller.wait_for_stream(&id, |_| {}).await.unwrap();

        let last = controller.state().active().last_message().unwrap().clone();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, STREAM_ERROR_NOTICE);
        assert!(!controller.is_streaming(&id));
    }

    #[tokio::test]
    async fn test_stop_keeps_partial_reply() {
        let mut controller = controller(Arc::new(EchoBackend::new(Duration::from_secs(30)))).await;
        let id = controller.state().active_id().to_string();
        controller.send("hello").await.unwrap();
        controller.stop(&id);
        controller.wait_for_stream(&id, |_| {}).await.unwrap();

        let conv = controller.state().active();
        assert_eq!(conv.last_message().unwrap().role, Role::Assistant);
        assert_eq!(conv.last_message().unwrap().content, "");
        assert!(!controller.is_streaming(&id));
    }

    #[tokio::test]
    async fn test_pump_applies_arrived_events() {
        let mut controller = controller(fake()).await;
        let id = controller.state().active_id().to_string();
        controller.send("hello").await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while controller.is_streaming(&id) {
                controller.pump().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let conv = controller.state().active();
        assert_eq!(conv.last_message().unwrap().content, fake_reply("hello"));
        assert_eq!(conv.title, "hello");
        assert!(controller.send("again").await.unwrap());
    }

    #[tokio::test]
    async fn test_pump_with_nothing_queued() {
        let mut controller = controller(fake()).await;
        assert_eq!(controller.pump().await.unwrap(), 0);
        assert_eq!(controller.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_next_event_reports_applied_events() {
        let mut controller = controller(Arc::new(EchoBackend::new(Duration::from_millis(1)))).await;
        let id = controller.state().active_id().to_string();
        controller.send("hi").await.unwrap();

        let first = controller.next_event().await.unwrap().unwrap();
        assert!(matches!(first, StreamResult::Fragment { ref fragment, .. } if fragment == &echo_reply("hi")));
        let second = controller.next_event().await.unwrap().unwrap();
        assert!(matches!(second, StreamResult::Done { stopped: false, .. }));
        assert!(!controller.is_streaming(&id));
        assert_eq!(controller.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_notice_goes_to_registered_placeholder_only() {
        let mut controller = controller(Arc::new(EchoBackend::new(Duration::from_secs(30)))).await;
        let id = controller.state().active_id().to_string();
        controller.send("hello").await.unwrap();
        let placeholder = controller.state().active().last_message().unwrap().id.clone();
        controller
            .append_message(&id, Role::Assistant, "side note")
            .await
            .unwrap();

        controller
            .handle_event(StreamResult::Error {
                conversation_id: id.clone(),
                message_id: placeholder.clone(),
                error: "boom".to_string(),
            })
            .await
            .unwrap();

        let conv = controller.state().active();
        let n = conv.messages.len();
        assert_eq!(conv.messages[n - 3].id, placeholder);
        assert_eq!(conv.messages[n - 3].content, "");
        assert_eq!(conv.messages[n - 2].content, "side note");
        assert_eq!(conv.messages[n - 1].content, STREAM_ERROR_NOTICE.trim_start());
        assert!(!controller.is_streaming(&id));
    }

    #[tokio::test]
    async fn test_delete_during_stream_drops_late_events() {
        let mut controller = controller(fake()).await;
        let doomed = controller.state().active_id().to_string();
        controller.send("hello").await.unwrap();
        controller.delete(&doomed).await.unwrap();

        let late = StreamResult::Fragment {
            conversation_id: doomed.clone(),
            message_id: "whatever".to_string(),
            fragment: "ghost".to_string(),
        };
        controller.handle_event(late).await.unwrap();

        assert!(controller.state().get(&doomed).is_none());
        assert!(!controller.is_streaming(&doomed));
        assert_eq!(controller.state().conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_mutations_are_persisted() {
        let store = ConversationStore::new(Database::new_in_memory().unwrap());
        let mut controller = ChatController::open(store.clone(), fake()).await.unwrap();
        let first = controller.state().active_id().to_string();
        let second = controller.create().await.unwrap();
        controller.rename(&first, Some("Kept")).await.unwrap();
        controller.toggle_pin(&first).await.unwrap();
        controller.delete(&second).await.unwrap();

        let reopened = ChatController::open(store, fake()).await.unwrap();
        let conv = reopened.state().get(&first).unwrap();
        assert_eq!(conv.title, "Kept");
        assert!(conv.pinned);
        assert_eq!(reopened.state().conversations().len(), 1);
    }
}
