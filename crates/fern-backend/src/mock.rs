use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::backend::LlmBackend;
use crate::error::Result;
use crate::types::{BackendEvent, BackendMessage, PromptPart, ToolDescriptor};

/// In-process fake backend for tests and for local development without a
/// real backend binary configured. Every `prompt` immediately records a
/// canned assistant reply and emits `session.idle` to every subscriber.
pub struct MockBackend {
    sessions: DashMap<String, Vec<BackendMessage>>,
    subscribers: DashMap<u64, mpsc::Sender<BackendEvent>>,
    next_sub_id: AtomicU64,
    next_msg_id: AtomicU64,
    reply: String,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Self::with_reply("mock response".to_string())
    }

    pub fn with_reply(reply: String) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            subscribers: DashMap::new(),
            next_sub_id: AtomicU64::new(0),
            next_msg_id: AtomicU64::new(0),
            reply,
        })
    }

    fn broadcast(&self, event: BackendEvent) {
        self.subscribers.retain(|_, tx| tx.try_send(event.clone()).is_ok());
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn ensure_started(&self) -> Result<()> {
        Ok(())
    }

    async fn create_session(&self, _title: &str) -> Result<String> {
        let id = format!("mock-session-{}", self.next_msg_id.fetch_add(1, Ordering::Relaxed));
        self.sessions.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn share_session(&self, session_id: &str) -> Result<String> {
        Ok(format!("https://mock.local/share/{session_id}"))
    }

    async fn prompt(&self, session_id: &str, parts: &[PromptPart], _system: &str, _agent: &str) -> Result<()> {
        let user_text = parts
            .iter()
            .find_map(|p| match p {
                crate::types::PromptPart::Text { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let mut messages = self.sessions.entry(session_id.to_string()).or_default();
        let n = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        messages.push(BackendMessage {
            id: format!("m{n}"),
            role: "user".to_string(),
            text: user_text,
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        let n2 = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        messages.push(BackendMessage {
            id: format!("m{n2}"),
            role: "assistant".to_string(),
            text: self.reply.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        drop(messages);

        self.broadcast(BackendEvent {
            kind: "session.idle".to_string(),
            session_id: Some(session_id.to_string()),
            tool: None,
            message: None,
        });
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BackendEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, tx);
        Ok(rx)
    }

    async fn session_messages(&self, session_id: &str) -> Result<Vec<BackendMessage>> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|m| m.clone())
            .unwrap_or_default())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(vec![ToolDescriptor {
            name: "read".to_string(),
            description: "read a file".to_string(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prompt_then_last_assistant_text_roundtrips() {
        let backend = MockBackend::with_reply("hello there".to_string());
        let session_id = backend.create_session("t").await.unwrap();
        backend
            .prompt(&session_id, &[crate::types::PromptPart::Text { text: "hi".into() }], "", "fern")
            .await
            .unwrap();
        let text = backend.last_assistant_text(&session_id).await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn prompt_emits_session_idle_to_subscribers() {
        let backend = MockBackend::new();
        let mut rx = backend.subscribe_events().await.unwrap();
        let session_id = backend.create_session("t").await.unwrap();
        backend
            .prompt(&session_id, &[], "", "fern")
            .await
            .unwrap();
        let event = rx.recv().await.expect("event expected");
        assert_eq!(event.kind, "session.idle");
        assert_eq!(event.session_id.as_deref(), Some(session_id.as_str()));
    }
}
