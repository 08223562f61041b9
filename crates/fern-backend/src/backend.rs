use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{BackendEvent, BackendMessage, PromptPart, ToolDescriptor};

/// Everything the session coordinator and subagent manager need from the
/// opaque LLM backend. A concrete implementation owns the backend's
/// lifecycle (start, restart, stop); callers only ever see these typed
/// operations.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Start the backend if it isn't already running. Idempotent.
    async fn ensure_started(&self) -> Result<()>;

    /// Force a restart after a `BackendUnhealthy` condition. No-op for
    /// backends with nothing to restart (e.g. the in-process mock).
    async fn restart(&self) -> Result<()> {
        Ok(())
    }

    /// Create a fresh session, returning its backend-side id.
    async fn create_session(&self, title: &str) -> Result<String>;

    /// Obtain (or create) a shareable diagnostic URL for a session. Treated
    /// as a readiness signal — failure here means the backend is unhealthy.
    async fn share_session(&self, session_id: &str) -> Result<String>;

    /// Submit a prompt to a session.
    async fn prompt(
        &self,
        session_id: &str,
        parts: &[PromptPart],
        system: &str,
        agent: &str,
    ) -> Result<()>;

    /// Subscribe to the event stream for a session. The returned receiver
    /// yields events for *all* sessions; callers filter by `session_id`
    /// themselves (this mirrors how the backend's single stream actually
    /// behaves and is what makes cross-talk protection necessary).
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BackendEvent>>;

    /// Full message history for a session, in order.
    async fn session_messages(&self, session_id: &str) -> Result<Vec<BackendMessage>>;

    /// The most recent assistant message's text, if any.
    async fn last_assistant_text(&self, session_id: &str) -> Result<String> {
        let messages = self.session_messages(session_id).await?;
        Ok(messages
            .iter()
            .rev()
            .find(|m| m.role == "assistant")
            .map(|m| m.text.clone())
            .unwrap_or_default())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()>;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;
}
