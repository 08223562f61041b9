use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use fern_core::coordinator::CompletionCoordinator;
use fern_sessions::{ThreadSession, ThreadSessionRegistry};
use tracing::{error, instrument, warn};

use crate::backend::LlmBackend;
use crate::error::BackendError;
use crate::events::{matches_session, translate};
use crate::hooks::ArchivalHook;
use crate::prompt::PromptBuilder;
use crate::types::{ProgressEvent, PromptPart, RunTurnInput, RunTurnOutput, ToolCallRecord};

/// Hard deadline for a single turn. Long relative to a human's patience on
/// purpose — this is the backstop for a genuinely stuck backend, not the
/// expected case.
const MAX_TURN_DURATION: Duration = Duration::from_secs(10 * 60);

/// `Ok(())` on `session.idle`; `Err(reason)` on `session.error` or on the
/// event stream ending without ever seeing `session.idle`.
pub type TurnSignal = Result<(), String>;

/// Coordinates turns across concurrently active threads. Owns the backend,
/// the thread→session registry, and the completion signal they share with
/// the subagent manager's task-wait path.
pub struct AgentCoordinator {
    backend: Arc<dyn LlmBackend>,
    sessions: Arc<ThreadSessionRegistry>,
    completion: Arc<CompletionCoordinator<TurnSignal>>,
    prompt: PromptBuilder,
    archival_hook: StdMutex<Option<Arc<dyn ArchivalHook>>>,
    default_agent: String,
}

impl AgentCoordinator {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        sessions: Arc<ThreadSessionRegistry>,
        prompt: PromptBuilder,
        default_agent: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            sessions,
            completion: Arc::new(CompletionCoordinator::new()),
            prompt,
            archival_hook: StdMutex::new(None),
            default_agent: default_agent.into(),
        }
    }

    pub fn set_archival_hook(&self, hook: Arc<dyn ArchivalHook>) {
        *self.archival_hook.lock().unwrap() = Some(hook);
    }

    /// The completion coordinator backing this turn's blocking wait. Exposed
    /// for callers (e.g. an HTTP handler) that want to await a turn already
    /// in flight rather than starting a new one.
    pub fn completion_coordinator(&self) -> Arc<CompletionCoordinator<TurnSignal>> {
        Arc::clone(&self.completion)
    }

    /// Route one inbound message to an LLM session and return its response.
    /// Never fails — every error path is converted to a human-readable
    /// fallback string so the transport can always deliver something.
    #[instrument(skip(self, input), fields(thread_id = %input.thread_id))]
    pub async fn run_turn(&self, input: RunTurnInput) -> RunTurnOutput {
        match self.run_turn_inner(&input).await {
            Ok(output) => output,
            Err(message) => RunTurnOutput {
                thread_id: input.thread_id,
                response: message,
                tool_calls: Vec::new(),
            },
        }
    }

    async fn run_turn_inner(&self, input: &RunTurnInput) -> Result<RunTurnOutput, String> {
        let title = derive_title(input.channel.as_deref(), &input.message);

        let (session_id, _share_url) = match self.sessions.get(&input.thread_id) {
            Some(existing) => (existing.backend_session_id, existing.share_url),
            None => self.create_and_share_session(&input.thread_id, &title).await?,
        };

        let tools = self
            .backend
            .list_tools()
            .await
            .map_err(|e| format!("I encountered an error: {e}"))?;

        let system_prompt = self.prompt.build(
            &tools,
            input.channel.as_deref(),
            input.channel_user_id.as_deref(),
            &input.thread_id,
        );

        // Subscription MUST precede the prompt submission, or the
        // session.idle signal can be missed entirely.
        let mut events = self
            .backend
            .subscribe_events()
            .await
            .map_err(|e| format!("I encountered an error: {e}"))?;

        let mut parts = vec![PromptPart::Text {
            text: input.message.clone(),
        }];
        for attachment in &input.attachments {
            if attachment.mime_type.starts_with("image/") {
                parts.push(PromptPart::Image {
                    mime_type: attachment.mime_type.clone(),
                    data_base64: attachment.data_base64.clone(),
                });
            }
        }

        let agent = input.agent_type.as_deref().unwrap_or(&self.default_agent);

        let tool_calls: Arc<StdMutex<Vec<ToolCallRecord>>> = Arc::new(StdMutex::new(Vec::new()));
        let completion = Arc::clone(&self.completion);
        let consumer_session_id = session_id.clone();
        let consumer_tool_calls = Arc::clone(&tool_calls);

        tokio::spawn(async move {
            let mut saw_terminal = false;
            let mut open_tools: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

            while let Some(event) = events.recv().await {
                if !matches_session(&event, &consumer_session_id) {
                    continue;
                }
                match translate(&event) {
                    ProgressEvent::ToolStart { tool } => {
                        let mut calls = consumer_tool_calls.lock().unwrap();
                        calls.push(ToolCallRecord {
                            tool: tool.clone(),
                            input: serde_json::Value::Null,
                            output: None,
                        });
                        open_tools.insert(tool, calls.len() - 1);
                    }
                    ProgressEvent::ToolComplete { tool, message } | ProgressEvent::ToolError { tool, message } => {
                        if let Some(&idx) = open_tools.get(&tool) {
                            let mut calls = consumer_tool_calls.lock().unwrap();
                            if let Some(call) = calls.get_mut(idx) {
                                call.output = message;
                            }
                        }
                    }
                    ProgressEvent::SessionIdle => {
                        saw_terminal = true;
                        completion.signal(&consumer_session_id, Ok(()));
                        break;
                    }
                    ProgressEvent::SessionError { message } => {
                        saw_terminal = true;
                        completion.signal(
                            &consumer_session_id,
                            Err(message.unwrap_or_else(|| "session error".to_string())),
                        );
                        break;
                    }
                    ProgressEvent::Text { .. } | ProgressEvent::Thinking { .. } | ProgressEvent::SessionStatus { .. } => {}
                }
            }

            if !saw_terminal {
                warn!(session_id = %consumer_session_id, "event stream ended without session.idle");
                completion.signal(&consumer_session_id, Err("stream_ended".to_string()));
            }
        });

        self.backend
            .prompt(&session_id, &parts, &system_prompt, agent)
            .await
            .map_err(|e| format!("I encountered an error: {e}"))?;

        let signal = self.completion.wait_for(&session_id, MAX_TURN_DURATION).await;

        let response = match signal {
            Ok(Ok(())) => self
                .backend
                .last_assistant_text(&session_id)
                .await
                .unwrap_or_default(),
            Ok(Err(reason)) if reason == "stream_ended" => {
                "Session ended unexpectedly — may have run out of memory".to_string()
            }
            Ok(Err(reason)) => format!("I encountered an error: {reason}"),
            Err(_timeout) => "OpenCode prompt timed out…".to_string(),
        };

        self.sessions.put(ThreadSession {
            thread_id: input.thread_id.clone(),
            backend_session_id: session_id.clone(),
            share_url: _share_url,
            created_at_secs: now_secs(),
        });

        if let Some(hook) = self.archival_hook.lock().unwrap().clone() {
            let thread_id = input.thread_id.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                hook.on_turn_complete(thread_id, session_id);
            });
        }

        let tool_calls = tool_calls.lock().unwrap().clone();
        Ok(RunTurnOutput {
            thread_id: input.thread_id.clone(),
            response,
            tool_calls,
        })
    }

    async fn create_and_share_session(
        &self,
        thread_id: &str,
        title: &str,
    ) -> Result<(String, Option<String>), String> {
        self.backend
            .ensure_started()
            .await
            .map_err(|e| format!("I encountered an error: {e}"))?;

        let session_id = self
            .backend
            .create_session(title)
            .await
            .map_err(|e| format!("I encountered an error: {e}"))?;

        match self.backend.share_session(&session_id).await {
            Ok(share_url) => {
                self.sessions.put(ThreadSession {
                    thread_id: thread_id.to_string(),
                    backend_session_id: session_id.clone(),
                    share_url: Some(share_url.clone()),
                    created_at_secs: now_secs(),
                });
                Ok((session_id, Some(share_url)))
            }
            Err(BackendError::ShareFailed { attempts, last_error }) => {
                error!(attempts, last_error, "share_session exhausted retries; restarting backend");
                let _ = self.backend.restart().await;
                Err("I encountered an error: backend is unhealthy and was restarted, please retry".to_string())
            }
            Err(e) => Err(format!("I encountered an error: {e}")),
        }
    }
}

fn derive_title(channel: Option<&str>, message: &str) -> String {
    let prefix = channel.unwrap_or("direct");
    let snippet: String = message.chars().take(30).collect();
    format!("{prefix}: {snippet}")
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::types::Attachment;

    fn coordinator(reply: &str) -> AgentCoordinator {
        let backend = MockBackend::with_reply(reply.to_string());
        AgentCoordinator::new(
            backend,
            Arc::new(ThreadSessionRegistry::new()),
            PromptBuilder::load(None),
            "fern",
        )
    }

    fn input(thread_id: &str, message: &str) -> RunTurnInput {
        RunTurnInput {
            thread_id: thread_id.to_string(),
            message: message.to_string(),
            channel: Some("whatsapp".to_string()),
            channel_user_id: Some("+15551234567".to_string()),
            attachments: Vec::new(),
            agent_type: None,
        }
    }

    #[tokio::test]
    async fn run_turn_returns_assistant_response() {
        let coord = coordinator("hi there");
        let out = coord.run_turn(input("t1", "hello")).await;
        assert_eq!(out.response, "hi there");
        assert_eq!(out.thread_id, "t1");
    }

    #[tokio::test]
    async fn second_turn_reuses_thread_session() {
        let coord = coordinator("reply");
        coord.run_turn(input("t1", "first")).await;
        let session_after_first = coord.sessions.get("t1").unwrap().backend_session_id;
        coord.run_turn(input("t1", "second")).await;
        let session_after_second = coord.sessions.get("t1").unwrap().backend_session_id;
        assert_eq!(session_after_first, session_after_second);
    }

    #[tokio::test]
    async fn concurrent_threads_do_not_cross_talk() {
        let coord = Arc::new(coordinator("ok"));
        let c1 = coord.clone();
        let c2 = coord.clone();
        let (r1, r2) = tokio::join!(
            c1.run_turn(input("thread-a", "a message")),
            c2.run_turn(input("thread-b", "b message")),
        );
        assert_eq!(r1.thread_id, "thread-a");
        assert_eq!(r2.thread_id, "thread-b");
        assert_eq!(r1.response, "ok");
        assert_eq!(r2.response, "ok");
    }

    #[tokio::test]
    async fn non_image_attachments_are_dropped() {
        let coord = coordinator("ok");
        let mut inp = input("t1", "hello");
        inp.attachments.push(Attachment {
            mime_type: "application/pdf".to_string(),
            data_base64: "deadbeef".to_string(),
        });
        let out = coord.run_turn(inp).await;
        assert_eq!(out.response, "ok");
    }
}
