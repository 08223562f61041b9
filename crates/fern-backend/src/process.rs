use std::net::TcpListener;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::json;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, instrument, warn};

use crate::backend::LlmBackend;
use crate::error::{BackendError, Result};
use crate::types::{BackendEvent, BackendMessage, PromptPart, ToolDescriptor};

const PORT_RANGE_START: u16 = 4096;
const PORT_RANGE_END: u16 = 4300;
const PORT_SCAN_ATTEMPTS: u32 = 100;
const TOOL_DISCOVERY_ATTEMPTS: u32 = 10;
const TOOL_DISCOVERY_DELAY: Duration = Duration::from_millis(300);
const SHARE_ATTEMPTS: u32 = 10;
const SHARE_DELAY: Duration = Duration::from_secs(1);

/// Drives an opaque LLM backend running as a local subprocess. Responsible
/// only for the integration surface around that process — not for the
/// backend's own prompt/model behavior, which is entirely out of scope.
pub struct ProcessBackend {
    command: String,
    args: Vec<String>,
    storage_path: String,
    http: reqwest::Client,
    state: Mutex<Option<RunningState>>,
}

struct RunningState {
    child: Child,
    base_url: String,
}

impl ProcessBackend {
    pub fn new(command: impl Into<String>, args: Vec<String>, storage_path: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args,
            storage_path: storage_path.into(),
            http: reqwest::Client::new(),
            state: Mutex::new(None),
        }
    }

    fn find_free_port() -> Result<u16> {
        for attempt in 0..PORT_SCAN_ATTEMPTS {
            let port = PORT_RANGE_START + (attempt as u16 % (PORT_RANGE_END - PORT_RANGE_START + 1));
            if TcpListener::bind(("127.0.0.1", port)).is_ok() {
                return Ok(port);
            }
        }
        Err(BackendError::NoFreePort {
            attempts: PORT_SCAN_ATTEMPTS,
        })
    }

    /// Restart the backend: kill the current process (if any), clean stale
    /// storage, relaunch on a freshly scanned port. Called after a
    /// `BackendUnhealthy` condition (e.g. `share_session` exhausted retries).
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if let Some(mut running) = state.take() {
                let _ = running.child.start_kill();
            }
        }
        let stale = format!("{}/run.lock", self.storage_path);
        let _ = tokio::fs::remove_file(&stale).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        self.ensure_started().await
    }

    async fn base_url(&self) -> Result<String> {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|s| s.base_url.clone())
            .ok_or_else(|| BackendError::Unavailable("backend process not started".into()))
    }
}

#[async_trait]
impl LlmBackend for ProcessBackend {
    async fn restart(&self) -> Result<()> {
        self.reset().await
    }

    #[instrument(skip(self))]
    async fn ensure_started(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.is_some() {
                return Ok(());
            }
        }

        let port = Self::find_free_port()?;
        let base_url = format!("http://127.0.0.1:{port}");

        info!(port, command = %self.command, "launching backend process");
        let child = Command::new(&self.command)
            .args(&self.args)
            .env("PORT", port.to_string())
            .env("STORAGE_PATH", &self.storage_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::StartupFailed(e.to_string()))?;

        {
            let mut state = self.state.lock().await;
            *state = Some(RunningState { child, base_url });
        }

        // Tool registration is asynchronous inside the backend; poll until
        // at least a response is served, or give up.
        for attempt in 0..TOOL_DISCOVERY_ATTEMPTS {
            if self.list_tools().await.is_ok() {
                return Ok(());
            }
            if attempt + 1 < TOOL_DISCOVERY_ATTEMPTS {
                tokio::time::sleep(TOOL_DISCOVERY_DELAY).await;
            }
        }
        warn!("backend did not report tools within the discovery window; continuing anyway");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_session(&self, title: &str) -> Result<String> {
        let base = self.base_url().await?;
        let resp: serde_json::Value = self
            .http
            .post(format!("{base}/sessions"))
            .json(&json!({ "title": title }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        resp.get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| BackendError::Parse("missing session id in response".into()))
    }

    #[instrument(skip(self))]
    async fn share_session(&self, session_id: &str) -> Result<String> {
        let base = self.base_url().await?;
        let mut last_error = String::new();

        for attempt in 0..SHARE_ATTEMPTS {
            match self
                .http
                .post(format!("{base}/sessions/{session_id}/share"))
                .send()
                .await
                .and_then(|r| r.error_for_status())
            {
                Ok(resp) => {
                    let value: serde_json::Value = resp.json().await?;
                    if let Some(url) = value.get("url").and_then(|v| v.as_str()) {
                        return Ok(url.to_string());
                    }
                    last_error = "missing url in share response".to_string();
                }
                Err(e) => last_error = e.to_string(),
            }
            if attempt + 1 < SHARE_ATTEMPTS {
                tokio::time::sleep(SHARE_DELAY).await;
            }
        }

        Err(BackendError::ShareFailed {
            attempts: SHARE_ATTEMPTS,
            last_error,
        })
    }

    #[instrument(skip(self, parts))]
    async fn prompt(&self, session_id: &str, parts: &[PromptPart], system: &str, agent: &str) -> Result<()> {
        let base = self.base_url().await?;
        self.http
            .post(format!("{base}/sessions/{session_id}/prompt"))
            .json(&json!({ "parts": parts, "system": system, "agent": agent }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BackendEvent>> {
        let base = self.base_url().await?;
        let (tx, rx) = mpsc::channel(256);
        let http = self.http.clone();

        tokio::spawn(async move {
            let response = match http.get(format!("{base}/events")).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "failed to open backend event stream");
                    return;
                }
            };
            let mut stream = response.bytes_stream();
            let mut buf = String::new();

            while let Some(chunk) = stream.next().await {
                let Ok(chunk) = chunk else { break };
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].to_string();
                    buf.drain(..=pos);
                    if let Some(data) = line.strip_prefix("data: ") {
                        if let Ok(event) = serde_json::from_str::<BackendEvent>(data) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    #[instrument(skip(self))]
    async fn session_messages(&self, session_id: &str) -> Result<Vec<BackendMessage>> {
        let base = self.base_url().await?;
        let messages = self
            .http
            .get(format!("{base}/sessions/{session_id}/messages"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let base = self.base_url().await?;
        self.http
            .delete(format!("{base}/sessions/{session_id}"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let base = self.base_url().await?;
        let tools = self
            .http
            .get(format!("{base}/tools"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tools)
    }
}

/// Shared handle type used throughout the gateway.
pub type SharedBackend = Arc<dyn LlmBackend>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_scan_finds_a_free_port_in_range() {
        let port = ProcessBackend::find_free_port().expect("a free port should exist");
        assert!((PORT_RANGE_START..=PORT_RANGE_END).contains(&port));
    }
}
