use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::types::{ChannelCapabilities, ChannelStatus, OutboundMessage};

/// Writes every outbound send to the tracing log. Always reports
/// [`ChannelStatus::Connected`] — there is no real transport to fail.
/// Useful for local development and as a default adapter when no real
/// channel credentials are configured.
pub struct LoggingChannel {
    name: String,
    capabilities: ChannelCapabilities,
}

impl LoggingChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: ChannelCapabilities {
                markdown: true,
                streaming: false,
                max_message_length: 4096,
                supports_attachments: false,
                supports_reply: false,
            },
        }
    }
}

#[async_trait]
impl Channel for LoggingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        info!(channel = %self.name, recipient = %msg.recipient_id, content = %msg.content, "outbound message");
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus::Connected
    }

    fn capabilities(&self) -> ChannelCapabilities {
        self.capabilities
    }
}

/// Buffers every send in memory instead of delivering it anywhere, for test
/// assertions. Not a real transport.
pub struct LoopbackChannel {
    name: String,
    capabilities: ChannelCapabilities,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl LoopbackChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: ChannelCapabilities {
                markdown: true,
                streaming: false,
                max_message_length: 4096,
                supports_attachments: false,
                supports_reply: false,
            },
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ChannelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// All messages sent so far, in delivery order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for LoopbackChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        ChannelStatus::Connected
    }

    fn capabilities(&self) -> ChannelCapabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageFormat;

    #[tokio::test]
    async fn loopback_records_sends_in_order() {
        let channel = LoopbackChannel::new("test");
        for i in 0..3 {
            channel
                .send(&OutboundMessage {
                    channel: "test".to_string(),
                    recipient_id: "u1".to_string(),
                    content: format!("message {i}"),
                    format: MessageFormat::PlainText,
                })
                .await
                .unwrap();
        }
        let sent = channel.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].content, "message 0");
        assert_eq!(sent[2].content, "message 2");
    }

    #[tokio::test]
    async fn logging_channel_always_reports_connected() {
        let mut channel = LoggingChannel::new("log");
        assert!(matches!(channel.status(), ChannelStatus::Connected));
        channel.connect().await.unwrap();
        assert!(matches!(channel.status(), ChannelStatus::Connected));
    }
}
