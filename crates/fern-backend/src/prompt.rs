use tracing::warn;

use crate::types::ToolDescriptor;

/// Builds the system prompt injected into every turn: persona text, the
/// tool list the backend just reported, and a channel-specific section.
pub struct PromptBuilder {
    soul: String,
}

impl PromptBuilder {
    /// Load persona text from `soul_path`, falling back to a built-in
    /// default when unset or unreadable.
    pub fn load(soul_path: Option<&str>) -> Self {
        let soul = soul_path
            .and_then(|p| {
                std::fs::read_to_string(p)
                    .map_err(|e| warn!(path = p, error = %e, "failed to load persona file"))
                    .ok()
            })
            .unwrap_or_else(default_soul);
        Self { soul }
    }

    /// Substitute the tool list and a channel-specific section into the
    /// persona template for one turn.
    pub fn build(&self, tools: &[ToolDescriptor], channel: Option<&str>, channel_user_id: Option<&str>, thread_id: &str) -> String {
        let mut out = self.soul.clone();

        if !tools.is_empty() {
            out.push_str("\n\n## Available tools\n");
            for tool in tools {
                out.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            }
        }

        out.push_str(&format!("\n\n## Context\nThread: {thread_id}\n"));
        if let Some(channel) = channel {
            out.push_str(&format!("Channel: {channel}\n"));
            if let Some(user) = channel_user_id {
                out.push_str(&format!("Channel user: {user}\n"));
            }
        }

        out
    }
}

fn default_soul() -> String {
    "You are Fern, a helpful personal assistant. Be concise and friendly."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_includes_tools_and_channel_section() {
        let builder = PromptBuilder::load(None);
        let tools = vec![ToolDescriptor {
            name: "read".into(),
            description: "read a file".into(),
        }];
        let prompt = builder.build(&tools, Some("whatsapp"), Some("+1555"), "t1");
        assert!(prompt.contains("read: read a file"));
        assert!(prompt.contains("Channel: whatsapp"));
        assert!(prompt.contains("Channel user: +1555"));
        assert!(prompt.contains("Thread: t1"));
    }

    #[test]
    fn build_without_channel_omits_section() {
        let builder = PromptBuilder::load(None);
        let prompt = builder.build(&[], None, None, "t1");
        assert!(!prompt.contains("Channel:"));
    }
}
