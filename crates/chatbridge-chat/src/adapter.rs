//! ChatAdapter (C8, §4.7): the minimal capability set the core scheduler and
//! orchestrator need from a chat platform, abstracted behind one trait so
//! Slack and Discord are interchangeable from their point of view.

use async_trait::async_trait;

use crate::error::Result;

/// A reaction the bot may add; the reconciling update in the orchestrator
/// removes anything in this set that doesn't match the target status and
/// adds whichever one does (§4.7, §6 "Emoji constants").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEmoji {
    Hourglass,
    Eyes,
    CheckMark,
    RaisedHand,
    CrossMark,
}

impl StatusEmoji {
    /// Slack uses the bare emoji name; Discord adapters translate this to
    /// the Unicode glyph at the call site.
    pub fn slack_name(&self) -> &'static str {
        match self {
            StatusEmoji::Hourglass => "hourglass",
            StatusEmoji::Eyes => "eyes",
            StatusEmoji::CheckMark => "white_check_mark",
            StatusEmoji::RaisedHand => "raised_hand",
            StatusEmoji::CrossMark => "x",
        }
    }

    pub fn discord_glyph(&self) -> &'static str {
        match self {
            StatusEmoji::Hourglass => "⌛",
            StatusEmoji::Eyes => "👀",
            StatusEmoji::CheckMark => "✅",
            StatusEmoji::RaisedHand => "✋",
            StatusEmoji::CrossMark => "❌",
        }
    }
}

/// A posted message, opaque outside the adapter that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_key: String,
}

/// A reaction observed on a message, as reported by `get_reactions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub name: String,
    pub user_ids: Vec<String>,
}

#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Posts `text` to `channel`, optionally inside an existing thread.
    /// Platform message-length limits are enforced by the caller via
    /// [`truncate_for_platform`].
    async fn post_message(
        &self,
        channel: &str,
        thread_key: Option<&str>,
        text: &str,
    ) -> Result<MessageRef>;

    async fn add_reaction(&self, channel: &str, message_key: &str, emoji: StatusEmoji) -> Result<()>;
    async fn remove_reaction(&self, channel: &str, message_key: &str, emoji: StatusEmoji) -> Result<()>;
    async fn get_reactions(&self, channel: &str, message_key: &str) -> Result<Vec<Reaction>>;

    /// Discord-only: creates a thread off `message_key` in `channel`. Slack
    /// adapters use native thread semantics and never need this — the
    /// default implementation returns the channel unchanged.
    async fn create_thread(&self, channel: &str, message_key: &str, name: &str) -> Result<String> {
        let _ = (message_key, name);
        Ok(channel.to_string())
    }

    /// Slack-only: resolves `<@U123>`-style mentions to display names.
    /// Pass-through by default (Discord never calls this).
    async fn resolve_mentions(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }

    async fn permalink(&self, channel: &str, message_key: &str) -> Result<String>;

    /// Used to filter the bot's own reactions out of inbound reaction events.
    fn bot_user_id(&self) -> &str;
}

/// Discord's hard per-message character cap (§8 B1); Slack has no equivalent
/// limit worth enforcing here.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Truncates `text` to `limit` bytes, replacing the tail with a 3-byte
/// ellipsis so the total never exceeds `limit` (§8 B1).
pub fn truncate_for_platform(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut cut = limit.saturating_sub(3);
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

/// Replaces a blank/whitespace-only message with the documented fallback
/// (§8 B2).
pub fn with_empty_fallback(text: &str) -> String {
    if text.trim().is_empty() {
        "(agent sent empty response)".to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_text_under_limit_with_ellipsis() {
        let text = "a".repeat(2010);
        let truncated = truncate_for_platform(&text, DISCORD_MESSAGE_LIMIT);
        assert_eq!(truncated.len(), DISCORD_MESSAGE_LIMIT);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn truncate_is_a_no_op_under_the_limit() {
        let text = "short message";
        assert_eq!(truncate_for_platform(text, DISCORD_MESSAGE_LIMIT), text);
    }

    #[test]
    fn empty_fallback_replaces_blank_text() {
        assert_eq!(with_empty_fallback("   "), "(agent sent empty response)");
        assert_eq!(with_empty_fallback("hi"), "hi");
    }
}
