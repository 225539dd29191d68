//! Normalized inbound events (§6): platform webhook payloads are mapped to
//! these before reaching the orchestrator, so the rest of the system never
//! sees a platform-specific shape.

use chatbridge_core::ids::{IntegrationId, OrgId};
use chatbridge_core::models::ChatPlatform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub platform: ChatPlatform,
    pub integration_id: IntegrationId,
    pub org_id: OrgId,
    pub user_id: String,
    pub channel_id: String,
    /// Present for thread replies; absent for a top-level mention.
    pub thread_key: Option<String>,
    /// Idempotency key: `(channel_id, ts)` for Slack, `(message_id,
    /// thread_id)` rendered as one string for Discord.
    pub message_key: String,
    pub text: String,
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub platform: ChatPlatform,
    pub integration_id: IntegrationId,
    pub org_id: OrgId,
    pub user_id: String,
    pub channel_id: String,
    pub message_key: String,
    pub thread_key: Option<String>,
    pub emoji_name: String,
}

/// The completion-reaction aliases recognized across both platforms (§4.6.2).
pub const COMPLETION_EMOJI_NAMES: &[&str] =
    &["white_check_mark", "heavy_check_mark", "white_tick", "✅"];

impl ReactionEvent {
    pub fn is_completion_reaction(&self) -> bool {
        COMPLETION_EMOJI_NAMES.contains(&self.emoji_name.as_str())
    }
}
