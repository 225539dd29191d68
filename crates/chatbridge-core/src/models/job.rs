//! Job entity: the unit of work tied to one chat thread (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{IntegrationId, JobId, OrgId};

/// Which chat platform a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Slack,
    Discord,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Slack => "slack",
            JobType::Discord => "discord",
        }
    }
}

/// Slack-specific thread anchor. `thread_ts` is the thread-key (§3, §9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackPayload {
    pub thread_ts: String,
    pub channel_id: String,
    pub user_id: String,
    pub integration_id: IntegrationId,
}

/// Discord-specific thread anchor.
///
/// `thread_id` is always the created thread-channel's ID (never the
/// originating channel ID for top-level messages) per the Open Question
/// resolution in SPEC_FULL.md; `origin_channel_id` keeps the channel the
/// triggering message was posted in, for reaction routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordPayload {
    pub message_id: String,
    pub thread_id: String,
    pub origin_channel_id: String,
    pub user_id: String,
    pub integration_id: IntegrationId,
}

/// The payload xor (I2): exactly one platform-specific variant is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobPayload {
    Slack(SlackPayload),
    Discord(DiscordPayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::Slack(_) => JobType::Slack,
            JobPayload::Discord(_) => JobType::Discord,
        }
    }

    pub fn integration_id(&self) -> &IntegrationId {
        match self {
            JobPayload::Slack(p) => &p.integration_id,
            JobPayload::Discord(p) => &p.integration_id,
        }
    }

    /// The thread-key used for the uniqueness constraint and all lookups.
    pub fn thread_key(&self) -> &str {
        match self {
            JobPayload::Slack(p) => &p.thread_ts,
            JobPayload::Discord(p) => &p.thread_id,
        }
    }

    /// The channel the top-level / triggering message lives in, for posting
    /// replies and routing reactions.
    pub fn channel_id(&self) -> &str {
        match self {
            JobPayload::Slack(p) => &p.channel_id,
            JobPayload::Discord(p) => &p.origin_channel_id,
        }
    }

    /// The message key of the top-level message that started this job —
    /// distinct from `thread_key` on Discord, where the thread key is the
    /// created thread-channel's own id, not the originating message's id.
    pub fn top_level_message_key(&self) -> &str {
        match self {
            JobPayload::Slack(p) => &p.thread_ts,
            JobPayload::Discord(p) => &p.message_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            JobPayload::Slack(p) => &p.user_id,
            JobPayload::Discord(p) => &p.user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub org_id: OrgId,
    pub payload: JobPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(org_id: OrgId, payload: JobPayload) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            org_id,
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn job_type(&self) -> JobType {
        self.payload.job_type()
    }

    pub fn integration_id(&self) -> &IntegrationId {
        self.payload.integration_id()
    }

    pub fn thread_key(&self) -> &str {
        self.payload.thread_key()
    }

    pub fn top_level_message_key(&self) -> &str {
        self.payload.top_level_message_key()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
