//! Integration entity: one installation of the bot into one workspace (§3).
//!
//! OAuth itself is explicitly out of scope (§1); this module only holds the
//! resulting record the rest of the system reads.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::ids::{IntegrationId, OrgId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChatPlatform {
    Slack,
    Discord,
}

#[derive(Debug, Clone, Serialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub org_id: OrgId,
    pub platform: ChatPlatform,
    /// Slack team ID or Discord guild ID.
    pub workspace_id: String,
    #[serde(skip_serializing)]
    pub bot_token: SecretString,
    pub created_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(
        org_id: OrgId,
        platform: ChatPlatform,
        workspace_id: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Self {
        Self {
            id: IntegrationId::new(),
            org_id,
            platform,
            workspace_id: workspace_id.into(),
            bot_token: SecretString::new(bot_token.into()),
            created_at: Utc::now(),
        }
    }

    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }
}

impl PartialEq for Integration {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
