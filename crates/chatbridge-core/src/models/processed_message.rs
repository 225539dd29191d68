//! ProcessedMessage entity: one accepted inbound chat message within a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{IntegrationId, JobId, OrgId, ProcessedMessageId};

/// State machine for a ProcessedMessage (§4.5.5).
///
/// `Queued -> InProgress -> Completed`, or `-> Failed` from any non-terminal
/// state. `Completed`/`Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Queued => "QUEUED",
            MessageStatus::InProgress => "IN_PROGRESS",
            MessageStatus::Completed => "COMPLETED",
            MessageStatus::Failed => "FAILED",
        }
    }

    /// Validate a transition against the admissible-edges table (§4.5.5).
    pub fn can_transition_to(&self, target: MessageStatus) -> bool {
        use MessageStatus::*;
        match (self, target) {
            (Queued, InProgress) => true,
            (InProgress, Completed) => true,
            (s, Failed) if !s.is_terminal() => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    pub id: ProcessedMessageId,
    pub job_id: JobId,
    pub org_id: OrgId,
    pub integration_id: IntegrationId,
    pub status: MessageStatus,
    pub text_content: String,
    /// Idempotency key: `(integration_id, message_key)` is unique (R3).
    pub message_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessedMessage {
    pub fn new(
        job_id: JobId,
        org_id: OrgId,
        integration_id: IntegrationId,
        message_key: impl Into<String>,
        text_content: impl Into<String>,
        status: MessageStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProcessedMessageId::new(),
            job_id,
            org_id,
            integration_id,
            status,
            text_content: text_content.into(),
            message_key: message_key.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status transition, enforcing the admissible-edges table.
    pub fn transition(&mut self, target: MessageStatus) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvariantViolation(format!(
                "processed message {} cannot transition {:?} -> {:?}",
                self.id, self.status, target
            )));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_further_transitions() {
        assert!(!MessageStatus::Completed.can_transition_to(MessageStatus::Failed));
        assert!(!MessageStatus::Failed.can_transition_to(MessageStatus::Completed));
    }

    #[test]
    fn queued_can_only_advance_to_in_progress_or_failed() {
        assert!(MessageStatus::Queued.can_transition_to(MessageStatus::InProgress));
        assert!(MessageStatus::Queued.can_transition_to(MessageStatus::Failed));
        assert!(!MessageStatus::Queued.can_transition_to(MessageStatus::Completed));
    }
}
