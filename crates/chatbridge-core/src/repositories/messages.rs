//! ProcessedMessages repository.

use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::error::{Error, Result};
use crate::ids::{IntegrationId, JobId, OrgId, ProcessedMessageId};
use crate::models::{MessageStatus, ProcessedMessage};
use crate::tx;

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    job_id: String,
    org_id: String,
    integration_id: String,
    status: MessageStatus,
    text_content: String,
    message_key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Result<ProcessedMessage> {
        Ok(ProcessedMessage {
            id: ProcessedMessageId::parse(&self.id)?,
            job_id: JobId::parse(&self.job_id)?,
            org_id: OrgId::parse(&self.org_id)?,
            integration_id: IntegrationId::parse(&self.integration_id)?,
            status: self.status,
            text_content: self.text_content,
            message_key: self.message_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct MessagesRepository {
    db: Database,
}

impl MessagesRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new ProcessedMessage. Idempotent on `(integration_id,
    /// message_key)` (R3): if a message with this key already exists for
    /// this integration, that existing row is returned unchanged instead of
    /// inserting a duplicate.
    pub async fn create(&self, message: ProcessedMessage) -> Result<ProcessedMessage> {
        tx::execute(
            &self.db,
            sqlx::query(
                "INSERT INTO processed_messages (id, job_id, org_id, integration_id, status, text_content, message_key, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT (integration_id, message_key) DO NOTHING",
            )
            .bind(message.id.as_str())
            .bind(message.job_id.as_str())
            .bind(message.org_id.as_str())
            .bind(message.integration_id.as_str())
            .bind(message.status)
            .bind(&message.text_content)
            .bind(&message.message_key)
            .bind(message.created_at),
        )
        .await?;

        self.get_by_key(&message.org_id, &message.integration_id, &message.message_key)
            .await?
            .ok_or_else(|| Error::InvariantViolation("processed message vanished after insert".into()))
    }

    pub async fn get_by_key(
        &self,
        org_id: &OrgId,
        integration_id: &IntegrationId,
        message_key: &str,
    ) -> Result<Option<ProcessedMessage>> {
        let row: Option<MessageRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as(
                "SELECT * FROM processed_messages WHERE org_id = ?1 AND integration_id = ?2 AND message_key = ?3",
            )
            .bind(org_id.as_str())
            .bind(integration_id.as_str())
            .bind(message_key),
        )
        .await?;
        row.map(MessageRow::into_message).transpose()
    }

    pub async fn get_by_id(
        &self,
        org_id: &OrgId,
        id: &ProcessedMessageId,
    ) -> Result<Option<ProcessedMessage>> {
        let row: Option<MessageRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as("SELECT * FROM processed_messages WHERE id = ?1 AND org_id = ?2")
                .bind(id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        row.map(MessageRow::into_message).transpose()
    }

    pub async fn by_job_and_status(
        &self,
        org_id: &OrgId,
        job_id: &JobId,
        status: MessageStatus,
    ) -> Result<Vec<ProcessedMessage>> {
        let rows: Vec<MessageRow> = tx::fetch_all(
            &self.db,
            sqlx::query_as(
                "SELECT * FROM processed_messages WHERE org_id = ?1 AND job_id = ?2 AND status = ?3 ORDER BY created_at ASC",
            )
            .bind(org_id.as_str())
            .bind(job_id.as_str())
            .bind(status),
        )
        .await?;
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    pub async fn latest_for_job(
        &self,
        org_id: &OrgId,
        job_id: &JobId,
    ) -> Result<Option<ProcessedMessage>> {
        let row: Option<MessageRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as(
                "SELECT * FROM processed_messages WHERE org_id = ?1 AND job_id = ?2 ORDER BY created_at DESC LIMIT 1",
            )
            .bind(org_id.as_str())
            .bind(job_id.as_str()),
        )
        .await?;
        row.map(MessageRow::into_message).transpose()
    }

    /// Conditional `QUEUED -> IN_PROGRESS` update (§4.5.4): the `WHERE
    /// status = 'QUEUED'` clause makes two concurrent drainers mutually
    /// exclusive — at most one UPDATE affects a row; the other is a no-op.
    pub async fn mark_in_progress_if_queued(
        &self,
        org_id: &OrgId,
        id: &ProcessedMessageId,
    ) -> Result<bool> {
        let result = tx::execute(
            &self.db,
            sqlx::query(
                "UPDATE processed_messages SET status = 'IN_PROGRESS', updated_at = ?1 WHERE id = ?2 AND org_id = ?3 AND status = 'QUEUED'",
            )
            .bind(Utc::now())
            .bind(id.as_str())
            .bind(org_id.as_str()),
        )
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_status(
        &self,
        org_id: &OrgId,
        id: &ProcessedMessageId,
        status: MessageStatus,
    ) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query("UPDATE processed_messages SET status = ?1, updated_at = ?2 WHERE id = ?3 AND org_id = ?4")
                .bind(status)
                .bind(Utc::now())
                .bind(id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_for_job(&self, org_id: &OrgId, job_id: &JobId) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query("DELETE FROM processed_messages WHERE job_id = ?1 AND org_id = ?2")
                .bind(job_id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        Ok(())
    }
}
