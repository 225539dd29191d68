//! Jobs repository.

use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::error::{Error, Result};
use crate::ids::{IntegrationId, JobId, OrgId};
use crate::models::{DiscordPayload, Job, JobPayload, JobType, SlackPayload};
use crate::tx;

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    org_id: String,
    job_type: String,
    integration_id: String,
    thread_key: String,
    channel_id: String,
    user_id: String,
    origin_channel_id: Option<String>,
    origin_message_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let integration_id = IntegrationId::parse(&self.integration_id)?;
        let payload = match self.job_type.as_str() {
            "slack" => JobPayload::Slack(SlackPayload {
                thread_ts: self.thread_key,
                channel_id: self.channel_id,
                user_id: self.user_id,
                integration_id,
            }),
            "discord" => JobPayload::Discord(DiscordPayload {
                message_id: self.origin_message_id.unwrap_or_default(),
                thread_id: self.thread_key,
                origin_channel_id: self.origin_channel_id.unwrap_or(self.channel_id),
                user_id: self.user_id,
                integration_id,
            }),
            other => {
                return Err(Error::InvariantViolation(format!(
                    "unknown job_type in database row: {other}"
                )))
            }
        };
        Ok(Job {
            id: JobId::parse(&self.id)?,
            org_id: OrgId::parse(&self.org_id)?,
            payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Whether `getOrCreateJobForThread` inserted a new row or found an existing
/// one (§4.4 — the orchestrator branches on this: new conversation vs reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCreation {
    Created,
    Existing,
}

#[derive(Clone)]
pub struct JobsRepository {
    db: Database,
}

impl JobsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, org_id: &OrgId, job_id: &JobId) -> Result<Option<Job>> {
        let row: Option<JobRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as("SELECT * FROM jobs WHERE id = ?1 AND org_id = ?2")
                .bind(job_id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        row.map(JobRow::into_job).transpose()
    }

    pub async fn get_by_thread(
        &self,
        org_id: &OrgId,
        job_type: JobType,
        integration_id: &IntegrationId,
        thread_key: &str,
    ) -> Result<Option<Job>> {
        let row: Option<JobRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as(
                "SELECT * FROM jobs WHERE org_id = ?1 AND job_type = ?2 AND integration_id = ?3 AND thread_key = ?4",
            )
            .bind(org_id.as_str())
            .bind(job_type.as_str())
            .bind(integration_id.as_str())
            .bind(thread_key),
        )
        .await?;
        row.map(JobRow::into_job).transpose()
    }

    /// `getOrCreateJobForThread` (§4.2): look up by the uniqueness key; if
    /// absent, insert and report `Created`. Safe under concurrent
    /// first-mention via `INSERT ... ON CONFLICT DO NOTHING` followed by a
    /// re-select, so two racing inserts deterministically agree on one row.
    pub async fn get_or_create_for_thread(
        &self,
        org_id: &OrgId,
        payload: JobPayload,
    ) -> Result<(Job, JobCreation)> {
        let job_type = payload.job_type();
        let integration_id = payload.integration_id().clone();
        let thread_key = payload.thread_key().to_string();

        if let Some(existing) = self
            .get_by_thread(org_id, job_type, &integration_id, &thread_key)
            .await?
        {
            return Ok((existing, JobCreation::Existing));
        }

        let job = Job::new(org_id.clone(), payload);
        let (origin_channel_id, origin_message_id) = match &job.payload {
            JobPayload::Discord(p) => (
                Some(p.origin_channel_id.clone()),
                Some(p.message_id.clone()),
            ),
            JobPayload::Slack(_) => (None, None),
        };

        tx::execute(
            &self.db,
            sqlx::query(
                "INSERT INTO jobs (id, org_id, job_type, integration_id, thread_key, channel_id, user_id, origin_channel_id, origin_message_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                 ON CONFLICT (job_type, integration_id, thread_key) DO NOTHING",
            )
            .bind(job.id.as_str())
            .bind(job.org_id.as_str())
            .bind(job.job_type().as_str())
            .bind(job.integration_id().as_str())
            .bind(&thread_key)
            .bind(job.payload.channel_id())
            .bind(job.payload.user_id())
            .bind(origin_channel_id)
            .bind(origin_message_id)
            .bind(job.created_at),
        )
        .await?;

        // Either we inserted it, or a concurrent caller won the race — in
        // both cases the row that now exists is the one to return.
        let row = self
            .get_by_thread(org_id, job_type, &integration_id, &thread_key)
            .await?
            .ok_or_else(|| Error::InvariantViolation("job vanished after insert".into()))?;
        let creation = if row.id == job.id {
            JobCreation::Created
        } else {
            JobCreation::Existing
        };
        Ok((row, creation))
    }

    pub async fn touch(&self, org_id: &OrgId, job_id: &JobId) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query("UPDATE jobs SET updated_at = ?1 WHERE id = ?2 AND org_id = ?3")
                .bind(Utc::now())
                .bind(job_id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        Ok(())
    }

    /// Idempotent delete: returns `Ok(())` whether or not the row existed.
    pub async fn delete(&self, org_id: &OrgId, job_id: &JobId) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query("DELETE FROM jobs WHERE id = ?1 AND org_id = ?2")
                .bind(job_id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        Ok(())
    }

    /// `getJobsWithQueuedMessages` (§4.2): jobs with ≥1 QUEUED message,
    /// bounded by `limit`.
    pub async fn with_queued_messages(
        &self,
        org_id: &OrgId,
        job_type: JobType,
        integration_id: &IntegrationId,
        limit: i64,
    ) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = tx::fetch_all(
            &self.db,
            sqlx::query_as(
                "SELECT DISTINCT j.* FROM jobs j
                 JOIN processed_messages m ON m.job_id = j.id
                 WHERE j.org_id = ?1 AND j.job_type = ?2 AND j.integration_id = ?3 AND m.status = 'QUEUED'
                 ORDER BY j.created_at ASC
                 LIMIT ?4",
            )
            .bind(org_id.as_str())
            .bind(job_type.as_str())
            .bind(integration_id.as_str())
            .bind(limit),
        )
        .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// `getIdleJobs` (§4.2, §9): DB-side filter — `updated_at` older than the
    /// idle window AND no QUEUED/IN_PROGRESS message outstanding.
    pub async fn idle_jobs(&self, org_id: &OrgId, idle_minutes: i64) -> Result<Vec<Job>> {
        let cutoff = Utc::now() - chrono::Duration::minutes(idle_minutes);
        let rows: Vec<JobRow> = tx::fetch_all(
            &self.db,
            sqlx::query_as(
                "SELECT * FROM jobs j
                 WHERE j.org_id = ?1 AND j.updated_at < ?2
                 AND NOT EXISTS (
                    SELECT 1 FROM processed_messages m
                    WHERE m.job_id = j.id AND m.status IN ('QUEUED', 'IN_PROGRESS')
                 )",
            )
            .bind(org_id.as_str())
            .bind(cutoff),
        )
        .await?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    /// All integration IDs with at least one job, scoped to the org. Used by
    /// the scheduler to iterate "for every integration" (§4.5.2).
    pub async fn integrations_with_jobs(&self, org_id: &OrgId) -> Result<Vec<IntegrationId>> {
        let ids: Vec<(String,)> = tx::fetch_all(
            &self.db,
            sqlx::query_as("SELECT DISTINCT integration_id FROM jobs WHERE org_id = ?1")
                .bind(org_id.as_str()),
        )
        .await?;
        ids.into_iter().map(|(id,)| IntegrationId::parse(&id)).collect()
    }
}
