//! Jobs Service (C5, §4.4): a thin validating wrapper over `JobsRepository`.

use crate::database::Database;
use crate::error::{Error, Result};
use crate::ids::{JobId, OrgId};
use crate::models::{Job, JobPayload};
use crate::repositories::{JobCreation, JobsRepository, MessagesRepository};
use crate::tx::with_transaction;

#[derive(Clone)]
pub struct JobsService {
    db: Database,
    jobs: JobsRepository,
    messages: MessagesRepository,
}

impl JobsService {
    pub fn new(db: Database) -> Self {
        let jobs = JobsRepository::new(db.clone());
        let messages = MessagesRepository::new(db.clone());
        Self { db, jobs, messages }
    }

    fn validate_payload(payload: &JobPayload) -> Result<()> {
        if payload.thread_key().trim().is_empty() {
            return Err(Error::Validation("thread key must not be empty".into()));
        }
        Ok(())
    }

    /// `getOrCreateJobForThread` (§4.4): validates the payload, then
    /// delegates to the repository. Returns the `creationStatus` the
    /// orchestrator branches on (new conversation vs. reply).
    pub async fn get_or_create_for_thread(
        &self,
        org_id: &OrgId,
        payload: JobPayload,
    ) -> Result<(Job, JobCreation)> {
        Self::validate_payload(&payload)?;
        self.jobs.get_or_create_for_thread(org_id, payload).await
    }

    pub async fn get_by_thread(
        &self,
        org_id: &OrgId,
        job_type: crate::models::JobType,
        integration_id: &crate::ids::IntegrationId,
        thread_key: &str,
    ) -> Result<Option<Job>> {
        self.jobs.get_by_thread(org_id, job_type, integration_id, thread_key).await
    }

    pub async fn get_by_id(&self, org_id: &OrgId, job_id: &JobId) -> Result<Option<Job>> {
        self.jobs.get_by_id(org_id, job_id).await
    }

    pub async fn touch(&self, org_id: &OrgId, job_id: &JobId) -> Result<()> {
        self.jobs.touch(org_id, job_id).await
    }

    pub async fn idle_jobs(&self, org_id: &OrgId, idle_minutes: i64) -> Result<Vec<Job>> {
        self.jobs.idle_jobs(org_id, idle_minutes).await
    }

    pub async fn with_queued_messages(
        &self,
        org_id: &OrgId,
        job_type: crate::models::JobType,
        integration_id: &crate::ids::IntegrationId,
        limit: i64,
    ) -> Result<Vec<Job>> {
        self.jobs.with_queued_messages(org_id, job_type, integration_id, limit).await
    }

    pub async fn integrations_with_jobs(&self, org_id: &OrgId) -> Result<Vec<crate::ids::IntegrationId>> {
        self.jobs.integrations_with_jobs(org_id).await
    }

    /// Transactional delete (§4.4): removes all ProcessedMessages for the
    /// job, then the job row, inside one transaction. Idempotent (R1): a
    /// second call on the same id is a no-op success.
    pub async fn delete_job(&self, org_id: &OrgId, job_id: &JobId) -> Result<()> {
        with_transaction(&self.db, || async {
            self.messages.delete_for_job(org_id, job_id).await?;
            self.jobs.delete(org_id, job_id).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IntegrationId;
    use crate::models::SlackPayload;

    async fn setup() -> (JobsService, OrgId, IntegrationId) {
        let db = Database::in_memory().await.unwrap();
        let org_id = OrgId::new();
        let integration_id = IntegrationId::new();
        sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?1, 'x', ?2)")
            .bind(org_id.as_str())
            .bind(chrono::Utc::now())
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO integrations (id, org_id, platform, workspace_id, bot_token, created_at) VALUES (?1, ?2, 'slack', 'T1', 'tok', ?3)",
        )
        .bind(integration_id.as_str())
        .bind(org_id.as_str())
        .bind(chrono::Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
        (JobsService::new(db), org_id, integration_id)
    }

    fn slack_payload(integration_id: &IntegrationId, thread_ts: &str) -> JobPayload {
        JobPayload::Slack(SlackPayload {
            thread_ts: thread_ts.to_string(),
            channel_id: "C1".to_string(),
            user_id: "U1".to_string(),
            integration_id: integration_id.clone(),
        })
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_on_thread_key() {
        let (service, org_id, integration_id) = setup().await;
        let (job1, status1) = service
            .get_or_create_for_thread(&org_id, slack_payload(&integration_id, "1700000000.000100"))
            .await
            .unwrap();
        assert_eq!(status1, JobCreation::Created);

        let (job2, status2) = service
            .get_or_create_for_thread(&org_id, slack_payload(&integration_id, "1700000000.000100"))
            .await
            .unwrap();
        assert_eq!(status2, JobCreation::Existing);
        assert_eq!(job1.id, job2.id);
    }

    #[tokio::test]
    async fn rejects_empty_thread_key() {
        let (service, org_id, integration_id) = setup().await;
        let result = service
            .get_or_create_for_thread(&org_id, slack_payload(&integration_id, ""))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn delete_job_is_idempotent() {
        let (service, org_id, integration_id) = setup().await;
        let (job, _) = service
            .get_or_create_for_thread(&org_id, slack_payload(&integration_id, "ts-1"))
            .await
            .unwrap();

        service.delete_job(&org_id, &job.id).await.unwrap();
        service.delete_job(&org_id, &job.id).await.unwrap();
        assert!(service.get_by_id(&org_id, &job.id).await.unwrap().is_none());
    }
}
