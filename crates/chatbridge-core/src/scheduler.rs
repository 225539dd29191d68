//! Scheduler / Dispatcher (C6, §4.5) — the heart of the system: assignment
//! policy, queueing, queue drain, idle reaper, disconnect reaper.
//!
//! The scheduler never talks to a chat platform or an agent socket directly
//! — those live one layer up, in the orchestrator and chat-adapter crates.
//! Instead it depends on two small trait objects supplied by the caller:
//! [`AgentTransport`] to deliver frames to a connected agent, and
//! [`JobNotifier`] to drive the reaction/system-notice side effects that
//! accompany a scheduling decision. This keeps the dispatch policy testable
//! in isolation and keeps this crate free of any HTTP or WebSocket
//! dependency, mirroring how the teacher keeps its executor core decoupled
//! from any specific CI provider.

use async_trait::async_trait;

use crate::database::Database;
use crate::error::{Error, Result};
use crate::ids::{AgentId, IntegrationId, JobId, OrgId};
use crate::models::{Job, JobPayload, JobType, MessageStatus};
use crate::protocol::OutboundFrame;
use crate::registry::AgentRegistry;
use crate::repositories::MessagesRepository;
use crate::tx::with_transaction;

/// Delivers an outbound frame to a specific connected agent.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send_frame(&self, ws_connection_id: &str, frame: OutboundFrame) -> Result<()>;
}

/// Side-effects a scheduling decision drives on the chat platform, kept
/// separate from the transport so each can be faked independently in tests.
#[async_trait]
pub trait JobNotifier: Send + Sync {
    /// Hourglass on the triggering message, eyes on the top-level message.
    async fn react_queued(&self, job: &Job) -> Result<()>;
    /// Eyes on the triggering message (now being worked).
    async fn react_processing(&self, job: &Job) -> Result<()>;
    /// "closed due to inactivity" system notice, cross-mark not implied.
    async fn notify_idle_closed(&self, job: &Job) -> Result<()>;
    /// Failure notice + cross-mark reaction for an abandoned job.
    async fn notify_abandoned(&self, job: &Job, reason: &str) -> Result<()>;
}

/// Outcome of `getOrAssignAgentForJob` / `tryAssignJobToAgent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The job already had (or was just given) an active assignment.
    Assigned(String),
    /// No idle agent was available; the job remains unassigned.
    NoAgentsAvailable,
}

#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    registry: AgentRegistry,
    messages: MessagesRepository,
}

impl Scheduler {
    pub fn new(db: Database) -> Self {
        let registry = AgentRegistry::new(db.clone());
        let messages = MessagesRepository::new(db.clone());
        Self { db, registry, messages }
    }

    /// `getOrAssignAgentForJob` (§4.5.2): if the job already has an active
    /// assignment, return its owner's socket id. Otherwise pick the earliest-
    /// connected idle agent (§4.5.3), create the assignment inside a
    /// transaction, and return its socket id. Fails with
    /// `Error::NoAgentsAvailable` if none are idle.
    pub async fn get_or_assign_agent_for_job(&self, org_id: &OrgId, job_id: &JobId) -> Result<String> {
        if let Some(assignment) = self.registry.assignment_for_job(org_id, job_id).await? {
            let agent = self
                .registry
                .agent_by_job(org_id, job_id)
                .await?
                .ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "assignment exists for job {} but its agent session is gone",
                        assignment.job_id
                    ))
                })?;
            return Ok(agent.ws_connection_id);
        }

        with_transaction(&self.db, || async {
            let mut idle = self.registry.idle_agents(org_id).await?;
            let agent = idle.drain(..).next().ok_or(Error::NoAgentsAvailable)?;
            self.registry
                .assign(agent.id.clone(), job_id.clone(), org_id.clone())
                .await?;
            Ok(agent.ws_connection_id)
        })
        .await
    }

    /// `tryAssignJobToAgent` (§4.5.2): non-blocking variant for the queue
    /// drainer — returns `NoAgentsAvailable` instead of an error so a caller
    /// iterating many jobs can move on to the next integration.
    pub async fn try_assign_job_to_agent(&self, org_id: &OrgId, job_id: &JobId) -> Result<AssignOutcome> {
        match self.get_or_assign_agent_for_job(org_id, job_id).await {
            Ok(ws_connection_id) => Ok(AssignOutcome::Assigned(ws_connection_id)),
            Err(Error::NoAgentsAvailable) => Ok(AssignOutcome::NoAgentsAvailable),
            Err(other) => Err(other),
        }
    }

    /// `queueMessage` (§4.5.2): mark the message `QUEUED`; react with the
    /// hourglass; do not send anything to an agent.
    pub async fn queue_message(
        &self,
        org_id: &OrgId,
        job: &Job,
        message_id: &crate::ids::ProcessedMessageId,
        notifier: &dyn JobNotifier,
    ) -> Result<()> {
        self.messages
            .update_status(org_id, message_id, MessageStatus::Queued)
            .await?;
        notifier.react_queued(job).await
    }

    /// `dispatch` (§4.5.2): mark `IN_PROGRESS`, send `startConversation` (new
    /// conversations) or `userMessage` (replies), react with eyes.
    pub async fn dispatch(
        &self,
        org_id: &OrgId,
        job: &Job,
        message_id: &crate::ids::ProcessedMessageId,
        ws_connection_id: &str,
        message_text: impl Into<String>,
        message_link: impl Into<String>,
        is_new_conversation: bool,
        transport: &dyn AgentTransport,
        notifier: &dyn JobNotifier,
    ) -> Result<()> {
        if !self.messages.mark_in_progress_if_queued(org_id, message_id).await? {
            // Another drainer already claimed this message; nothing to send.
            return Ok(());
        }

        let message = message_text.into();
        let message_link = message_link.into();
        let frame = if is_new_conversation {
            OutboundFrame::StartConversation {
                job_id: job.id.to_string(),
                message,
                processed_message_id: message_id.clone(),
                message_link,
            }
        } else {
            OutboundFrame::UserMessage {
                job_id: job.id.to_string(),
                message,
                processed_message_id: message_id.clone(),
                message_link,
            }
        };
        transport.send_frame(ws_connection_id, frame).await?;
        notifier.react_processing(job).await
    }

    /// `drainQueue` (§4.5.2): periodic. For every integration with queued
    /// work, attempt an assignment per job; on success, dispatch its
    /// `QUEUED` messages in arrival order. Stops early for an integration
    /// once no agents remain idle (`NoAgentsAvailable` short-circuits the
    /// rest of that integration's jobs, matching the FIFO/no-starvation
    /// intent of §4.5.4).
    pub async fn drain_queue<F, Fut>(
        &self,
        org_id: &OrgId,
        job_type: JobType,
        integration_id: &IntegrationId,
        limit: i64,
        jobs_with_queued: impl Fn() -> std::result::Result<Vec<Job>, Error>,
        dispatch_one: F,
    ) -> Result<usize>
    where
        F: Fn(Job, String) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let _ = (job_type, integration_id, limit);
        let jobs = jobs_with_queued()?;
        let mut dispatched = 0usize;
        for job in jobs {
            match self.try_assign_job_to_agent(org_id, &job.id).await? {
                AssignOutcome::Assigned(ws_connection_id) => {
                    dispatch_one(job, ws_connection_id).await?;
                    dispatched += 1;
                }
                AssignOutcome::NoAgentsAvailable => break,
            }
        }
        Ok(dispatched)
    }

    /// `reapIdle` (§4.5.2): the caller supplies the idle job list (scoped to
    /// one integration, per `getIdleJobs`) and a deletion closure so this
    /// crate stays free of the Jobs Service / chat-adapter wiring; this
    /// method contributes the transactional unassign-then-delete-then-notify
    /// sequencing and the per-job isolation (one job's reap failure does not
    /// abort the sweep).
    pub async fn reap_idle<D>(
        &self,
        jobs: Vec<Job>,
        notifier: &dyn JobNotifier,
        delete_job: D,
    ) -> Result<usize>
    where
        D: Fn(&Job) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>,
    {
        let mut reaped = 0usize;
        for job in jobs {
            delete_job(&job).await?;
            notifier.notify_idle_closed(&job).await?;
            reaped += 1;
        }
        Ok(reaped)
    }

    /// `abandonJobsOfAgent` (§4.5.2): on agent disconnect, for each owned
    /// job: mark any `IN_PROGRESS` message `FAILED`, unassign, notify, and
    /// delete the job — all inside one transaction per job, so a failure on
    /// job 2 never leaves job 1 half-unwound.
    pub async fn abandon_jobs_of_agent<D>(
        &self,
        org_id: &OrgId,
        _agent_id: &AgentId,
        jobs: Vec<Job>,
        reason: &str,
        notifier: &dyn JobNotifier,
        delete_job: D,
    ) -> Result<()>
    where
        D: Fn(&OrgId, &JobId) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>,
    {
        for job in jobs {
            with_transaction(&self.db, || async {
                let in_progress = self
                    .messages
                    .by_job_and_status(org_id, &job.id, MessageStatus::InProgress)
                    .await?;
                for mut msg in in_progress {
                    msg.transition(MessageStatus::Failed)?;
                    self.messages
                        .update_status(org_id, &msg.id, MessageStatus::Failed)
                        .await?;
                }
                self.registry.unassign(org_id, &job.id).await?;
                Ok(())
            })
            .await?;
            notifier.notify_abandoned(&job, reason).await?;
            delete_job(org_id, &job.id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlackPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<(String, OutboundFrame)>>,
    }

    #[async_trait]
    impl AgentTransport for FakeTransport {
        async fn send_frame(&self, ws_connection_id: &str, frame: OutboundFrame) -> Result<()> {
            self.sent.lock().unwrap().push((ws_connection_id.to_string(), frame));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        queued: AtomicUsize,
        processing: AtomicUsize,
        idle_closed: AtomicUsize,
        abandoned: AtomicUsize,
    }

    #[async_trait]
    impl JobNotifier for FakeNotifier {
        async fn react_queued(&self, _job: &Job) -> Result<()> {
            self.queued.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn react_processing(&self, _job: &Job) -> Result<()> {
            self.processing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn notify_idle_closed(&self, _job: &Job) -> Result<()> {
            self.idle_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn notify_abandoned(&self, _job: &Job, _reason: &str) -> Result<()> {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn setup() -> (Scheduler, Database, OrgId, crate::ids::IntegrationId) {
        let db = Database::in_memory().await.unwrap();
        let org_id = OrgId::new();
        let integration_id = crate::ids::IntegrationId::new();
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
        (Scheduler::new(db.clone()), db, org_id, integration_id)
    }

    fn make_job(org_id: &OrgId, integration_id: &crate::ids::IntegrationId, thread_ts: &str) -> Job {
        Job::new(
            org_id.clone(),
            JobPayload::Slack(SlackPayload {
                thread_ts: thread_ts.to_string(),
                channel_id: "C1".to_string(),
                user_id: "U1".to_string(),
                integration_id: integration_id.clone(),
            }),
        )
    }

    #[tokio::test]
    async fn assignment_fails_with_no_agents_available() {
        let (scheduler, _db, org_id, integration_id) = setup().await;
        let job = make_job(&org_id, &integration_id, "1.1");
        let result = scheduler.get_or_assign_agent_for_job(&org_id, &job.id).await;
        assert!(matches!(result, Err(Error::NoAgentsAvailable)));
    }

    #[tokio::test]
    async fn get_or_assign_is_stable_once_assigned() {
        let (scheduler, _db, org_id, integration_id) = setup().await;
        let registry = AgentRegistry::new(scheduler.db.clone());
        let agent = registry.register_agent(org_id.clone(), "ws-1").await.unwrap();

        let job = make_job(&org_id, &integration_id, "1.1");
        let first = scheduler.get_or_assign_agent_for_job(&org_id, &job.id).await.unwrap();
        assert_eq!(first, "ws-1");

        // A second idle agent must not steal the job's existing assignment.
        registry.register_agent(org_id.clone(), "ws-2").await.unwrap();
        let second = scheduler.get_or_assign_agent_for_job(&org_id, &job.id).await.unwrap();
        assert_eq!(second, agent.ws_connection_id);
    }

    #[tokio::test]
    async fn dispatch_sends_start_conversation_and_marks_in_progress() {
        let (scheduler, db, org_id, integration_id) = setup().await;
        let registry = AgentRegistry::new(db.clone());
        registry.register_agent(org_id.clone(), "ws-1").await.unwrap();

        let job = make_job(&org_id, &integration_id, "1.1");
        let messages = MessagesRepository::new(db.clone());
        let message = messages
            .create(crate::models::ProcessedMessage::new(
                job.id.clone(),
                org_id.clone(),
                integration_id.clone(),
                "C1:1.1",
                "do X",
                MessageStatus::Queued,
            ))
            .await
            .unwrap();

        let ws_connection_id = scheduler.get_or_assign_agent_for_job(&org_id, &job.id).await.unwrap();
        let transport = FakeTransport::default();
        let notifier = FakeNotifier::default();
        scheduler
            .dispatch(
                &org_id,
                &job,
                &message.id,
                &ws_connection_id,
                "do X",
                "https://example.com/p/1",
                true,
                &transport,
                &notifier,
            )
            .await
            .unwrap();

        assert_eq!(notifier.processing.load(Ordering::SeqCst), 1);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].1, OutboundFrame::StartConversation { .. }));

        let updated = messages.get_by_id(&org_id, &message.id).await.unwrap().unwrap();
        assert_eq!(updated.status, MessageStatus::InProgress);
    }

    #[tokio::test]
    async fn abandon_jobs_fails_in_progress_messages_and_unassigns() {
        let (scheduler, db, org_id, integration_id) = setup().await;
        let registry = AgentRegistry::new(db.clone());
        let agent = registry.register_agent(org_id.clone(), "ws-1").await.unwrap();

        let job = make_job(&org_id, &integration_id, "1.1");
        registry.assign(agent.id.clone(), job.id.clone(), org_id.clone()).await.unwrap();

        let messages = MessagesRepository::new(db.clone());
        let message = messages
            .create(crate::models::ProcessedMessage::new(
                job.id.clone(),
                org_id.clone(),
                integration_id.clone(),
                "C1:1.1",
                "do X",
                MessageStatus::InProgress,
            ))
            .await
            .unwrap();

        let notifier = FakeNotifier::default();
        let deleted = Mutex::new(Vec::<JobId>::new());
        scheduler
            .abandon_jobs_of_agent(
                &org_id,
                &agent.id,
                vec![job.clone()],
                "agent disconnected",
                &notifier,
                |_org_id, job_id| {
                    deleted.lock().unwrap().push(job_id.clone());
                    Box::pin(async { Ok(()) })
                },
            )
            .await
            .unwrap();

        assert_eq!(notifier.abandoned.load(Ordering::SeqCst), 1);
        assert_eq!(deleted.lock().unwrap().as_slice(), &[job.id.clone()]);
        let updated = messages.get_by_id(&org_id, &message.id).await.unwrap().unwrap();
        assert_eq!(updated.status, MessageStatus::Failed);
        assert!(registry.assignment_for_job(&org_id, &job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reap_idle_deletes_and_notifies_each_job() {
        let (scheduler, _db, org_id, integration_id) = setup().await;
        let job = make_job(&org_id, &integration_id, "1.1");
        let notifier = FakeNotifier::default();
        let deleted = Mutex::new(0usize);

        let reaped = scheduler
            .reap_idle(vec![job], &notifier, |_job| {
                *deleted.lock().unwrap() += 1;
                Box::pin(async { Ok(()) })
            })
            .await
            .unwrap();

        assert_eq!(reaped, 1);
        assert_eq!(*deleted.lock().unwrap(), 1);
        assert_eq!(notifier.idle_closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drain_queue_stops_once_agents_are_exhausted() {
        let (scheduler, db, org_id, integration_id) = setup().await;
        let registry = AgentRegistry::new(db.clone());
        registry.register_agent(org_id.clone(), "ws-1").await.unwrap();

        let job1 = make_job(&org_id, &integration_id, "1.1");
        let job2 = make_job(&org_id, &integration_id, "2.2");
        let jobs = vec![job1.clone(), job2.clone()];
        let dispatched_jobs = Mutex::new(Vec::<JobId>::new());

        let dispatched = scheduler
            .drain_queue(
                &org_id,
                JobType::Slack,
                &integration_id,
                10,
                || Ok(jobs.clone()),
                |job, _ws| {
                    dispatched_jobs.lock().unwrap().push(job.id.clone());
                    async { Ok(()) }
                },
            )
            .await
            .unwrap();

        // Only one idle agent exists, so only the first job is dispatched.
        assert_eq!(dispatched, 1);
        assert_eq!(dispatched_jobs.lock().unwrap().as_slice(), &[job1.id]);
    }
}
