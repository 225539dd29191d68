//! Agent Registry (C4, §4.3): tracks live agent sessions and their job
//! assignments.

use crate::database::Database;
use crate::error::{Error, Result};
use crate::ids::{AgentId, JobId, OrgId};
use crate::models::{AgentSession, Assignment};
use crate::repositories::AgentsRepository;
use crate::tx::with_transaction;

#[derive(Clone)]
pub struct AgentRegistry {
    db: Database,
    agents: AgentsRepository,
}

impl AgentRegistry {
    pub fn new(db: Database) -> Self {
        let agents = AgentsRepository::new(db.clone());
        Self { db, agents }
    }

    pub async fn register_agent(&self, org_id: OrgId, ws_connection_id: impl Into<String>) -> Result<AgentSession> {
        let session = AgentSession::new(org_id, ws_connection_id);
        self.agents.insert(&session).await?;
        Ok(session)
    }

    /// Atomically removes the agent session and returns the jobs it owned,
    /// so the scheduler can abandon them (§4.3). The delete and the read of
    /// owned jobs happen in one transaction so no job assignment can be
    /// created or resolved in between.
    pub async fn deregister_agent(
        &self,
        ws_connection_id: &str,
    ) -> Result<(Option<AgentSession>, Vec<JobId>)> {
        with_transaction(&self.db, || async {
            let Some(session) = self.agents.by_ws_connection(ws_connection_id).await? else {
                return Ok((None, Vec::new()));
            };
            let owned = self.agents.jobs_owned_by(&session.org_id, &session.id).await?;
            self.agents.delete_by_ws_connection(ws_connection_id).await?;
            Ok((Some(session), owned))
        })
        .await
    }

    /// Intersects the persisted agent set with the live socket set supplied
    /// by the WebSocket layer, so a crashed process without a socket close
    /// is never treated as live.
    pub async fn connected_active_agents(
        &self,
        org_id: &OrgId,
        live_ws_connection_ids: &[String],
    ) -> Result<Vec<AgentSession>> {
        self.agents.connected_active(org_id, live_ws_connection_ids).await
    }

    pub async fn agent_by_ws_connection(&self, ws_connection_id: &str) -> Result<Option<AgentSession>> {
        self.agents.by_ws_connection(ws_connection_id).await
    }

    pub async fn agent_by_job(&self, org_id: &OrgId, job_id: &JobId) -> Result<Option<AgentSession>> {
        self.agents.by_job(org_id, job_id).await
    }

    pub async fn idle_agents(&self, org_id: &OrgId) -> Result<Vec<AgentSession>> {
        self.agents.idle_agents(org_id).await
    }

    /// Exclusive per-job assignment (I1). A concurrent second assignment for
    /// the same job fails with `Error::Conflict` (the database's unique
    /// constraint on `job_id` guarantees only one insert can win).
    pub async fn assign(&self, agent_id: AgentId, job_id: JobId, org_id: OrgId) -> Result<()> {
        let assignment = Assignment::new(agent_id, job_id.clone(), org_id);
        self.agents.assign(&assignment).await.map_err(|e| match e {
            Error::Database(sqlx::Error::Database(db_err))
                if db_err.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                Error::Conflict(format!("job {} is already assigned", job_id))
            }
            other => other,
        })
    }

    pub async fn unassign(&self, org_id: &OrgId, job_id: &JobId) -> Result<()> {
        self.agents.unassign(org_id, job_id).await
    }

    pub async fn assignment_for_job(&self, org_id: &OrgId, job_id: &JobId) -> Result<Option<Assignment>> {
        self.agents.assignment_for_job(org_id, job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (AgentRegistry, OrgId) {
        let db = Database::in_memory().await.unwrap();
        let org_id = OrgId::new();
        sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?1, 'x', ?2)")
            .bind(org_id.as_str())
            .bind(chrono::Utc::now())
            .execute(db.pool())
            .await
            .unwrap();
        (AgentRegistry::new(db), org_id)
    }

    #[tokio::test]
    async fn register_then_idle_then_assign_removes_from_idle_set() {
        let (registry, org_id) = setup().await;
        let session = registry
            .register_agent(org_id.clone(), "ws-1")
            .await
            .unwrap();
        assert_eq!(registry.idle_agents(&org_id).await.unwrap().len(), 1);

        let job_id = JobId::new();
        registry
            .assign(session.id.clone(), job_id.clone(), org_id.clone())
            .await
            .unwrap();
        assert!(registry.idle_agents(&org_id).await.unwrap().is_empty());
        assert_eq!(
            registry.agent_by_job(&org_id, &job_id).await.unwrap().unwrap().id,
            session.id
        );
    }

    #[tokio::test]
    async fn double_assignment_of_same_job_conflicts() {
        let (registry, org_id) = setup().await;
        let a1 = registry.register_agent(org_id.clone(), "ws-1").await.unwrap();
        let a2 = registry.register_agent(org_id.clone(), "ws-2").await.unwrap();
        let job_id = JobId::new();

        registry.assign(a1.id.clone(), job_id.clone(), org_id.clone()).await.unwrap();
        let result = registry.assign(a2.id, job_id, org_id).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn deregister_returns_owned_jobs_and_clears_session() {
        let (registry, org_id) = setup().await;
        let session = registry.register_agent(org_id.clone(), "ws-1").await.unwrap();
        let job_id = JobId::new();
        registry.assign(session.id.clone(), job_id.clone(), org_id.clone()).await.unwrap();

        let (removed, owned) = registry.deregister_agent("ws-1").await.unwrap();
        assert!(removed.is_some());
        assert_eq!(owned, vec![job_id]);
        assert!(registry.agent_by_ws_connection("ws-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn connected_active_excludes_agents_without_a_live_socket() {
        let (registry, org_id) = setup().await;
        registry.register_agent(org_id.clone(), "ws-1").await.unwrap();
        registry.register_agent(org_id.clone(), "ws-2").await.unwrap();

        let live = vec!["ws-1".to_string()];
        let active = registry.connected_active_agents(&org_id, &live).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].ws_connection_id, "ws-1");
    }
}
