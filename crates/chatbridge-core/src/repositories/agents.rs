//! Agent sessions and assignments repository.

use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::error::Result;
use crate::ids::{AgentId, JobId, OrgId};
use crate::models::{AgentSession, Assignment};
use crate::tx;

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    org_id: String,
    ws_connection_id: String,
    connected_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

impl AgentRow {
    fn into_agent(self) -> Result<AgentSession> {
        Ok(AgentSession {
            id: AgentId::parse(&self.id)?,
            org_id: OrgId::parse(&self.org_id)?,
            ws_connection_id: self.ws_connection_id,
            connected_at: self.connected_at,
            last_seen_at: self.last_seen_at,
        })
    }
}

#[derive(Clone)]
pub struct AgentsRepository {
    db: Database,
}

impl AgentsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, session: &AgentSession) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query(
                "INSERT INTO agent_sessions (id, org_id, ws_connection_id, connected_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(session.id.as_str())
            .bind(session.org_id.as_str())
            .bind(&session.ws_connection_id)
            .bind(session.connected_at)
            .bind(session.last_seen_at),
        )
        .await?;
        Ok(())
    }

    /// Idempotent delete, mirroring `deleteJob` (§9): absent is success.
    pub async fn delete_by_ws_connection(&self, ws_connection_id: &str) -> Result<Option<AgentSession>> {
        let existing = self.by_ws_connection(ws_connection_id).await?;
        if existing.is_some() {
            tx::execute(
                &self.db,
                sqlx::query("DELETE FROM agent_sessions WHERE ws_connection_id = ?1")
                    .bind(ws_connection_id),
            )
            .await?;
        }
        Ok(existing)
    }

    pub async fn by_ws_connection(&self, ws_connection_id: &str) -> Result<Option<AgentSession>> {
        let row: Option<AgentRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as("SELECT * FROM agent_sessions WHERE ws_connection_id = ?1")
                .bind(ws_connection_id),
        )
        .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    pub async fn by_job(&self, org_id: &OrgId, job_id: &JobId) -> Result<Option<AgentSession>> {
        let row: Option<AgentRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as(
                "SELECT s.* FROM agent_sessions s
                 JOIN assignments a ON a.agent_id = s.id
                 WHERE a.org_id = ?1 AND a.job_id = ?2",
            )
            .bind(org_id.as_str())
            .bind(job_id.as_str()),
        )
        .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// Agents in `org_id` with zero current assignments — the candidate set
    /// the assignment policy picks from (§4.5.3), ordered by `connected_at`
    /// so the earliest-connected idle agent wins ties.
    pub async fn idle_agents(&self, org_id: &OrgId) -> Result<Vec<AgentSession>> {
        let rows: Vec<AgentRow> = tx::fetch_all(
            &self.db,
            sqlx::query_as(
                "SELECT s.* FROM agent_sessions s
                 WHERE s.org_id = ?1
                 AND NOT EXISTS (SELECT 1 FROM assignments a WHERE a.agent_id = s.id)
                 ORDER BY s.connected_at ASC",
            )
            .bind(org_id.as_str()),
        )
        .await?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// Intersects the persisted agent set with a caller-supplied live socket
    /// set, so an agent whose process crashed without closing its socket is
    /// never treated as live (§4.3).
    pub async fn connected_active(
        &self,
        org_id: &OrgId,
        live_ws_connection_ids: &[String],
    ) -> Result<Vec<AgentSession>> {
        if live_ws_connection_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (0..live_ws_connection_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect();
        let sql = format!(
            "SELECT * FROM agent_sessions WHERE org_id = ?1 AND ws_connection_id IN ({})",
            placeholders.join(", ")
        );
        let mut query = sqlx::query_as(&sql).bind(org_id.as_str());
        for id in live_ws_connection_ids {
            query = query.bind(id);
        }
        let rows: Vec<AgentRow> = tx::fetch_all(&self.db, query).await?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// Exclusive per-job assignment (I1): the `job_id` primary key on
    /// `assignments` makes a second concurrent INSERT for the same job fail
    /// with a constraint violation, which surfaces as `Error::Database` —
    /// callers map that to `Error::Conflict`.
    pub async fn assign(&self, assignment: &Assignment) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query(
                "INSERT INTO assignments (agent_id, job_id, org_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(assignment.agent_id.as_str())
            .bind(assignment.job_id.as_str())
            .bind(assignment.org_id.as_str())
            .bind(assignment.created_at),
        )
        .await?;
        Ok(())
    }

    pub async fn unassign(&self, org_id: &OrgId, job_id: &JobId) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query("DELETE FROM assignments WHERE job_id = ?1 AND org_id = ?2")
                .bind(job_id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        Ok(())
    }

    pub async fn assignment_for_job(&self, org_id: &OrgId, job_id: &JobId) -> Result<Option<Assignment>> {
        let row: Option<(String, String, String, DateTime<Utc>)> = tx::fetch_optional(
            &self.db,
            sqlx::query_as(
                "SELECT agent_id, job_id, org_id, created_at FROM assignments WHERE job_id = ?1 AND org_id = ?2",
            )
            .bind(job_id.as_str())
            .bind(org_id.as_str()),
        )
        .await?;
        row.map(|(agent_id, job_id, org_id, created_at)| {
            Ok(Assignment {
                agent_id: AgentId::parse(&agent_id)?,
                job_id: JobId::parse(&job_id)?,
                org_id: OrgId::parse(&org_id)?,
                created_at,
            })
        })
        .transpose()
    }

    /// Jobs currently owned by an agent — used by `deregisterAgent` so the
    /// scheduler can abandon them (§4.3).
    pub async fn jobs_owned_by(&self, org_id: &OrgId, agent_id: &AgentId) -> Result<Vec<JobId>> {
        let rows: Vec<(String,)> = tx::fetch_all(
            &self.db,
            sqlx::query_as("SELECT job_id FROM assignments WHERE agent_id = ?1 AND org_id = ?2")
                .bind(agent_id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        rows.into_iter().map(|(id,)| JobId::parse(&id)).collect()
    }
}
