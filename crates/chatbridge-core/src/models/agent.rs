//! Agent Session and Assignment entities (§3, C4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, JobId, OrgId};

/// One connected agent socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: AgentId,
    pub org_id: OrgId,
    pub ws_connection_id: String,
    pub connected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl AgentSession {
    pub fn new(org_id: OrgId, ws_connection_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            org_id,
            ws_connection_id: ws_connection_id.into(),
            connected_at: now,
            last_seen_at: now,
        }
    }
}

/// The exclusive ownership relation between one agent and one job (I1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub agent_id: AgentId,
    pub job_id: JobId,
    pub org_id: OrgId,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(agent_id: AgentId, job_id: JobId, org_id: OrgId) -> Self {
        Self {
            agent_id,
            job_id,
            org_id,
            created_at: Utc::now(),
        }
    }
}
