//! Organization entity: the tenant boundary every other row is scoped to
//! (§3, I5). Created out of band (account provisioning is a Non-goal); this
//! module only holds the record the rest of the system reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::OrgId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OrgId::new(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
