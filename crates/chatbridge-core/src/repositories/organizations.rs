//! Organizations repository.

use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::error::Result;
use crate::ids::OrgId;
use crate::models::Organization;
use crate::tx;

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl OrganizationRow {
    fn into_organization(self) -> Result<Organization> {
        Ok(Organization {
            id: OrgId::parse(&self.id)?,
            name: self.name,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct OrganizationsRepository {
    db: Database,
}

impl OrganizationsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, org: &Organization) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)")
                .bind(org.id.as_str())
                .bind(&org.name)
                .bind(org.created_at),
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &OrgId) -> Result<Option<Organization>> {
        let row: Option<OrganizationRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as("SELECT * FROM organizations WHERE id = ?1").bind(id.as_str()),
        )
        .await?;
        row.map(OrganizationRow::into_organization).transpose()
    }

    /// Every org with at least one integration configured — the set the
    /// server's periodic tickers iterate over.
    pub async fn list_with_integrations(&self) -> Result<Vec<OrgId>> {
        let rows: Vec<(String,)> = tx::fetch_all(
            &self.db,
            sqlx::query_as("SELECT DISTINCT org_id FROM integrations"),
        )
        .await?;
        rows.into_iter().map(|(id,)| OrgId::parse(&id)).collect()
    }
}
