//! Integrations repository.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::database::Database;
use crate::error::Result;
use crate::ids::{IntegrationId, OrgId};
use crate::models::{ChatPlatform, Integration};
use crate::tx;

#[derive(sqlx::FromRow)]
struct IntegrationRow {
    id: String,
    org_id: String,
    platform: ChatPlatform,
    workspace_id: String,
    bot_token: String,
    created_at: DateTime<Utc>,
}

impl IntegrationRow {
    fn into_integration(self) -> Result<Integration> {
        Ok(Integration {
            id: IntegrationId::parse(&self.id)?,
            org_id: OrgId::parse(&self.org_id)?,
            platform: self.platform,
            workspace_id: self.workspace_id,
            bot_token: SecretString::new(self.bot_token),
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct IntegrationsRepository {
    db: Database,
}

impl IntegrationsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, integration: &Integration) -> Result<()> {
        use secrecy::ExposeSecret;
        tx::execute(
            &self.db,
            sqlx::query(
                "INSERT INTO integrations (id, org_id, platform, workspace_id, bot_token, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(integration.id.as_str())
            .bind(integration.org_id.as_str())
            .bind(integration.platform)
            .bind(&integration.workspace_id)
            .bind(integration.bot_token.expose_secret())
            .bind(integration.created_at),
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, org_id: &OrgId, id: &IntegrationId) -> Result<Option<Integration>> {
        let row: Option<IntegrationRow> = tx::fetch_optional(
            &self.db,
            sqlx::query_as("SELECT * FROM integrations WHERE id = ?1 AND org_id = ?2")
                .bind(id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        row.map(IntegrationRow::into_integration).transpose()
    }

    /// Deleting an integration cascades all of its jobs (and their messages)
    /// per §3. Idempotent.
    pub async fn delete(&self, org_id: &OrgId, id: &IntegrationId) -> Result<()> {
        tx::execute(
            &self.db,
            sqlx::query("DELETE FROM jobs WHERE org_id = ?1 AND integration_id = ?2")
                .bind(org_id.as_str())
                .bind(id.as_str()),
        )
        .await?;
        tx::execute(
            &self.db,
            sqlx::query("DELETE FROM integrations WHERE id = ?1 AND org_id = ?2")
                .bind(id.as_str())
                .bind(org_id.as_str()),
        )
        .await?;
        Ok(())
    }

    pub async fn list_for_org(&self, org_id: &OrgId) -> Result<Vec<Integration>> {
        let rows: Vec<IntegrationRow> = tx::fetch_all(
            &self.db,
            sqlx::query_as("SELECT * FROM integrations WHERE org_id = ?1").bind(org_id.as_str()),
        )
        .await?;
        rows.into_iter().map(IntegrationRow::into_integration).collect()
    }
}
