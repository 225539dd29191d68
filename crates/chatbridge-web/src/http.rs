//! HTTP ingestion surface: normalized chat events in, Integration CRUD.
//!
//! Raw Slack Events API / Discord Gateway parsing is out of scope here (§1
//! names "raw HTTP SDK internals" as a non-goal) — callers (a thin adapter
//! process, or a test harness) are expected to post the already-normalized
//! [`MessageEvent`]/[`ReactionEvent`] shapes directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use chatbridge_chat::{MessageEvent, ReactionEvent};
use chatbridge_core::ids::{IntegrationId, OrgId};
use chatbridge_core::models::{ChatPlatform, Integration, Organization};
use chatbridge_core::repositories::{IntegrationsRepository, OrganizationsRepository};

use crate::app::AppState;
use crate::error::Result;

pub async fn ingest_message(State(state): State<Arc<AppState>>, Json(event): Json<MessageEvent>) -> Result<Json<serde_json::Value>> {
    state.orchestrator.handle_message_event(event).await?;
    Ok(Json(serde_json::json!({ "accepted": true })))
}

pub async fn ingest_reaction(State(state): State<Arc<AppState>>, Json(event): Json<ReactionEvent>) -> Result<Json<serde_json::Value>> {
    state.orchestrator.handle_reaction_event(event).await?;
    Ok(Json(serde_json::json!({ "accepted": true })))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub id: OrgId,
    pub name: String,
}

pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrganizationRequest>,
) -> Result<Json<OrganizationResponse>> {
    let org = Organization::new(request.name);
    let repo = OrganizationsRepository::new(state.db.clone());
    repo.create(&org).await?;
    Ok(Json(OrganizationResponse { id: org.id, name: org.name }))
}

#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    pub org_id: OrgId,
    pub platform: ChatPlatform,
    pub workspace_id: String,
    pub bot_token: String,
}

#[derive(Debug, Serialize)]
pub struct IntegrationResponse {
    pub id: IntegrationId,
    pub org_id: OrgId,
    pub platform: ChatPlatform,
    pub workspace_id: String,
}

impl From<Integration> for IntegrationResponse {
    fn from(integration: Integration) -> Self {
        Self {
            id: integration.id,
            org_id: integration.org_id,
            platform: integration.platform,
            workspace_id: integration.workspace_id,
        }
    }
}

pub async fn create_integration(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateIntegrationRequest>,
) -> Result<Json<IntegrationResponse>> {
    let integration = Integration::new(request.org_id, request.platform, request.workspace_id, request.bot_token);
    let repo = IntegrationsRepository::new(state.db.clone());
    repo.create(&integration).await?;
    Ok(Json(integration.into()))
}

#[derive(Debug, Deserialize)]
pub struct OrgQuery {
    pub org_id: OrgId,
}

pub async fn list_integrations(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<OrgQuery>,
) -> Result<Json<Vec<IntegrationResponse>>> {
    let repo = IntegrationsRepository::new(state.db.clone());
    let integrations = repo.list_for_org(&query.org_id).await?;
    Ok(Json(integrations.into_iter().map(IntegrationResponse::from).collect()))
}

pub async fn delete_integration(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    axum::extract::Query(query): axum::extract::Query<OrgQuery>,
) -> Result<Json<serde_json::Value>> {
    let id = IntegrationId::parse(&id)?;
    let repo = IntegrationsRepository::new(state.db.clone());
    repo.delete(&query.org_id, &id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

