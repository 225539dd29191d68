//! Shared application state and router wiring, mirroring the teacher's
//! `AppState`/`create_api_router` shape but scoped to chatbridge's own
//! surface: an HTTP ingestion endpoint, the agent WebSocket, and metrics.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use secrecy::SecretString;
use tower_http::trace::TraceLayer;

use chatbridge_core::{AgentRegistry, Database, JobsService};

use crate::agent_sockets::{agent_socket_handler, AgentSockets};
use crate::metrics::ChatbridgeMetrics;
use crate::orchestrator::Orchestrator;

/// Shared state handed to every axum handler.
pub struct AppState {
    pub db: Database,
    pub jobs: JobsService,
    pub registry: AgentRegistry,
    pub orchestrator: Arc<Orchestrator>,
    pub agent_sockets: AgentSockets,
    pub metrics: ChatbridgeMetrics,
    pub api_key: Option<SecretString>,
}

impl AppState {
    pub fn new(db: Database, api_key: Option<String>) -> Self {
        let agent_sockets = AgentSockets::new();
        let orchestrator = Arc::new(Orchestrator::new(db.clone(), agent_sockets.clone()));
        Self {
            jobs: JobsService::new(db.clone()),
            registry: AgentRegistry::new(db.clone()),
            db,
            orchestrator,
            agent_sockets,
            metrics: ChatbridgeMetrics::new(),
            api_key: api_key.map(SecretString::new),
        }
    }
}

/// Wires the HTTP ingestion routes, the agent socket upgrade route, and the
/// Prometheus scrape endpoint into one router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events/message", post(crate::http::ingest_message))
        .route("/events/reaction", post(crate::http::ingest_reaction))
        .route("/organizations", post(crate::http::create_organization))
        .route("/integrations", get(crate::http::list_integrations).post(crate::http::create_integration))
        .route("/integrations/:id", axum::routing::delete(crate::http::delete_integration))
        .route("/agents/:org_id/socket", get(agent_socket_handler))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
