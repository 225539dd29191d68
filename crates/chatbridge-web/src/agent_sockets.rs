//! Agent WebSocket endpoint: one persistent connection per coding agent,
//! carrying the wire protocol frames of §6. Mirrors the teacher's
//! `websocket.rs` broadcast/subscription shape, but each agent gets its own
//! point-to-point channel rather than a fan-out broadcast, since frames are
//! addressed to a specific `wsConnectionID`, not broadcast to observers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use chatbridge_core::ids::OrgId;
use chatbridge_core::protocol::{AgentFrame, OutboundFrame, WireFrame};
use chatbridge_core::scheduler::AgentTransport;
use chatbridge_core::{Error as CoreError, Result as CoreResult};

use crate::app::AppState;

/// Registry of live agent sockets, keyed by `wsConnectionID`. Implements
/// [`AgentTransport`] so the scheduler can address a specific connected
/// agent without knowing anything about axum or WebSockets.
#[derive(Clone, Default)]
pub struct AgentSockets {
    senders: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<Message>>>>,
}

impl AgentSockets {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, ws_connection_id: String, tx: mpsc::UnboundedSender<Message>) {
        self.senders.write().await.insert(ws_connection_id, tx);
    }

    async fn remove(&self, ws_connection_id: &str) {
        self.senders.write().await.remove(ws_connection_id);
    }

    /// The socket ids currently open, for intersecting against the
    /// persisted agent set (§4.3 `connected_active_agents`).
    pub async fn live_ids(&self) -> Vec<String> {
        self.senders.read().await.keys().cloned().collect()
    }

    /// Registers a channel for `ws_connection_id` without going through a
    /// real WebSocket upgrade, so orchestrator tests can assert on frames
    /// sent to a connected agent.
    #[cfg(test)]
    pub(crate) async fn test_register(&self, ws_connection_id: impl Into<String>) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(ws_connection_id.into(), tx).await;
        rx
    }
}

#[async_trait]
impl AgentTransport for AgentSockets {
    async fn send_frame(&self, ws_connection_id: &str, frame: OutboundFrame) -> CoreResult<()> {
        let senders = self.senders.read().await;
        let tx = senders
            .get(ws_connection_id)
            .ok_or_else(|| CoreError::NotFound("agent socket", ws_connection_id.to_string()))?;
        let wire = frame.into_wire(Uuid::new_v4().to_string());
        let json = serde_json::to_string(&wire)?;
        tx.send(Message::Text(json.into()))
            .map_err(|_| CoreError::NotFound("agent socket", ws_connection_id.to_string()))
    }
}

pub async fn agent_socket_handler(
    ws: WebSocketUpgrade,
    Path(org_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> axum::response::Response {
    let Ok(org_id) = OrgId::parse(&org_id) else {
        return axum::http::StatusCode::BAD_REQUEST.into_response();
    };
    ws.on_upgrade(move |socket| handle_agent_socket(socket, state, org_id))
}

async fn handle_agent_socket(socket: WebSocket, state: Arc<AppState>, org_id: OrgId) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let ws_connection_id = Uuid::new_v4().to_string();
    let agent = match state.registry.register_agent(org_id, ws_connection_id.clone()).await {
        Ok(agent) => agent,
        Err(e) => {
            tracing::error!(error = %e, "failed to register agent session");
            return;
        }
    };
    state.agent_sockets.register(ws_connection_id.clone(), tx).await;
    tracing::info!(agent_id = %agent.id, ws_connection_id = %ws_connection_id, "agent connected");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let frame: WireFrame<AgentFrame> = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed agent frame");
                continue;
            }
        };
        let span = tracing::info_span!("agent_frame", agent_id = %agent.id, frame_type = ?frame.frame);
        let _enter = span.enter();
        if let Err(e) = state.orchestrator.handle_agent_frame(&ws_connection_id, frame.frame).await {
            tracing::warn!(error = %e, "agent frame handling failed");
        }
    }

    send_task.abort();
    state.agent_sockets.remove(&ws_connection_id).await;
    if let Err(e) = state.orchestrator.handle_agent_disconnect(&ws_connection_id).await {
        tracing::warn!(error = %e, "agent disconnect handling failed");
    }
}
