//! chatbridge-web — HTTP ingestion, the agent WebSocket, and the
//! Conversation Orchestrator that ties chat platforms to the job scheduler.

pub mod agent_sockets;
pub mod app;
pub mod error;
pub mod http;
pub mod metrics;
pub mod orchestrator;
pub mod tickers;

pub use app::{create_router, AppState};
pub use error::{Error, Result};
pub use orchestrator::Orchestrator;
