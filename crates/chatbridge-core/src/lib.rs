//! Core data model, persistence, and scheduling logic for chatbridge.
//!
//! This crate has no knowledge of HTTP, WebSockets, or any specific chat
//! platform — those live in `chatbridge-web` and `chatbridge-chat`. It
//! exposes the repository layer (C3), the agent registry (C4), the jobs
//! service (C5), and the scheduler (C6), plus the wire-protocol frame types
//! shared with connected agents (§6).

pub mod database;
pub mod error;
pub mod ids;
pub mod jobs_service;
pub mod models;
pub mod protocol;
pub mod registry;
pub mod repositories;
pub mod scheduler;
pub mod tx;

pub use database::{Database, DatabaseConfig};
pub use error::{Error, Result};
pub use jobs_service::JobsService;
pub use registry::AgentRegistry;
pub use scheduler::{AgentTransport, AssignOutcome, JobNotifier, Scheduler};
pub use tx::with_transaction;
