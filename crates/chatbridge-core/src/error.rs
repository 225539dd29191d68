//! Error taxonomy for chatbridge-core.
//!
//! Mirrors the propagation policy: repositories return `Database`/`Validation`
//! errors, services translate `NotFound` into idempotent success where the
//! use-case calls for it, and `Conflict`/`NoAgentsAvailable` are the two
//! scheduler-specific outcomes callers are expected to branch on explicitly.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no agents available")]
    NoAgentsAvailable,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_, _))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
