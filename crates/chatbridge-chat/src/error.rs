//! Thin error wrapper over `chatbridge_core::Error` plus transport failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] chatbridge_core::Error),

    #[error("chat platform request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("chat platform API error: {0}")]
    Api(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
