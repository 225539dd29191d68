//! Error taxonomy for chatbridge-web: wraps the lower layers' errors plus
//! the transport-specific failure modes of the HTTP/WebSocket surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] chatbridge_core::Error),

    #[error(transparent)]
    Chat(#[from] chatbridge_chat::Error),

    #[error("unknown integration: {0}")]
    UnknownIntegration(String),

    #[error("agent socket {0} is not connected")]
    AgentSocketGone(String),

    #[error("malformed request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl Error {
    fn code(&self) -> &'static str {
        match self {
            Error::Core(chatbridge_core::Error::Validation(_)) => "validation_error",
            Error::Core(chatbridge_core::Error::NotFound(_, _)) => "not_found",
            Error::Core(chatbridge_core::Error::Conflict(_)) => "conflict",
            Error::Core(chatbridge_core::Error::NoAgentsAvailable) => "no_agents_available",
            Error::UnknownIntegration(_) => "not_found",
            Error::AgentSocketGone(_) => "not_found",
            Error::BadRequest(_) => "bad_request",
            _ => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self.code() {
            "validation_error" | "bad_request" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "no_agents_available" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody { error: self.to_string(), code: self.code() };
        (status, Json(body)).into_response()
    }
}
