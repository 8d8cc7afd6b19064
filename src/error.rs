//! Error taxonomy shared by the state store and the HTTP layer.
//!
//! Validation and authorization failures are returned synchronously to
//! the triggering request; they never mutate state or publish events.
//! Upstream AI failures are absorbed inside the `ai` module and do not
//! appear here except as `UpstreamUnavailable` on paths that cannot
//! substitute a fallback.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GameError {
    /// Missing or malformed required fields, rejected before any mutation.
    #[error("{0}")]
    InvalidInput(String),

    /// Unknown room or player reference.
    #[error("{0}")]
    NotFound(String),

    /// The actor lacks the required role for this step, or the room is
    /// not in a phase where the action is legal.
    #[error("{0}")]
    Forbidden(String),

    /// External AI service failed or timed out on a path with no fallback.
    #[error("{0}")]
    UpstreamUnavailable(String),
}

impl GameError {
    /// Stable machine-readable code, used in response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidInput(_) => "invalid_input",
            GameError::NotFound(_) => "not_found",
            GameError::Forbidden(_) => "forbidden",
            GameError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    pub fn room_not_found(code: &str) -> Self {
        GameError::NotFound(format!("no such room: {}", code))
    }

    pub fn player_not_found(id: &str) -> Self {
        GameError::NotFound(format!("no such player: {}", id))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = match &self {
            GameError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Forbidden(_) => StatusCode::FORBIDDEN,
            GameError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(ErrorBody {
            error: self.code(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
