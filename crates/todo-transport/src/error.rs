//! Transport-tier errors.
//!
//! Everything here surfaces as an HTTP error with a JSON-RPC envelope whose
//! `id` is `null`. Business failures never reach this module; they travel
//! inside successful tool results.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use thiserror::Error;
use todo_protocol::{McpError, McpErrorCode, McpResponse};

/// Failures reported by a session transport itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} is already closed")]
    AlreadyClosed(String),
}

/// A request the router refused or could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Malformed or unroutable call: no session and not an initialize
    /// request, or a session id that is not registered.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// GET or DELETE for a session that does not exist.
    #[error("session not found")]
    SessionNotFound,

    /// Body of a routed POST is not JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The forwarded handler panicked or the session vanished mid-flight.
    #[error("internal server error")]
    Internal(Option<String>),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Parse(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON-RPC error object carried in the response envelope.
    pub fn to_mcp_error(&self) -> McpError {
        match self {
            Self::InvalidRequest(reason) => {
                McpError::new(McpErrorCode::InvalidRequest, "Invalid Request")
                    .with_data(Value::String(reason.clone()))
            }
            Self::SessionNotFound => McpError::session_not_found(),
            Self::Parse(reason) => McpError::new(McpErrorCode::ParseError, "Parse error")
                .with_data(Value::String(reason.clone())),
            Self::Internal(detail) => {
                let err = McpError::new(McpErrorCode::InternalError, "Internal server error");
                match detail {
                    Some(detail) => err.with_data(Value::String(detail.clone())),
                    None => err,
                }
            }
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let envelope = McpResponse::error(None, self.to_mcp_error());
        (self.status(), Json(envelope)).into_response()
    }
}
