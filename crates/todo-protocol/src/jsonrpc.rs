//! JSON-RPC 2.0 base types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID, either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSuccessResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

/// JSON-RPC 2.0 error response. A missing id serializes as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpErrorResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    pub error: McpError,
}

/// JSON-RPC 2.0 response (success or error).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpResponse {
    Success(McpSuccessResponse),
    Error(McpErrorResponse),
}

/// JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Result from a request handler.
pub type HandlerResult = Result<Value, McpError>;

/// A single message a client may POST to the endpoint.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(McpRequest),
    Notification(McpNotification),
    /// A result or error the client sends back for a server-initiated request.
    Response(Value),
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper constructors
// ─────────────────────────────────────────────────────────────────────────────

impl McpRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            method: method.into(),
            params,
        }
    }
}

impl McpSuccessResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result,
        }
    }
}

impl McpErrorResponse {
    pub fn new(id: Option<RequestId>, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            error,
        }
    }
}

impl McpNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
        }
    }
}

impl McpResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self::Success(McpSuccessResponse::new(id, result))
    }

    pub fn error(id: Option<RequestId>, error: McpError) -> Self {
        Self::Error(McpErrorResponse::new(id, error))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl IncomingMessage {
    /// Classify a parsed POST body as a request, notification, or response.
    pub fn from_value(value: Value) -> Result<Self, McpError> {
        let (version_ok, has_method, has_id, has_outcome) = match value.as_object() {
            Some(obj) => (
                obj.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION),
                obj.get("method").is_some_and(Value::is_string),
                obj.get("id").is_some_and(|id| !id.is_null()),
                obj.contains_key("result") || obj.contains_key("error"),
            ),
            None => return Err(McpError::invalid_request("Expected a JSON-RPC message object")),
        };

        if !version_ok {
            return Err(McpError::invalid_request("Invalid JSON-RPC 2.0 message"));
        }

        match (has_method, has_id) {
            (true, true) => serde_json::from_value(value)
                .map(Self::Request)
                .map_err(|e| McpError::invalid_request(format!("Malformed request: {e}"))),
            (true, false) => serde_json::from_value(value)
                .map(Self::Notification)
                .map_err(|e| McpError::invalid_request(format!("Malformed notification: {e}"))),
            (false, _) if has_outcome => Ok(Self::Response(value)),
            _ => Err(McpError::invalid_request("Invalid JSON-RPC 2.0 message")),
        }
    }
}
