//! Initialize handshake types and session header names.
//!
//! Protocol flow:
//!   1. Client POSTs `initialize` to /mcp without an `mcp-session-id` header
//!   2. Server answers with `InitializeResult` and returns the newly minted
//!      session id in the `mcp-session-id` response header
//!   3. Client POSTs `notifications/initialized` carrying that header
//!   4. Normal JSON-RPC traffic begins; DELETE /mcp ends the session

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonrpc::{JSONRPC_VERSION, McpRequest};
use crate::methods::Methods;

/// Protocol revision this server speaks by default.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";

/// Revisions the server accepts and echoes back during negotiation.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-03-26", "2024-11-05", "2025-06-18"];

/// Request/response header carrying the session identifier.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Request header carrying the negotiated protocol revision.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

// ─────────────────────────────────────────────────────────────────────────────
// Client → Server
// ─────────────────────────────────────────────────────────────────────────────

/// Name and version of either side of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Parameters for the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

// ─────────────────────────────────────────────────────────────────────────────
// Server → Client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Capabilities advertised in the initialize result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
}

/// Successful `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Pick the revision to answer with: the client's if supported, else ours.
pub fn negotiate_protocol_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|v| **v == requested)
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

/// Predicate recognizing a POST body that opens a new session.
///
/// The body must be a JSON-RPC 2.0 request (with an id) for `initialize`
/// whose params carry a protocol version and client info.
pub fn is_initialize_request(body: &Value) -> bool {
    if body.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION)
        || body.get("method").and_then(Value::as_str) != Some(Methods::INITIALIZE)
    {
        return false;
    }

    let Ok(request) = serde_json::from_value::<McpRequest>(body.clone()) else {
        return false;
    };

    request
        .params
        .is_some_and(|params| serde_json::from_value::<InitializeParams>(params).is_ok())
}
