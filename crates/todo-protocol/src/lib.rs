//! MCP Todo - Protocol Types
//!
//! JSON-RPC 2.0 envelopes and the Model Context Protocol subset spoken on the
//! `/mcp` endpoint, plus the message shape a rendered todo artifact posts back
//! to its host. This crate is the single source of truth for method names,
//! tool names, header names, and error codes.

pub mod bridge;
pub mod content;
pub mod context;
pub mod error;
pub mod initialize;
pub mod jsonrpc;
pub mod methods;
pub mod notifications;
pub mod resource;

pub use bridge::{ActionKind, ActionMessage, ActionPayload, MessageId};
pub use content::{
    CallToolParams, CallToolResult, Content, EmbeddedResource, ListResourcesResult,
    ListToolsResult, ReadResourceParams, ReadResourceResult, ResourceDescriptor, Tool,
    ToolOutcome,
};
pub use context::RequestContext;
pub use error::{McpError, McpErrorCode};
pub use initialize::{
    Implementation, InitializeParams, InitializeResult, ServerCapabilities,
    is_initialize_request,
};
pub use jsonrpc::{
    HandlerResult, IncomingMessage, McpErrorResponse, McpNotification, McpRequest, McpResponse,
    McpSuccessResponse, RequestId,
};
pub use methods::{Methods, Tools};
pub use notifications::Notifications;
pub use resource::{ArtifactEncoding, ArtifactMetadata, ResourceArtifact};
