//! MCP Todo Server: answers the MCP lifecycle and routes tool calls to
//! services.
//!
//! The server owns all services and provides the `RequestHandler`
//! implementation for the transport layer.

pub mod router;

pub use router::{McpServer, SERVER_NAME, broadcast_notifier};
