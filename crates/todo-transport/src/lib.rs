//! MCP Todo Transport Layer
//!
//! Multiplexes logical client sessions over a single HTTP endpoint (`/mcp`).
//! The transport layer handles:
//! - Session lifecycle (create on initialize, activate, close, remove)
//! - Per-session request ordering
//! - Server notifications streamed to sessions over SSE
//! - Transport-level error envelopes
//!
//! The transport is decoupled from the server logic via the `RequestHandler` trait.

pub mod error;
pub mod registry;
pub mod routing;
pub mod server;
pub mod session;

pub use error::{RouteError, SessionError};
pub use registry::SessionRegistry;
pub use routing::{PostOutcome, RequestRouter};
pub use server::{RequestHandler, TransportConfig, TransportServer, transport_router};
pub use session::{SessionState, SessionTransport};
