//! Host-side bridge for the rendered todo artifact.
//!
//! The artifact runs in an isolated context and can only post one-way
//! messages outward. This crate provides the channel those messages travel
//! on, an HTTP client for the `/mcp` session protocol, and the orchestrator
//! that turns each message into a tool call followed by a full re-render.
//! There is no reply path back to the artifact; every render reflects the
//! server's state after the call.

pub mod bridge;
pub mod client;
pub mod host;
pub mod render;

pub use bridge::{ActionBridge, ActionListener, ActionSender, BridgeError};
pub use client::{ClientError, McpClient};
pub use host::{HostError, HostOrchestrator, to_tool_call};
pub use render::{FileRenderer, Renderer};
