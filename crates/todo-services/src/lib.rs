//! MCP Todo Service Implementations
//!
//! Each service implements the `Service` trait and answers a set of
//! JSON-RPC methods. Services are registered with the MCP server, which
//! routes `tools/call` by tool name and everything else by trying each
//! service in turn.

pub mod artifact;
pub mod schema;
pub mod store;
pub mod todo;

use todo_protocol::{HandlerResult, Tool};

pub use artifact::ArtifactBuilder;
pub use schema::{CreateArgs, DeleteArgs, UpdateArgs, tool_descriptors};
pub use store::{Todo, TodoError, TodoPatch, TodoStore};
pub use todo::{NotifySender, TodoService};

/// Trait implemented by all MCP services.
pub trait Service: Send + Sync {
    /// Name used for logging and for matching tool-name prefixes
    /// (`todo` owns `todo_*`).
    fn namespace(&self) -> &str;

    /// Tools this service exposes through `tools/list`.
    fn tools(&self) -> Vec<Tool> {
        Vec::new()
    }

    /// Handle a JSON-RPC request.
    ///
    /// `method` is the full method string (e.g., "tools/call").
    /// Methods the service does not answer return `MethodNotFound`.
    fn handle(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;

    /// Initialize the service (called once at startup).
    fn init(&self) -> impl std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send {
        async { Ok(()) }
    }
}
