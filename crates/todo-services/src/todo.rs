//! Todo service: the four todo tools plus the `ui://todo/list` resource.
//!
//! Every tool result starts with a text block holding the machine-readable
//! outcome `{success, data?, message?}`. Successful calls append a freshly
//! rendered artifact; business failures set `isError` and carry the text
//! block alone.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Value, json};
use todo_protocol::notifications::Notifications;
use todo_protocol::resource::{HTML_MIME_TYPE, TODO_LIST_URI};
use todo_protocol::{
    CallToolParams, CallToolResult, HandlerResult, ListResourcesResult, McpError, Methods,
    ReadResourceParams, ReadResourceResult, ResourceDescriptor, Tool, ToolOutcome, Tools,
};
use tracing::{debug, info, warn};

use crate::Service;
use crate::artifact::ArtifactBuilder;
use crate::schema::{CreateArgs, DeleteArgs, UpdateArgs, parse_args, tool_descriptors};
use crate::store::{TodoError, TodoStore};

/// Callback for emitting notifications to connected sessions.
pub type NotifySender = Arc<dyn Fn(&str, Value) + Send + Sync>;

pub struct TodoService {
    store: Arc<TodoStore>,
    artifacts: ArtifactBuilder,
    tools: Vec<Tool>,
    notify_tx: RwLock<Option<NotifySender>>,
}

/// What a successful tool call produced: outcome data and the artifact
/// description to render with.
struct Applied {
    data: Value,
    description: &'static str,
    mutated: bool,
}

impl TodoService {
    pub fn new(store: Arc<TodoStore>, artifacts: ArtifactBuilder) -> Self {
        Self {
            store,
            artifacts,
            tools: tool_descriptors(),
            notify_tx: RwLock::new(None),
        }
    }

    /// Set the notification callback for emitting events to sessions.
    pub fn set_notify_sender(&self, sender: NotifySender) {
        *self.notify_tx.write() = Some(sender);
    }

    pub fn store(&self) -> &Arc<TodoStore> {
        &self.store
    }

    /// Run a todo tool. Unknown names are a protocol error; everything else
    /// comes back as a tool result, failed or not.
    pub fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult, McpError> {
        let applied = match name {
            Tools::TODO_CREATE => self.create(arguments),
            Tools::TODO_LIST => Ok(self.list()),
            Tools::TODO_UPDATE => self.update(arguments),
            Tools::TODO_DELETE => self.delete(arguments),
            other => return Err(McpError::invalid_params(format!("Unknown tool: {other}"))),
        };

        match applied {
            Ok(applied) => {
                if applied.mutated {
                    self.emit_updated();
                }
                let todos = self.store.list();
                let artifact = self.artifacts.build(&todos, applied.description);
                Ok(CallToolResult::success(&ToolOutcome::ok(applied.data), artifact))
            }
            Err(e) => {
                warn!("{name} failed: {e}");
                Ok(CallToolResult::failure(e.to_string()))
            }
        }
    }

    fn create(&self, arguments: Option<Value>) -> Result<Applied, TodoError> {
        let args = parse_args::<CreateArgs>(arguments)?.validate()?;
        let todo = self.store.create(args.text)?;
        info!("Todo #{} created", todo.id);
        Ok(Applied {
            data: to_data(&todo),
            description: "Your updated todo list",
            mutated: true,
        })
    }

    fn list(&self) -> Applied {
        Applied {
            data: to_data(&self.store.list()),
            description: "All your todos in one place",
            mutated: false,
        }
    }

    fn update(&self, arguments: Option<Value>) -> Result<Applied, TodoError> {
        let args = parse_args::<UpdateArgs>(arguments)?;
        let todo = self.store.update(args.id, args.patch())?;
        info!("Todo #{} updated", todo.id);
        Ok(Applied {
            data: to_data(&todo),
            description: "Updated todo list",
            mutated: true,
        })
    }

    fn delete(&self, arguments: Option<Value>) -> Result<Applied, TodoError> {
        let args = parse_args::<DeleteArgs>(arguments)?;
        let todo = self.store.delete(args.id)?;
        info!("Todo #{} deleted", todo.id);
        Ok(Applied {
            data: to_data(&todo),
            description: "Updated todo list after deletion",
            mutated: true,
        })
    }

    fn list_resources(&self) -> ListResourcesResult {
        ListResourcesResult {
            resources: vec![ResourceDescriptor {
                uri: TODO_LIST_URI.into(),
                name: "Todo List".into(),
                description: Some("Interactive view of all todos".into()),
                mime_type: Some(HTML_MIME_TYPE.into()),
            }],
        }
    }

    fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        if uri != TODO_LIST_URI {
            return Err(McpError::invalid_params(format!("Unknown resource: {uri}")));
        }
        let artifact = self
            .artifacts
            .build(&self.store.list(), "All your todos in one place");
        Ok(ReadResourceResult {
            contents: vec![artifact.into_embedded()],
        })
    }

    fn emit_updated(&self) {
        if let Some(tx) = self.notify_tx.read().as_ref() {
            tx(Notifications::RESOURCES_UPDATED, json!({ "uri": TODO_LIST_URI }));
        }
    }
}

impl Service for TodoService {
    fn namespace(&self) -> &str {
        "todo"
    }

    fn tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    async fn handle(&self, method: &str, params: Option<Value>) -> HandlerResult {
        match method {
            Methods::TOOLS_CALL => {
                let p: CallToolParams = parse_params(params)?;
                debug!("tools/call {}", p.name);
                let result = self.call_tool(&p.name, p.arguments)?;
                to_result(&result)
            }
            Methods::RESOURCES_LIST => to_result(&self.list_resources()),
            Methods::RESOURCES_READ => {
                let p: ReadResourceParams = parse_params(params)?;
                to_result(&self.read_resource(&p.uri)?)
            }
            _ => Err(McpError::method_not_found(method)),
        }
    }

    async fn init(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Todo service ready ({} tools, {} todos, {:?} artifacts)",
            self.tools.len(),
            self.store.len(),
            self.artifacts.encoding()
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_params<T: for<'de> Deserialize<'de>>(params: Option<Value>) -> Result<T, McpError> {
    match params {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {e}"))),
        None => Err(McpError::invalid_params("Parameters required")),
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value)
        .map_err(|e| McpError::internal(format!("Failed to encode result: {e}")))
}

fn to_data<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
