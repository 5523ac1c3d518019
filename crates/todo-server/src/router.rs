//! MCP Server Router: answers lifecycle methods and dispatches the rest
//! to services.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use todo_protocol::initialize::{ResourcesCapability, ToolsCapability, negotiate_protocol_version};
use todo_protocol::{
    HandlerResult, Implementation, InitializeParams, InitializeResult, ListToolsResult,
    McpError, McpErrorCode, McpNotification, Methods, Notifications, RequestContext,
    ServerCapabilities, Tool,
};
use todo_services::{NotifySender, Service};
use todo_transport::RequestHandler;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Name reported in `serverInfo`.
pub const SERVER_NAME: &str = "minimal-todo-server";

/// Owns services and routes requests to them.
pub struct McpServer {
    /// Identity reported during initialize
    info: Implementation,
    /// Optional usage hint returned with the initialize result
    instructions: Option<String>,
    /// Registered services (boxed for object safety)
    services: Vec<Box<dyn ServiceDyn>>,
    /// Tool name → index into `services`
    tool_index: HashMap<String, usize>,
    /// Server state
    state: ServerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Uninitialized,
    Running,
}

/// Object-safe wrapper for the Service trait.
trait ServiceDyn: Send + Sync {
    fn namespace_dyn(&self) -> &str;
    fn tools_dyn(&self) -> Vec<Tool>;
    fn handle_dyn<'a>(
        &'a self,
        method: &'a str,
        params: Option<Value>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>>;
    fn init_dyn(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send + '_>>;
}

impl<T: Service> ServiceDyn for T {
    fn namespace_dyn(&self) -> &str {
        self.namespace()
    }
    fn tools_dyn(&self) -> Vec<Tool> {
        self.tools()
    }
    fn handle_dyn<'a>(
        &'a self,
        method: &'a str,
        params: Option<Value>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>> {
        Box::pin(self.handle(method, params))
    }
    fn init_dyn(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>> + Send + '_>> {
        Box::pin(self.init())
    }
}

impl McpServer {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(SERVER_NAME, version),
            instructions: None,
            services: Vec::new(),
            tool_index: HashMap::new(),
            state: ServerState::Uninitialized,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Register a service with the server. Its tools become callable by name.
    pub fn register_service<S: Service + 'static>(&mut self, service: S) {
        info!("Registering service: {}", service.namespace());
        let index = self.services.len();
        for tool in service.tools() {
            self.tool_index.insert(tool.name, index);
        }
        self.services.push(Box::new(service));
    }

    /// Initialize all services.
    pub async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Initializing MCP server {} {}", self.info.name, self.info.version);

        for service in &self.services {
            service.init_dyn().await?;
        }

        self.state = ServerState::Running;
        info!("MCP server initialized ({} services, {} tools)", self.services.len(), self.tool_index.len());
        Ok(())
    }

    /// Every tool across all services, in registration order.
    pub fn tools(&self) -> Vec<Tool> {
        self.services.iter().flat_map(|s| s.tools_dyn()).collect()
    }

    fn handle_initialize(&self, params: Option<Value>, ctx: &RequestContext) -> HandlerResult {
        let params: InitializeParams = params
            .ok_or_else(|| McpError::invalid_params("Parameters required"))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| McpError::invalid_params(format!("Invalid parameters: {e}")))
            })?;

        let protocol_version = negotiate_protocol_version(&params.protocol_version);
        info!(
            "[{}] initialize from {} {} (protocol {protocol_version})",
            ctx.session_label(),
            params.client_info.name,
            params.client_info.version,
        );

        let result = InitializeResult {
            protocol_version: protocol_version.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                resources: Some(ResourcesCapability::default()),
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };
        encode(&result)
    }

    async fn route_tool_call(&self, params: Option<Value>, ctx: &RequestContext) -> HandlerResult {
        let name = params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::invalid_params("Missing tool name"))?
            .to_owned();

        let service = self
            .tool_index
            .get(&name)
            .and_then(|&i| self.services.get(i))
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {name}")))?;

        debug!("[{}] tools/call {name} → {}", ctx.session_label(), service.namespace_dyn());
        service.handle_dyn(Methods::TOOLS_CALL, params).await
    }

    /// Route a non-lifecycle request to the first service that answers it.
    async fn route_request(&self, method: &str, params: Option<Value>) -> HandlerResult {
        for service in &self.services {
            match service.handle_dyn(method, params.clone()).await {
                Err(e) if e.error_code() == McpErrorCode::MethodNotFound => continue,
                result => return result,
            }
        }

        Err(McpError::method_not_found(method))
    }
}

impl RequestHandler for McpServer {
    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> HandlerResult {
        if self.state == ServerState::Uninitialized {
            return Err(McpError::not_initialized());
        }

        match method {
            Methods::INITIALIZE => self.handle_initialize(params, &ctx),
            Methods::PING => Ok(json!({})),
            Methods::TOOLS_LIST => encode(&ListToolsResult {
                tools: self.tools(),
            }),
            Methods::TOOLS_CALL => self.route_tool_call(params, &ctx).await,
            _ => self.route_request(method, params).await,
        }
    }

    async fn handle_notification(&self, method: &str, _params: Option<Value>, ctx: RequestContext) {
        match method {
            Notifications::INITIALIZED => info!("[{}] client initialized", ctx.session_label()),
            Notifications::CANCELLED => debug!("[{}] client cancelled a request", ctx.session_label()),
            other => debug!("[{}] ignoring notification {other}", ctx.session_label()),
        }
    }
}

/// Notification callback that serializes onto the transport's broadcast
/// channel, reaching every open session stream.
pub fn broadcast_notifier(tx: broadcast::Sender<String>) -> NotifySender {
    Arc::new(move |method: &str, params: Value| {
        let notification = McpNotification::new(method, Some(params));
        if let Ok(json) = serde_json::to_string(&notification) {
            let _ = tx.send(json);
        }
    })
}

fn encode<T: serde::Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value)
        .map_err(|e| McpError::internal(format!("Failed to encode result: {e}")))
}
