//! Host orchestrator: one session, one bridge listener, full re-render
//! after every action.

use serde_json::{Map, Value, json};
use thiserror::Error;
use todo_protocol::{ActionMessage, ActionPayload, Implementation, McpError, Tools};
use tracing::{debug, info, warn};

use crate::bridge::ActionListener;
use crate::client::{ClientError, McpClient};
use crate::render::Renderer;

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] McpError),

    #[error("todo_list returned no UI artifact")]
    MissingArtifact,
}

pub struct HostOrchestrator<R: Renderer> {
    client: McpClient,
    listener: ActionListener,
    renderer: R,
    client_info: Implementation,
}

impl<R: Renderer> HostOrchestrator<R> {
    pub fn new(client: McpClient, listener: ActionListener, renderer: R) -> Self {
        Self {
            client,
            listener,
            renderer,
            client_info: Implementation::new("mcp-todo-host", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn client(&self) -> &McpClient {
        &self.client
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn listener(&self) -> &ActionListener {
        &self.listener
    }

    /// Handshake, then the first render.
    pub async fn start(&mut self) -> Result<(), HostError> {
        self.client.connect(self.client_info.clone()).await?;
        self.refresh().await
    }

    /// Process bridge messages until every sender is gone, then close the
    /// session. A failure that stops the host still closes the session.
    pub async fn run(&mut self) -> Result<(), HostError> {
        while let Some(message) = self.listener.recv().await {
            if let Err(e) = self.handle(message).await {
                if let Err(close_err) = self.shutdown().await {
                    warn!("Could not close session after failure: {close_err}");
                }
                return Err(e);
            }
        }
        info!("Action bridge closed, ending session");
        self.shutdown().await
    }

    /// Dispatch one action and re-render. Business failures are reported
    /// and do not stop the host; transport failures do.
    pub async fn handle(&mut self, message: ActionMessage) -> Result<(), HostError> {
        debug!("Action {} → {}", message.message_id, message.payload.tool_name);

        match to_tool_call(&message.payload) {
            Ok((name, arguments)) => match self.client.call_tool(name, arguments).await {
                Ok(result) if result.is_error => {
                    self.renderer.report_failure(&result.failure_message());
                }
                Ok(_) => {}
                Err(ClientError::Rpc(e)) => {
                    warn!("{name} rejected: {e}");
                    self.renderer.report_failure(&e.message);
                }
                Err(e) => return Err(e.into()),
            },
            Err(reason) => self.renderer.report_failure(&reason),
        }

        self.refresh().await
    }

    /// Re-list and render from scratch.
    pub async fn refresh(&mut self) -> Result<(), HostError> {
        let result = self.client.call_tool(Tools::TODO_LIST, json!({})).await?;
        let artifact = result.artifact().ok_or(HostError::MissingArtifact)?;
        self.renderer.render(&artifact)
    }

    pub async fn shutdown(&mut self) -> Result<(), HostError> {
        if self.client.session_id().is_some() {
            self.client.close().await?;
        }
        Ok(())
    }
}

/// Map an action payload onto a tool name and arguments. Missing required
/// fields and unknown operations are rejected without a call.
pub fn to_tool_call(payload: &ActionPayload) -> Result<(&'static str, Value), String> {
    let require_id = |tool: &str| {
        payload
            .id
            .ok_or_else(|| format!("{tool} requires an id"))
    };

    match payload.tool_name.as_str() {
        Tools::TODO_CREATE => {
            let text = payload
                .text
                .as_ref()
                .ok_or_else(|| format!("{} requires text", Tools::TODO_CREATE))?;
            Ok((Tools::TODO_CREATE, json!({ "text": text })))
        }
        Tools::TODO_LIST => Ok((Tools::TODO_LIST, json!({}))),
        Tools::TODO_UPDATE => {
            let mut args = Map::new();
            args.insert("id".into(), json!(require_id(Tools::TODO_UPDATE)?));
            if let Some(text) = &payload.text {
                args.insert("text".into(), json!(text));
            }
            if let Some(completed) = payload.completed {
                args.insert("completed".into(), json!(completed));
            }
            Ok((Tools::TODO_UPDATE, Value::Object(args)))
        }
        Tools::TODO_DELETE => Ok((
            Tools::TODO_DELETE,
            json!({ "id": require_id(Tools::TODO_DELETE)? }),
        )),
        other => Err(format!("Unknown operation: {other}")),
    }
}
