//! HTTP client for the `/mcp` session protocol.

use std::sync::atomic::{AtomicI64, Ordering};

use reqwest::header::ACCEPT;
use serde_json::{Value, json};
use thiserror::Error;
use todo_protocol::initialize::{LATEST_PROTOCOL_VERSION, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use todo_protocol::{
    CallToolResult, Implementation, InitializeResult, ListToolsResult, McpError, McpNotification,
    McpRequest, McpResponse, Methods, Notifications, RequestId, Tool,
};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Rpc(McpError),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("no open session")]
    NoSession,

    #[error("server did not return a session id")]
    MissingSessionHeader,
}

pub struct McpClient {
    http: reqwest::Client,
    endpoint: String,
    session_id: Option<String>,
    protocol_version: Option<String>,
    next_id: AtomicI64,
}

impl McpClient {
    /// `endpoint` is the full `/mcp` URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            session_id: None,
            protocol_version: None,
            next_id: AtomicI64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Run the initialize handshake, keep the minted session id, and send
    /// `notifications/initialized`.
    pub async fn connect(&mut self, client_info: Implementation) -> Result<InitializeResult, ClientError> {
        let request = McpRequest::new(
            self.next_request_id(),
            Methods::INITIALIZE,
            Some(json!({
                "protocolVersion": LATEST_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": client_info,
            })),
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&request)
            .send()
            .await?;
        let session_id = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let result = read_result(response).await?;
        let session_id = session_id.ok_or(ClientError::MissingSessionHeader)?;
        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))?;

        self.session_id = Some(session_id);
        self.protocol_version = Some(init.protocol_version.clone());
        self.notify(Notifications::INITIALIZED, None).await?;

        info!(
            "Connected to {} {} (session {})",
            init.server_info.name,
            init.server_info.version,
            self.session_id.as_deref().unwrap_or_default()
        );
        Ok(init)
    }

    /// Send a request on the open session and return its result.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let request = McpRequest::new(self.next_request_id(), method, params);
        debug!("→ {method} ({})", request.id);
        let response = self.post(&request).await?;
        read_result(response).await
    }

    /// Send a notification on the open session. The server answers 202.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ClientError> {
        let notification = McpNotification::new(method, params);
        let response = self.post(&notification).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ClientError> {
        let result = self
            .request(
                Methods::TOOLS_CALL,
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>, ClientError> {
        let result = self.request(Methods::TOOLS_LIST, None).await?;
        let list: ListToolsResult =
            serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(list.tools)
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.request(Methods::PING, None).await.map(|_| ())
    }

    /// End the session with DELETE. The session id is forgotten either way.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        let session_id = self.session_id.take().ok_or(ClientError::NoSession)?;
        let response = self
            .http
            .delete(&self.endpoint)
            .header(SESSION_ID_HEADER, &session_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        info!("Closed session {session_id}");
        Ok(())
    }

    async fn post<T: serde::Serialize>(&self, body: &T) -> Result<reqwest::Response, ClientError> {
        let session_id = self.session_id.as_deref().ok_or(ClientError::NoSession)?;
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .header(SESSION_ID_HEADER, session_id);
        if let Some(version) = &self.protocol_version {
            builder = builder.header(PROTOCOL_VERSION_HEADER, version);
        }
        Ok(builder.json(body).send().await?)
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

async fn read_result(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    match serde_json::from_str::<McpResponse>(&body) {
        Ok(McpResponse::Success(success)) => Ok(success.result),
        Ok(McpResponse::Error(error)) => Err(ClientError::Rpc(error.error)),
        Err(_) if !status.is_success() => Err(ClientError::Status {
            status: status.as_u16(),
            body,
        }),
        Err(e) => Err(ClientError::Decode(e.to_string())),
    }
}
