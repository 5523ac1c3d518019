//! Streamable HTTP transport server using Axum.
//!
//! Serves the `/mcp` endpoint (POST / GET / DELETE) and a health check, and
//! owns the session registry for the lifetime of the process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderName, Method, StatusCode, header::CONTENT_TYPE},
    response::{
        IntoResponse, Json, Response,
        sse::{KeepAlive, Sse},
    },
    routing::get,
};
use bytes::Bytes;
use serde_json::{Value, json};
use todo_protocol::{
    HandlerResult, McpNotification, RequestContext,
    initialize::{PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER},
};
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::registry::SessionRegistry;
use crate::routing::RequestRouter;

/// Trait implemented by the MCP server to handle forwarded messages.
/// The transport calls this for every message on an Active session, and for
/// the initialize request of a pending one.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a JSON-RPC request and return its result.
    fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;

    /// Handle a client notification. No response is sent.
    fn handle_notification(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> impl std::future::Future<Output = ()> + Send {
        let _ = (method, params, ctx);
        async {}
    }
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Enable permissive CORS for browser hosts
    pub enable_cors: bool,
    /// Interval between SSE keep-alive comments
    pub keep_alive: Duration,
    /// Log every routed call at info level
    pub verbose_logging: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            hostname: "127.0.0.1".into(),
            enable_cors: true,
            keep_alive: Duration::from_secs(15),
            verbose_logging: false,
        }
    }
}

/// Shared state for the transport server.
struct AppState<H: RequestHandler> {
    router: Arc<RequestRouter<H>>,
    config: TransportConfig,
}

/// Build the axum router serving `/mcp` and `/health`.
pub fn transport_router<H: RequestHandler>(
    router: Arc<RequestRouter<H>>,
    config: TransportConfig,
) -> Router {
    let enable_cors = config.enable_cors;
    let state = Arc::new(AppState { router, config });

    let app = Router::new()
        .route(
            "/mcp",
            get(get_handler::<H>)
                .post(post_handler::<H>)
                .delete(delete_handler::<H>),
        )
        .route("/health", get(health_handler::<H>))
        .with_state(state);

    if enable_cors { app.layer(cors_layer()) } else { app }
}

/// Owns the session registry and serves `/mcp`.
pub struct TransportServer {
    registry: Arc<SessionRegistry>,
    /// Broadcast sender for notifications
    notification_tx: broadcast::Sender<String>,
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Start the transport server with the given request handler.
    pub async fn start<H: RequestHandler>(
        config: TransportConfig,
        handler: H,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (notification_tx, _) = broadcast::channel(1024);
        Self::start_with_sender(config, Arc::new(handler), notification_tx).await
    }

    /// Start the transport server with a pre-existing broadcast channel.
    /// Services hold the sender side to push notifications to sessions.
    pub async fn start_with_sender<H: RequestHandler>(
        config: TransportConfig,
        handler: Arc<H>,
        notification_tx: broadcast::Sender<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let registry = Arc::new(SessionRegistry::new());
        let router = Arc::new(RequestRouter::new(
            handler,
            registry.clone(),
            notification_tx.clone(),
        ));
        let app = transport_router(router, config.clone());

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("MCP transport listening on http://{}:{}/mcp", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            registry,
            notification_tx,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Broadcast a notification to every open session stream.
    pub fn broadcast(&self, notification: McpNotification) {
        if let Ok(json) = serde_json::to_string(&notification) {
            // No open streams is fine
            let _ = self.notification_tx.send(json);
        }
    }

    /// Get the notification sender for external use.
    pub fn notification_sender(&self) -> broadcast::Sender<String> {
        self.notification_tx.clone()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Close every session, then stop serving.
    pub async fn stop(&mut self) {
        self.registry.close_all();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("MCP transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn post_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session_id = session_header(&headers);
    log_call(&state.config, "POST", session_id);

    match state.router.post(session_id, &body).await {
        Ok(outcome) => outcome.into_response(),
        Err(e) => {
            warn!("POST /mcp rejected ({}): {e}", session_id.unwrap_or("NEW"));
            e.into_response()
        }
    }
}

async fn get_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    headers: HeaderMap,
) -> Response {
    let session_id = session_header(&headers);
    log_call(&state.config, "GET", session_id);

    match state.router.get(session_id) {
        Ok(stream) => Sse::new(stream)
            .keep_alive(KeepAlive::new().interval(state.config.keep_alive))
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
    headers: HeaderMap,
) -> Response {
    let session_id = session_header(&headers);
    log_call(&state.config, "DELETE", session_id);

    match state.router.delete(session_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health_handler<H: RequestHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "sessions": state.router.registry().len(),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn log_call(config: &TransportConfig, verb: &str, session_id: Option<&str>) {
    let session = session_id.unwrap_or("NEW");
    if config.verbose_logging {
        info!("{verb} /mcp (session {session})");
    } else {
        debug!("{verb} /mcp (session {session})");
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(SESSION_ID_HEADER),
            HeaderName::from_static(PROTOCOL_VERSION_HEADER),
        ])
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
}
