//! Request router: the session state machine behind `/mcp`.
//!
//! | verb   | session header          | outcome                                  |
//! |--------|-------------------------|------------------------------------------|
//! | POST   | Active                  | forward to the session                   |
//! | POST   | absent, initialize body | create, handshake, activate on success   |
//! | POST   | absent or unregistered  | `-32600` Invalid Request                 |
//! | GET    | Active                  | SSE continuation of the session          |
//! | GET    | absent or unregistered  | `-32001` Session not found               |
//! | DELETE | Active                  | close the transport, then remove         |
//! | DELETE | absent or unregistered  | `-32001` Session not found               |

use std::any::Any;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response, sse::Event},
};
use futures_util::{FutureExt, Stream, stream};
use serde_json::Value;
use todo_protocol::{
    HandlerResult, IncomingMessage, McpRequest, McpResponse, Methods, RequestContext,
    initialize::SESSION_ID_HEADER, is_initialize_request,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, warn};

use crate::error::RouteError;
use crate::registry::SessionRegistry;
use crate::server::RequestHandler;
use crate::session::{SessionState, SessionTransport};

/// Successful outcome of a POST.
#[derive(Debug)]
pub enum PostOutcome {
    /// JSON-RPC response to a request. `session_id` is set only when the
    /// request opened a new session.
    Response {
        body: McpResponse,
        session_id: Option<String>,
    },
    /// Notification or client response; nothing to answer.
    Accepted,
}

impl IntoResponse for PostOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Response { body, session_id } => {
                let mut response = Json(body).into_response();
                if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
                    response.headers_mut().insert(SESSION_ID_HEADER, value);
                }
                response
            }
            Self::Accepted => StatusCode::ACCEPTED.into_response(),
        }
    }
}

/// Routes verb + session header + body onto the registry and the handler.
pub struct RequestRouter<H: RequestHandler> {
    handler: Arc<H>,
    registry: Arc<SessionRegistry>,
    notification_tx: broadcast::Sender<String>,
}

impl<H: RequestHandler> RequestRouter<H> {
    pub fn new(
        handler: Arc<H>,
        registry: Arc<SessionRegistry>,
        notification_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            handler,
            registry,
            notification_tx,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    // ─────────────────────────────────────────────────────────────────────
    // POST
    // ─────────────────────────────────────────────────────────────────────

    pub async fn post(
        &self,
        session_id: Option<&str>,
        body: &[u8],
    ) -> Result<PostOutcome, RouteError> {
        match session_id {
            Some(id) => {
                let session = self.registry.lookup(id).ok_or_else(|| {
                    RouteError::InvalidRequest(format!("Session {id} is not registered"))
                })?;
                let value: Value =
                    serde_json::from_slice(body).map_err(|e| RouteError::Parse(e.to_string()))?;
                let message = IncomingMessage::from_value(value)
                    .map_err(|e| RouteError::InvalidRequest(e.message))?;
                self.forward(&session, message).await
            }
            None => {
                let value: Value = serde_json::from_slice(body).map_err(|_| {
                    RouteError::InvalidRequest("Body is not an initialize request".into())
                })?;
                if !is_initialize_request(&value) {
                    return Err(RouteError::InvalidRequest(
                        "Missing session id and body is not an initialize request".into(),
                    ));
                }
                let request: McpRequest = serde_json::from_value(value)
                    .map_err(|e| RouteError::InvalidRequest(e.to_string()))?;
                self.initialize(request).await
            }
        }
    }

    /// Open a session: pending until the handler accepts the handshake.
    async fn initialize(&self, request: McpRequest) -> Result<PostOutcome, RouteError> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = self.registry.create(id.clone());
        let _pending = PendingGuard(session.clone());
        let _turn = session.acquire().await;

        let ctx = RequestContext::for_session(id.clone());
        let outcome = self.call(&request.method, request.params, ctx).await;

        match outcome {
            Ok(Ok(result)) => {
                if self.registry.activate(&id).is_none() {
                    self.registry.remove(&id);
                    return Err(RouteError::Internal(Some(
                        "Session closed during initialization".into(),
                    )));
                }
                Ok(PostOutcome::Response {
                    body: McpResponse::success(request.id, result),
                    session_id: Some(id),
                })
            }
            Ok(Err(e)) => {
                warn!("Initialize rejected for pending session {id}: {e}");
                Ok(PostOutcome::Response {
                    body: McpResponse::error(Some(request.id), e),
                    session_id: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Deliver a message to an Active session in arrival order.
    async fn forward(
        &self,
        session: &SessionTransport,
        message: IncomingMessage,
    ) -> Result<PostOutcome, RouteError> {
        let _turn = session.acquire().await;
        if !session.is_active() {
            return Err(RouteError::InvalidRequest(format!(
                "Session {} is not registered",
                session.id()
            )));
        }

        let ctx = RequestContext::for_session(session.id());
        match message {
            IncomingMessage::Request(request) => {
                if request.method == Methods::INITIALIZE {
                    return Err(RouteError::InvalidRequest(format!(
                        "Session {} is already initialized",
                        session.id()
                    )));
                }
                debug!("[{}] → {}", session.id(), request.method);
                let body = match self.call(&request.method, request.params, ctx).await? {
                    Ok(result) => McpResponse::success(request.id, result),
                    Err(e) => McpResponse::error(Some(request.id), e),
                };
                Ok(PostOutcome::Response {
                    body,
                    session_id: None,
                })
            }
            IncomingMessage::Notification(notification) => {
                debug!("[{}] notification {}", session.id(), notification.method);
                AssertUnwindSafe(self.handler.handle_notification(
                    &notification.method,
                    notification.params,
                    ctx,
                ))
                .catch_unwind()
                .await
                .map_err(|payload| RouteError::Internal(Some(panic_message(payload))))?;
                Ok(PostOutcome::Accepted)
            }
            IncomingMessage::Response(_) => {
                debug!("[{}] client response ignored", session.id());
                Ok(PostOutcome::Accepted)
            }
        }
    }

    /// Invoke the handler, converting a panic into an internal error.
    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        ctx: RequestContext,
    ) -> Result<HandlerResult, RouteError> {
        AssertUnwindSafe(self.handler.handle_request(method, params, ctx))
            .catch_unwind()
            .await
            .map_err(|payload| {
                let message = panic_message(payload);
                error!("Handler panicked on {method}: {message}");
                RouteError::Internal(Some(message))
            })
    }

    // ─────────────────────────────────────────────────────────────────────
    // GET
    // ─────────────────────────────────────────────────────────────────────

    /// Streaming continuation for an Active session. Never creates one.
    pub fn get(
        &self,
        session_id: Option<&str>,
    ) -> Result<impl Stream<Item = Result<Event, Infallible>> + Send + 'static, RouteError> {
        let session = session_id
            .and_then(|id| self.registry.lookup(id))
            .ok_or(RouteError::SessionNotFound)?;
        session.touch();
        debug!("[{}] event stream opened", session.id());
        Ok(notification_stream(
            self.notification_tx.subscribe(),
            session.closed(),
        ))
    }

    // ─────────────────────────────────────────────────────────────────────
    // DELETE
    // ─────────────────────────────────────────────────────────────────────

    /// Close the session's transport and, if that succeeded, drop the entry.
    pub async fn delete(&self, session_id: Option<&str>) -> Result<(), RouteError> {
        let id = session_id.ok_or(RouteError::SessionNotFound)?;
        let session = self.registry.lookup(id).ok_or(RouteError::SessionNotFound)?;

        let _turn = session.acquire().await;
        session.close().map_err(|e| {
            warn!("DELETE for {id} failed: {e}");
            RouteError::SessionNotFound
        })?;
        self.registry.remove(id);
        Ok(())
    }
}

/// Closes a session that is still Uninitialized when the handshake ends,
/// including when the POST future is dropped mid-handshake. The close hook
/// takes the entry out of the registry.
struct PendingGuard(Arc<SessionTransport>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.state() == SessionState::Uninitialized && self.0.close().is_ok() {
            debug!("Pending session {} discarded", self.0.id());
        }
    }
}

/// Notifications broadcast to sessions, until `closed` flips or the
/// session is dropped.
fn notification_stream(
    notifications: broadcast::Receiver<String>,
    closed: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream::unfold(
        (notifications, closed),
        |(mut notifications, mut closed)| async move {
            loop {
                let done = *closed.borrow_and_update();
                if done {
                    return None;
                }
                tokio::select! {
                    msg = notifications.recv() => match msg {
                        Ok(data) => {
                            let event = Event::default().data(data);
                            return Some((Ok(event), (notifications, closed)));
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Event stream lagged, skipped {skipped} notification(s)");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                    changed = closed.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                }
            }
        },
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".into()
    }
}
