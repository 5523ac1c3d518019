//! Request context: per-session state threaded through request handling.
//!
//! The transport builds a [`RequestContext`] for every forwarded message from
//! the session the request arrived on. Handlers use it for log correlation;
//! domain state is shared across sessions and never keyed by it.

/// Context for a single request, carrying session-level state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Session the request belongs to. `None` only outside the transport
    /// (direct calls from tests or embedding code).
    pub session_id: Option<String>,
}

impl RequestContext {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
        }
    }

    /// Session id for logging, `"-"` when absent.
    pub fn session_label(&self) -> &str {
        self.session_id.as_deref().unwrap_or("-")
    }
}
