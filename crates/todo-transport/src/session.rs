//! Per-session transport state.

use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, watch};
use tracing::info;

use crate::error::SessionError;

/// Lifecycle of a session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Closed,
}

type CloseHook = Box<dyn FnOnce(&str) + Send>;

/// Transport side of one logical client session.
///
/// Requests forwarded to a session take its request gate, so they run one at
/// a time in arrival order. Closing flips the state, wakes every streaming
/// continuation, and fires the close hook exactly once.
pub struct SessionTransport {
    id: String,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    last_activity: Mutex<Instant>,
    request_gate: AsyncMutex<()>,
    closed_tx: watch::Sender<bool>,
    on_close: Mutex<Option<CloseHook>>,
}

impl SessionTransport {
    pub fn new(id: impl Into<String>) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: Mutex::new(SessionState::Uninitialized),
            last_activity: Mutex::new(Instant::now()),
            request_gate: AsyncMutex::new(()),
            closed_tx,
            on_close: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Uninitialized → Active. Returns false from any other state.
    pub(crate) fn activate(&self) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Uninitialized {
            return false;
        }
        *state = SessionState::Active;
        true
    }

    /// Install the hook run on the first close. Replaces any earlier hook.
    pub fn on_close(&self, hook: impl FnOnce(&str) + Send + 'static) {
        *self.on_close.lock() = Some(Box::new(hook));
    }

    /// Wait for this session's turn to process a request.
    pub async fn acquire(&self) -> AsyncMutexGuard<'_, ()> {
        self.touch();
        self.request_gate.lock().await
    }

    /// Receiver that flips to `true` once the session closes.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    /// Close the transport. A second close is an error and fires nothing.
    pub fn close(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Closed {
                return Err(SessionError::AlreadyClosed(self.id.clone()));
            }
            *state = SessionState::Closed;
        }

        self.closed_tx.send_replace(true);

        let hook = self.on_close.lock().take();
        if let Some(hook) = hook {
            hook(&self.id);
        }

        info!("Session closed: {}", self.id);
        Ok(())
    }
}

impl std::fmt::Debug for SessionTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTransport")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
