//! Session registry: sole owner of session lifecycle.
//!
//! Sessions start in a pending table while their initialize handshake runs
//! and move to the live table once it completes. `lookup` only ever sees the
//! live table, so an id returned from it is always Active.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::session::SessionTransport;

#[derive(Default)]
pub struct SessionRegistry {
    pending: RwLock<HashMap<String, Arc<SessionTransport>>>,
    active: RwLock<HashMap<String, Arc<SessionTransport>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an Uninitialized session under `id`.
    ///
    /// The session's close hook removes it from this registry, so a closed
    /// transport never leaves an entry behind whatever path closed it.
    pub fn create(self: &Arc<Self>, id: impl Into<String>) -> Arc<SessionTransport> {
        let id = id.into();
        let session = Arc::new(SessionTransport::new(id.clone()));

        let registry = Arc::downgrade(self);
        session.on_close(move |sid| {
            if let Some(registry) = registry.upgrade() {
                registry.remove(sid);
            }
        });

        self.pending.write().insert(id.clone(), session.clone());
        debug!("Session pending: {id}");
        session
    }

    /// Complete the handshake for a pending session and make it routable.
    pub fn activate(&self, id: &str) -> Option<Arc<SessionTransport>> {
        let session = self.pending.write().remove(id)?;
        if !session.activate() {
            return None;
        }
        self.active.write().insert(id.to_owned(), session.clone());
        info!("Session initialized: {id}");
        Some(session)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<SessionTransport>> {
        self.active
            .read()
            .get(id)
            .filter(|session| session.is_active())
            .cloned()
    }

    /// Drop `id` from both tables. Idempotent; returns whether anything
    /// was removed.
    pub fn remove(&self, id: &str) -> bool {
        let active = self.active.write().remove(id).is_some();
        let pending = self.pending.write().remove(id).is_some();
        if active || pending {
            debug!("Session removed: {id}");
        }
        active || pending
    }

    /// Number of Active sessions.
    pub fn len(&self) -> usize {
        self.active.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.read().is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.read().len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.active.read().keys().cloned().collect()
    }

    /// Close every session, pending or active. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let sessions: Vec<Arc<SessionTransport>> = {
            let mut active = self.active.write();
            let mut pending = self.pending.write();
            active.drain().chain(pending.drain()).map(|(_, s)| s).collect()
        };

        let mut closed = 0;
        for session in sessions {
            if session.close().is_ok() {
                closed += 1;
            }
        }
        if closed > 0 {
            info!("Closed {closed} session(s)");
        }
        closed
    }
}
