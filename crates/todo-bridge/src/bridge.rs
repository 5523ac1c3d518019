//! One-way channel from a rendered artifact to its host.
//!
//! The channel carries raw JSON values because, like a window message bus,
//! it may also carry traffic that has nothing to do with the artifact. The
//! listener drops anything that is not a well-formed action.

use serde_json::Value;
use thiserror::Error;
use todo_protocol::{ActionKind, ActionMessage, ActionPayload, MessageId};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("action bridge closed")]
    Closed,

    #[error("failed to encode action: {0}")]
    Encode(String),
}

pub struct ActionBridge;

impl ActionBridge {
    /// Create a bounded bridge channel.
    pub fn channel(capacity: usize) -> (ActionSender, ActionListener) {
        let (tx, rx) = mpsc::channel(capacity);
        (ActionSender { tx }, ActionListener { rx, discarded: 0 })
    }
}

/// Artifact side of the bridge.
#[derive(Clone)]
pub struct ActionSender {
    tx: mpsc::Sender<Value>,
}

impl ActionSender {
    /// Post an arbitrary value onto the channel.
    pub async fn post(&self, raw: Value) -> Result<(), BridgeError> {
        self.tx.send(raw).await.map_err(|_| BridgeError::Closed)
    }

    /// Post an action with a freshly minted message id and return that id.
    pub async fn send(&self, kind: ActionKind, payload: ActionPayload) -> Result<MessageId, BridgeError> {
        let message = ActionMessage::new(kind, payload);
        let id = message.message_id.clone();
        let value =
            serde_json::to_value(&message).map_err(|e| BridgeError::Encode(e.to_string()))?;
        self.post(value).await?;
        Ok(id)
    }
}

/// Host side of the bridge.
pub struct ActionListener {
    rx: mpsc::Receiver<Value>,
    discarded: u64,
}

impl ActionListener {
    /// Next valid action, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<ActionMessage> {
        while let Some(value) = self.rx.recv().await {
            match ActionMessage::from_value(&value) {
                Some(message) => return Some(message),
                None => {
                    self.discarded += 1;
                    debug!("Discarding non-action message on bridge");
                }
            }
        }
        None
    }

    /// How many inbound values were dropped as foreign or malformed.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}
