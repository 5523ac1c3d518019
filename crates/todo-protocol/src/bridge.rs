//! ActionBridge wire format: messages a rendered artifact posts to its host.
//!
//! The channel is one-way. A message names an operation and its target; the
//! host answers by issuing a fresh tool call and re-rendering, never by
//! replying to the `messageId`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Per-send message identifier. Never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(format!("msg-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message category as set by the artifact. Informational only: the host
/// dispatches on the payload's operation name. Unrecognised or missing
/// categories read as `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Tool,
    Prompt,
    Intent,
    Notify,
    Link,
    #[default]
    Other,
}

impl From<&str> for ActionKind {
    fn from(kind: &str) -> Self {
        match kind {
            "tool" => Self::Tool,
            "prompt" => Self::Prompt,
            "intent" => Self::Intent,
            "notify" => Self::Notify,
            "link" => Self::Link,
            _ => Self::Other,
        }
    }
}

fn lenient_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ActionKind, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(raw.as_str().map(ActionKind::from).unwrap_or_default())
}

/// Operation requested by the user interaction.
///
/// Artifacts name the operation `operationName`; `toolName` is accepted for
/// senders that already speak in tool terms. When both are present,
/// `operationName` wins (see [`ActionMessage::from_value`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPayload {
    #[serde(rename = "toolName", alias = "operationName")]
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ActionPayload {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            id: None,
            text: None,
            completed: None,
            prompt: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }
}

/// `{type, messageId, payload}` as posted by the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: ActionKind,
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    pub payload: ActionPayload,
}

impl ActionMessage {
    /// Build a message with a freshly generated id.
    pub fn new(kind: ActionKind, payload: ActionPayload) -> Self {
        Self {
            kind,
            message_id: MessageId::generate(),
            payload,
        }
    }

    /// Accept an inbound value from the shared channel.
    ///
    /// Values without a non-empty string `messageId`, or without a payload
    /// naming an operation, belong to someone else and yield `None`. The
    /// `type` field never causes a discard.
    pub fn from_value(value: &Value) -> Option<Self> {
        let has_id = value
            .get("messageId")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty());
        if !has_id {
            return None;
        }

        let mut value = value.clone();
        if let Some(payload) = value.get_mut("payload").and_then(Value::as_object_mut) {
            if payload.contains_key("operationName") {
                payload.remove("toolName");
            }
        }
        Self::deserialize(value).ok()
    }
}
