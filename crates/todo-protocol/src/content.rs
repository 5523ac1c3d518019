//! Tool and resource payloads carried inside JSON-RPC results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resource::ResourceArtifact;

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// A resource embedded in a tool result or returned by `resources/read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
    Resource { resource: EmbeddedResource },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Machine-readable outcome carried in the first text block of every todo
/// tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Result of `tools/call`. Business failures keep the JSON-RPC exchange
/// successful and set `isError`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError", default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl CallToolResult {
    /// Successful result: outcome text followed by a fresh artifact.
    pub fn success(outcome: &ToolOutcome, artifact: ResourceArtifact) -> Self {
        Self {
            content: vec![
                Content::text(outcome_text(outcome)),
                Content::Resource {
                    resource: artifact.into_embedded(),
                },
            ],
            is_error: false,
        }
    }

    /// Business failure: outcome text only.
    pub fn failure(message: impl Into<String>) -> Self {
        let outcome = ToolOutcome::failed(message);
        Self {
            content: vec![Content::text(outcome_text(&outcome))],
            is_error: true,
        }
    }

    /// First text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            Content::Text { text } => Some(text.as_str()),
            Content::Resource { .. } => None,
        })
    }

    /// Parse the outcome JSON from the first text block.
    pub fn outcome(&self) -> Option<ToolOutcome> {
        self.text().and_then(|t| serde_json::from_str(t).ok())
    }

    /// Human-readable failure reason: the outcome message, else the raw text.
    pub fn failure_message(&self) -> String {
        self.outcome()
            .and_then(|o| o.message)
            .or_else(|| self.text().map(str::to_owned))
            .unwrap_or_else(|| "Tool call failed".into())
    }

    /// The first embedded UI artifact, if any.
    pub fn artifact(&self) -> Option<ResourceArtifact> {
        self.content.iter().find_map(|c| match c {
            Content::Resource { resource } => ResourceArtifact::from_embedded(resource),
            Content::Text { .. } => None,
        })
    }
}

fn outcome_text(outcome: &ToolOutcome) -> String {
    serde_json::to_string(outcome).unwrap_or_else(|_| {
        format!(r#"{{"success":{}}}"#, outcome.success)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Resources
// ─────────────────────────────────────────────────────────────────────────────

/// Entry in a `resources/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<EmbeddedResource>,
}
