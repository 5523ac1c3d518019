//! Renderable UI artifacts.
//!
//! An artifact is a self-contained HTML snapshot addressed by a `ui://` URI.
//! It travels inside tool results as an embedded resource whose `_meta`
//! carries the display metadata.

use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::EmbeddedResource;
use crate::error::McpError;

/// URI of the todo list artifact.
pub const TODO_LIST_URI: &str = "ui://todo/list";

/// MIME type of raw HTML artifacts.
pub const HTML_MIME_TYPE: &str = "text/html";

/// How the artifact content is carried on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactEncoding {
    /// HTML in the resource `text` field.
    #[default]
    Text,
    /// Base64-encoded HTML in the resource `blob` field.
    Blob,
}

impl FromStr for ArtifactEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            other => Err(format!("unknown artifact encoding '{other}', expected text or blob")),
        }
    }
}

/// Display metadata attached to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub title: String,
    pub description: String,
    #[serde(rename = "preferredRenderContext")]
    pub preferred_render_context: String,
}

/// A full, independent snapshot of rendered state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceArtifact {
    pub uri: String,
    pub encoding: ArtifactEncoding,
    pub mime_type: String,
    /// HTML for `Text`, base64 of the HTML for `Blob`.
    pub content: String,
    pub metadata: ArtifactMetadata,
}

impl ResourceArtifact {
    /// Wrap raw HTML with the given encoding.
    pub fn from_html(
        uri: impl Into<String>,
        html: &str,
        encoding: ArtifactEncoding,
        metadata: ArtifactMetadata,
    ) -> Self {
        let content = match encoding {
            ArtifactEncoding::Text => html.to_owned(),
            ArtifactEncoding::Blob => STANDARD.encode(html.as_bytes()),
        };
        Self {
            uri: uri.into(),
            encoding,
            mime_type: HTML_MIME_TYPE.into(),
            content,
            metadata,
        }
    }

    /// Decoded HTML regardless of encoding.
    pub fn html(&self) -> Result<String, McpError> {
        match self.encoding {
            ArtifactEncoding::Text => Ok(self.content.clone()),
            ArtifactEncoding::Blob => {
                let bytes = STANDARD
                    .decode(self.content.as_bytes())
                    .map_err(|e| McpError::internal(format!("Invalid artifact blob: {e}")))?;
                String::from_utf8(bytes)
                    .map_err(|e| McpError::internal(format!("Artifact is not UTF-8: {e}")))
            }
        }
    }

    pub fn into_embedded(self) -> EmbeddedResource {
        let meta = match serde_json::to_value(&self.metadata) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        let (text, blob) = match self.encoding {
            ArtifactEncoding::Text => (Some(self.content), None),
            ArtifactEncoding::Blob => (None, Some(self.content)),
        };
        EmbeddedResource {
            uri: self.uri,
            mime_type: Some(self.mime_type),
            text,
            blob,
            meta,
        }
    }

    /// Rebuild an artifact from an embedded `ui://` resource.
    pub fn from_embedded(resource: &EmbeddedResource) -> Option<Self> {
        if !resource.uri.starts_with("ui://") {
            return None;
        }
        let (encoding, content) = match (&resource.text, &resource.blob) {
            (Some(text), _) => (ArtifactEncoding::Text, text.clone()),
            (None, Some(blob)) => (ArtifactEncoding::Blob, blob.clone()),
            (None, None) => return None,
        };
        let metadata = resource
            .meta
            .clone()
            .and_then(|m| serde_json::from_value(Value::Object(m)).ok())
            .unwrap_or_else(|| ArtifactMetadata {
                title: String::new(),
                description: String::new(),
                preferred_render_context: String::new(),
            });
        Some(Self {
            uri: resource.uri.clone(),
            encoding,
            mime_type: resource
                .mime_type
                .clone()
                .unwrap_or_else(|| HTML_MIME_TYPE.into()),
            content,
            metadata,
        })
    }
}

impl From<ResourceArtifact> for EmbeddedResource {
    fn from(artifact: ResourceArtifact) -> Self {
        artifact.into_embedded()
    }
}
