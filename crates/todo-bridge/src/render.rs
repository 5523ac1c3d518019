//! Display surfaces for artifacts.

use std::path::{Path, PathBuf};

use todo_protocol::ResourceArtifact;
use tracing::{info, warn};

use crate::host::HostError;

/// Where the host shows artifacts and failures.
pub trait Renderer: Send {
    /// Replace whatever is displayed with `artifact`.
    fn render(&mut self, artifact: &ResourceArtifact) -> Result<(), HostError>;

    /// Surface a failed operation to the user. Must not alter the
    /// displayed artifact.
    fn report_failure(&mut self, message: &str);
}

/// Writes each artifact's HTML to a file, overwriting the previous render.
pub struct FileRenderer {
    path: PathBuf,
    renders: usize,
}

impl FileRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            renders: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl Renderer for FileRenderer {
    fn render(&mut self, artifact: &ResourceArtifact) -> Result<(), HostError> {
        let html = artifact.html()?;
        std::fs::write(&self.path, html)?;
        self.renders += 1;
        info!("Rendered {} to {} (#{})", artifact.uri, self.path.display(), self.renders);
        Ok(())
    }

    fn report_failure(&mut self, message: &str) {
        warn!("Operation failed: {message}");
        eprintln!("❌ {message}");
    }
}
