//! Dev fast path: CSV files read directly from a root directory.
//!
//! Lets designers edit a table and rerun without repackaging assets.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{non_empty, SourceError, SourceProvider, SourceRef};

/// Reads `<root>/<dev file>`
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    root: PathBuf,
}

impl FileSystemSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location a given table is read from
    pub fn path_for(&self, source: &SourceRef<'_>) -> PathBuf {
        self.root.join(source.dev_file)
    }
}

#[async_trait]
impl SourceProvider for FileSystemSource {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn resolve(&self, source: &SourceRef<'_>) -> Result<String, SourceError> {
        let path = self.path_for(source);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                debug!(source = source.id, path = ?path, bytes = text.len(), "read dev file");
                non_empty(source.id, text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SourceError::NotFound {
                id: source.id.to_string(),
                location: path.display().to_string(),
            }),
            Err(e) => Err(SourceError::Io {
                id: source.id.to_string(),
                path,
                source: e,
            }),
        }
    }
}
