//! Source backends - resolve a table identifier to raw CSV text
//!
//! Every table load starts here. Two concrete backends exist:
//! - **FileSystemSource**: dev fast path, `<root>/<dev file>` read straight from disk
//! - **PackagedSource**: distribution path, text fetched by key from an asset store
//!
//! `FallbackSource` chains them (dev file first, packaged asset when the file
//! is absent). Which arrangement is used is picked once, at construction, from
//! [`SourceMode`].
//!
//! ## Architecture
//! ```text
//! [TableLoader]
//!       ↓ resolve(SourceRef)
//! [SourceProvider trait]
//!       ↓
//! ┌──────────────────┬──────────────────┐
//! │ FileSystemSource │ PackagedSource   │
//! │ (dev root)       │ (AssetStore)     │
//! └──────────────────┴──────────────────┘
//! ```
//!
//! Backends never panic or raise past this boundary: every failure comes
//! back as a [`SourceError`].

pub mod filesystem;
pub mod packaged;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::SourceConfig;

pub use filesystem::FileSystemSource;
pub use packaged::{AssetResult, AssetStore, MemoryAssetStore, PackagedSource};

/// What a backend needs to locate one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRef<'a> {
    /// Opaque identifier handed to the packaged backend
    pub id: &'a str,
    /// File name under the dev root
    pub dev_file: &'a str,
}

/// Failure to produce text for a table
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source '{id}' not found at {location}")]
    NotFound { id: String, location: String },
    #[error("IO error reading '{id}' from {path:?}: {source}")]
    Io {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fetch of '{id}' failed: {reason}")]
    Fetch { id: String, reason: String },
    #[error("source '{id}' is empty")]
    Empty { id: String },
    #[error("source mode '{mode}' requires an asset store")]
    Unconfigured { mode: &'static str },
}

impl SourceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }
}

/// Backend arrangement chosen at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Dev root only
    FileSystem,
    /// Asset store only (production)
    Packaged,
    /// Dev root first, asset store when the file is absent
    DevOverlay,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::FileSystem => "file_system",
            SourceMode::Packaged => "packaged",
            SourceMode::DevOverlay => "dev_overlay",
        }
    }
}

impl std::str::FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "file_system" | "filesystem" | "fs" => Ok(SourceMode::FileSystem),
            "packaged" | "package" | "assets" => Ok(SourceMode::Packaged),
            "dev_overlay" | "dev" | "overlay" => Ok(SourceMode::DevOverlay),
            other => Err(format!("unknown source mode '{other}'")),
        }
    }
}

/// Resolves table identifiers to raw text
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Short backend name for logs and reports
    fn name(&self) -> &'static str;

    async fn resolve(&self, source: &SourceRef<'_>) -> Result<String, SourceError>;
}

/// Reject text that carries no rows at all
pub(crate) fn non_empty(id: &str, text: String) -> Result<String, SourceError> {
    if text.trim().is_empty() {
        Err(SourceError::Empty { id: id.to_string() })
    } else {
        Ok(text)
    }
}

/// Dev fast path with packaged fallback
pub struct FallbackSource {
    primary: Arc<dyn SourceProvider>,
    fallback: Arc<dyn SourceProvider>,
}

impl FallbackSource {
    pub fn new(primary: Arc<dyn SourceProvider>, fallback: Arc<dyn SourceProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl SourceProvider for FallbackSource {
    fn name(&self) -> &'static str {
        "dev_overlay"
    }

    async fn resolve(&self, source: &SourceRef<'_>) -> Result<String, SourceError> {
        match self.primary.resolve(source).await {
            Err(e) if e.is_not_found() => {
                debug!(
                    source = source.id,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "dev file absent, using fallback"
                );
                self.fallback.resolve(source).await
            }
            other => other,
        }
    }
}

/// Build the configured backend arrangement
pub fn build_source(
    config: &SourceConfig,
    assets: Option<Arc<dyn AssetStore>>,
) -> Result<Arc<dyn SourceProvider>, SourceError> {
    let packaged = || -> Result<Arc<dyn SourceProvider>, SourceError> {
        let store = assets.clone().ok_or(SourceError::Unconfigured {
            mode: config.mode.as_str(),
        })?;
        Ok(Arc::new(PackagedSource::new(store)))
    };

    Ok(match config.mode {
        SourceMode::FileSystem => Arc::new(FileSystemSource::new(&config.dev_root)),
        SourceMode::Packaged => packaged()?,
        SourceMode::DevOverlay => Arc::new(FallbackSource::new(
            Arc::new(FileSystemSource::new(&config.dev_root)),
            packaged()?,
        )),
    })
}
