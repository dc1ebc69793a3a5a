//! Distribution path: text assets fetched by key.
//!
//! The asset store itself (bundle download, caching, addressing) belongs to
//! the host application and is reached through the [`AssetStore`] trait.
//! [`MemoryAssetStore`] is the in-process implementation used by tools and tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::error::Error;

use super::{non_empty, SourceError, SourceProvider, SourceRef};

/// Result type for asset store operations
pub type AssetResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Packaged text assets addressed by key
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// `Ok(None)` when no asset exists under `key`
    async fn load_text(&self, key: &str) -> AssetResult<Option<String>>;
}

/// Asset store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: RwLock<HashMap<String, String>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, text: impl Into<String>) {
        self.assets.write().insert(key.into(), text.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.assets.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn load_text(&self, key: &str) -> AssetResult<Option<String>> {
        Ok(self.assets.read().get(key).cloned())
    }
}

/// Source backed by an [`AssetStore`]
pub struct PackagedSource {
    store: std::sync::Arc<dyn AssetStore>,
}

impl PackagedSource {
    pub fn new(store: std::sync::Arc<dyn AssetStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SourceProvider for PackagedSource {
    fn name(&self) -> &'static str {
        "packaged"
    }

    async fn resolve(&self, source: &SourceRef<'_>) -> Result<String, SourceError> {
        match self.store.load_text(source.id).await {
            Ok(Some(text)) => non_empty(source.id, text),
            Ok(None) => Err(SourceError::NotFound {
                id: source.id.to_string(),
                location: format!("asset key '{}'", source.id),
            }),
            Err(e) => Err(SourceError::Fetch {
                id: source.id.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct BrokenStore;

    #[async_trait]
    impl AssetStore for BrokenStore {
        async fn load_text(&self, _key: &str) -> AssetResult<Option<String>> {
            Err("bundle catalog unavailable".into())
        }
    }

    fn skill_ref() -> SourceRef<'static> {
        SourceRef {
            id: "SkillTable",
            dev_file: "SkillTable.csv",
        }
    }

    #[tokio::test]
    async fn test_resolves_by_identifier_not_file_name() {
        let store = Arc::new(MemoryAssetStore::new());
        store.insert("SkillTable", "Skill_ID\n1\n");
        store.insert("SkillTable.csv", "wrong");

        let source = PackagedSource::new(store);
        assert_eq!(source.resolve(&skill_ref()).await.unwrap(), "Skill_ID\n1\n");
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_found() {
        let source = PackagedSource::new(Arc::new(MemoryAssetStore::new()));
        assert!(source.resolve(&skill_ref()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_store_error_becomes_fetch_error() {
        let source = PackagedSource::new(Arc::new(BrokenStore));
        let err = source.resolve(&skill_ref()).await.unwrap_err();
        match err {
            SourceError::Fetch { id, reason } => {
                assert_eq!(id, "SkillTable");
                assert!(reason.contains("catalog unavailable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_memory_store_insert_remove() {
        let store = MemoryAssetStore::new();
        assert!(store.is_empty());
        store.insert("A", "x");
        store.insert("B", "y");
        assert_eq!(store.len(), 2);
        assert_eq!(store.remove("A").as_deref(), Some("x"));
        assert_eq!(store.len(), 1);
    }
}
