//! Hot reload of dev-root tables
//!
//! Watches the dev fast-path directory and re-runs the loader for the tables
//! whose files change:
//! - Uses `notify` for filesystem events, forwarded into a tokio channel
//! - Events are debounced; editors emit several per save
//! - SHA3-256 digests skip saves that did not change the content; a digest
//!   is recorded only once its table reloaded, so a failed reload is retried
//!   on the next save
//! - Changed files map to registrations by dev file name → `reload_subset`
//! - A failed reload keeps the previous table (loader semantics)

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::loader::{TableLoader, TableSelection};

#[derive(Debug, thiserror::Error)]
pub enum HotReloadError {
    #[error("dev root {0:?} does not exist")]
    MissingRoot(PathBuf),
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Hot-reload status snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotReloadStatus {
    pub enabled: bool,
    pub watched_root: Option<String>,
    pub reload_count: u32,
    pub skipped_unchanged: u32,
    pub last_reload_success: bool,
    pub last_reloaded: Vec<String>,
    pub last_error: Option<String>,
}

impl HotReloadStatus {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

type ContentDigest = [u8; 32];

fn digest(bytes: &[u8]) -> ContentDigest {
    Sha3_256::digest(bytes).into()
}

/// Create or modify of any file
fn is_table_event(event: &Event) -> bool {
    event.kind.is_modify() || matches!(event.kind, EventKind::Create(_))
}

/// Collects changed files between flushes and issues the reloads
struct ReloadWorker {
    loader: Arc<TableLoader>,
    root: PathBuf,
    digests: HashMap<String, ContentDigest>,
    pending: BTreeSet<String>,
    status: Arc<Mutex<HotReloadStatus>>,
}

impl ReloadWorker {
    fn new(loader: Arc<TableLoader>, root: PathBuf, status: Arc<Mutex<HotReloadStatus>>) -> Self {
        let digests = loader
            .registrations()
            .jobs()
            .iter()
            .filter_map(|job| {
                let bytes = std::fs::read(root.join(job.dev_file())).ok()?;
                Some((job.dev_file().to_string(), digest(&bytes)))
            })
            .collect();
        Self {
            loader,
            root,
            digests,
            pending: BTreeSet::new(),
            status,
        }
    }

    /// Dev file name for `path`, if a registration owns it
    fn dev_file_for(&self, path: &Path) -> Option<String> {
        let relative = path
            .strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"));
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());

        let registrations = self.loader.registrations();
        [relative, file_name]
            .into_iter()
            .flatten()
            .find(|name| registrations.find_by_dev_file(name).is_some())
    }

    fn collect(&mut self, event: notify::Result<Event>) {
        match event {
            Ok(event) if is_table_event(&event) => {
                for path in &event.paths {
                    if let Some(file) = self.dev_file_for(path) {
                        self.pending.insert(file);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "file watcher error");
                self.status.lock().last_error = Some(e.to_string());
            }
        }
    }

    /// Reload every pending file whose content changed
    async fn flush(&mut self) {
        let mut selection = TableSelection::new();
        let mut changed = Vec::new();
        let mut fresh = Vec::new();

        for file in std::mem::take(&mut self.pending) {
            let bytes = match tokio::fs::read(self.root.join(&file)).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(file = %file, error = %e, "changed file unreadable, skipping");
                    continue;
                }
            };
            let new_digest = digest(&bytes);
            if self.digests.get(&file) == Some(&new_digest) {
                debug!(file = %file, "content unchanged, skipping");
                self.status.lock().skipped_unchanged += 1;
                continue;
            }
            fresh.push((file.clone(), new_digest));
            selection = selection.source(file.clone());
            changed.push(file);
        }

        if changed.is_empty() {
            return;
        }

        info!(files = ?changed, "dev tables changed, reloading");
        let report = self.loader.reload_subset(&selection).await;

        for (file, new_digest) in fresh {
            let loaded = self
                .loader
                .registrations()
                .find_by_dev_file(&file)
                .and_then(|job| report.outcome(job.source_id()))
                .is_some_and(|outcome| outcome.is_loaded());
            if loaded {
                self.digests.insert(file, new_digest);
            }
        }

        let mut status = self.status.lock();
        status.reload_count += 1;
        status.last_reload_success = report.is_complete_success();
        status.last_error = report
            .failures()
            .next()
            .map(|o| format!("{}: {}", o.source_id, o.error().map(|e| e.to_string()).unwrap_or_default()));
        status.last_reloaded = changed;
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        debounce: Duration,
        shutdown: CancellationToken,
    ) {
        loop {
            let first = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.collect(first);

            // Drain until the directory has been quiet for `debounce`
            while let Ok(Some(event)) = tokio::time::timeout(debounce, events.recv()).await {
                self.collect(event);
            }
            if shutdown.is_cancelled() {
                break;
            }
            self.flush().await;
        }
        debug!("hot reload worker stopped");
    }
}

/// Running dev-root watcher; dropping it stops the watch
pub struct HotReloader {
    _watcher: RecommendedWatcher,
    status: Arc<Mutex<HotReloadStatus>>,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl HotReloader {
    /// Start watching `root`; must be called inside a tokio runtime
    pub fn start(
        loader: Arc<TableLoader>,
        root: impl AsRef<Path>,
        debounce: Duration,
    ) -> Result<Self, HotReloadError> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root).map_err(|_| HotReloadError::MissingRoot(root.to_path_buf()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // Receiver gone means the reloader is shutting down
            let _ = tx.send(event);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let status = Arc::new(Mutex::new(HotReloadStatus {
            enabled: true,
            watched_root: Some(root.display().to_string()),
            ..HotReloadStatus::default()
        }));
        let shutdown = CancellationToken::new();
        let worker = ReloadWorker::new(loader, root.clone(), Arc::clone(&status));
        let worker = tokio::spawn(worker.run(rx, debounce, shutdown.clone()));

        info!(root = %root.display(), debounce_ms = debounce.as_millis() as u64, "hot reload enabled");
        Ok(Self {
            _watcher: watcher,
            status,
            shutdown,
            worker,
        })
    }

    pub fn status(&self) -> HotReloadStatus {
        self.status.lock().clone()
    }

    /// Stop watching and wait for an in-progress reload to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.worker.await {
            warn!(error = %e, "hot reload worker ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadConfig, Registration, RegistrationSet};
    use crate::parser::Schema;
    use crate::registry::TableRegistry;
    use crate::source::FileSystemSource;

    #[derive(Debug, Default)]
    struct Stage {
        id: i32,
        floor: i32,
    }

    #[derive(Debug, Default)]
    struct Currency {
        id: i32,
    }

    fn modify_event(path: PathBuf) -> Event {
        Event {
            kind: EventKind::Modify(notify::event::ModifyKind::Data(
                notify::event::DataChange::Any,
            )),
            paths: vec![path],
            attrs: Default::default(),
        }
    }

    async fn setup() -> (tempfile::TempDir, Arc<TableLoader>, ReloadWorker) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("StageTable.csv"), "Stage_ID,Floor\n1,1\n").unwrap();
        std::fs::write(dir.path().join("CurrencyTable.csv"), "Currency_ID\n1\n").unwrap();

        let registrations = RegistrationSet::new()
            .with(Registration::new(
                "StageTable",
                Schema::new()
                    .required("Stage_ID", |r: &mut Stage, v: i32| r.id = v)
                    .required("Floor", |r: &mut Stage, v: i32| r.floor = v),
                |s| s.id,
            ))
            .unwrap()
            .with(Registration::new(
                "CurrencyTable",
                Schema::new().required("Currency_ID", |r: &mut Currency, v: i32| r.id = v),
                |c| c.id,
            ))
            .unwrap();
        let loader = Arc::new(TableLoader::new(
            Arc::new(TableRegistry::new()),
            Arc::new(FileSystemSource::new(dir.path())),
            registrations,
            LoadConfig::default(),
        ));
        loader.load_all().await;

        let status = Arc::new(Mutex::new(HotReloadStatus::default()));
        let worker = ReloadWorker::new(Arc::clone(&loader), dir.path().to_path_buf(), status);
        (dir, loader, worker)
    }

    #[test]
    fn test_is_table_event() {
        assert!(is_table_event(&modify_event(PathBuf::from("a.csv"))));
        let access = Event {
            kind: EventKind::Access(notify::event::AccessKind::Any),
            paths: vec![PathBuf::from("a.csv")],
            attrs: Default::default(),
        };
        assert!(!is_table_event(&access));
    }

    #[test]
    fn test_hotreload_status_json() {
        let status = HotReloadStatus {
            enabled: true,
            watched_root: Some("Assets/Resources/CSV".to_string()),
            reload_count: 5,
            last_reload_success: true,
            ..HotReloadStatus::default()
        };
        let json = status.to_json();
        assert!(json.contains("\"enabled\":true"));
        assert!(json.contains("\"reload_count\":5"));
        assert_eq!(HotReloadStatus::from_json(&json), Some(status));
        assert!(HotReloadStatus::from_json("{invalid").is_none());
    }

    #[tokio::test]
    async fn test_changed_file_reloads_only_its_table() {
        let (dir, loader, mut worker) = setup().await;
        let currency = loader.registry().table::<Currency>().unwrap();

        std::fs::write(dir.path().join("StageTable.csv"), "Stage_ID,Floor\n1,7\n2,8\n").unwrap();
        worker.collect(Ok(modify_event(dir.path().join("StageTable.csv"))));
        worker.collect(Ok(modify_event(dir.path().join("notes.txt"))));
        assert_eq!(worker.pending.len(), 1);
        worker.flush().await;

        assert_eq!(loader.registry().get_by_key::<Stage>(1).unwrap().floor, 7);
        assert_eq!(loader.registry().table::<Stage>().unwrap().len(), 2);
        assert!(Arc::ptr_eq(&currency, &loader.registry().table::<Currency>().unwrap()));

        let status = worker.status.lock().clone();
        assert_eq!(status.reload_count, 1);
        assert!(status.last_reload_success);
        assert_eq!(status.last_reloaded, vec!["StageTable.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_unchanged_content_is_skipped() {
        let (dir, loader, mut worker) = setup().await;
        let before = loader.registry().table::<Stage>().unwrap();

        // Touch without changing bytes
        std::fs::write(dir.path().join("StageTable.csv"), "Stage_ID,Floor\n1,1\n").unwrap();
        worker.collect(Ok(modify_event(dir.path().join("StageTable.csv"))));
        worker.flush().await;

        assert!(Arc::ptr_eq(&before, &loader.registry().table::<Stage>().unwrap()));
        let status = worker.status.lock().clone();
        assert_eq!(status.reload_count, 0);
        assert_eq!(status.skipped_unchanged, 1);
    }

    #[tokio::test]
    async fn test_broken_edit_keeps_previous_table() {
        let (dir, loader, mut worker) = setup().await;
        let before = loader.registry().table::<Stage>().unwrap();

        std::fs::write(dir.path().join("StageTable.csv"), "Floor\n3\n").unwrap();
        worker.collect(Ok(modify_event(dir.path().join("StageTable.csv"))));
        worker.flush().await;

        assert!(Arc::ptr_eq(&before, &loader.registry().table::<Stage>().unwrap()));
        let status = worker.status.lock().clone();
        assert!(!status.last_reload_success);
        assert!(status.last_error.unwrap().contains("Stage_ID"));
    }

    #[tokio::test]
    async fn test_failed_reload_is_retried_on_next_save() {
        let (dir, loader, mut worker) = setup().await;
        let original = worker.digests.get("StageTable.csv").copied();
        assert!(original.is_some());

        std::fs::write(dir.path().join("StageTable.csv"), "Floor\n3\n").unwrap();
        worker.collect(Ok(modify_event(dir.path().join("StageTable.csv"))));
        worker.flush().await;
        assert_eq!(worker.digests.get("StageTable.csv").copied(), original);

        // Same bytes again: not skipped, since the last attempt did not publish
        worker.collect(Ok(modify_event(dir.path().join("StageTable.csv"))));
        worker.flush().await;
        let status = worker.status.lock().clone();
        assert_eq!(status.reload_count, 2);
        assert_eq!(status.skipped_unchanged, 0);

        std::fs::write(dir.path().join("StageTable.csv"), "Stage_ID,Floor\n1,9\n").unwrap();
        worker.collect(Ok(modify_event(dir.path().join("StageTable.csv"))));
        worker.flush().await;
        assert_eq!(loader.registry().get_by_key::<Stage>(1).unwrap().floor, 9);
        assert_ne!(worker.digests.get("StageTable.csv").copied(), original);
    }

    #[tokio::test]
    async fn test_start_requires_existing_root() {
        let (_dir, loader, _worker) = setup().await;
        let err = HotReloader::start(loader, "/definitely/not/a/dev/root", Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(matches!(err, HotReloadError::MissingRoot(_)));
    }
}
