//! Table loader - concurrent load batches with failure isolation
//!
//! Every batch fans out one task per registration into a `JoinSet` and joins
//! all of them before returning. Each task runs one pipeline:
//!
//! ```text
//! SourceProvider::resolve ─(timeout, cancel)─→ normalize → parse → Table::build → registry.publish
//! ```
//!
//! A failing pipeline never publishes, never disturbs its siblings and never
//! keeps the batch from finishing. On the initial load that leaves the slot
//! absent; on a reload the previously published table stays in place.
//!
//! Batches run one at a time: a batch started while another is running waits
//! for it, so a slot is only ever written by one pipeline and the last batch
//! to start is the last to publish.
//!
//! Readiness moves `NotStarted → Loading → Ready` exactly once; reloads never
//! move it backwards.

pub mod registration;
pub mod report;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::parser::{ParseError, RowError};
use crate::registry::TableRegistry;
use crate::source::{SourceError, SourceProvider, SourceRef};
use crate::table::TableError;

pub use registration::{
    LoadConfig, PublishedTable, Registration, RegistrationError, RegistrationSet, RowPolicy,
    TableJob, TableSelection,
};
pub use report::{BatchKind, BatchReport, LoaderStats, TableOutcome};

use report::LoaderMetrics;

/// Why one table did not publish
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{count} rows rejected, first: {first}")]
    RejectedRows { count: usize, first: RowError },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("source timed out after {0:?}")]
    TimedOut(Duration),
    #[error("load cancelled")]
    Cancelled,
    #[error("load task aborted: {0}")]
    TaskFailed(String),
}

impl Serialize for LoadError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Batch-level readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotStarted,
    Loading,
    Ready,
}

/// Runs load batches for one registration set into one registry
pub struct TableLoader {
    registry: Arc<TableRegistry>,
    source: Arc<dyn SourceProvider>,
    registrations: RegistrationSet,
    config: LoadConfig,
    state: watch::Sender<LoadState>,
    cancel: Mutex<CancellationToken>,
    /// Held for the whole of a batch
    batch_gate: AsyncMutex<()>,
    metrics: LoaderMetrics,
}

impl TableLoader {
    pub fn new(
        registry: Arc<TableRegistry>,
        source: Arc<dyn SourceProvider>,
        registrations: RegistrationSet,
        config: LoadConfig,
    ) -> Self {
        let (state, _) = watch::channel(LoadState::NotStarted);
        Self {
            registry,
            source,
            registrations,
            config,
            state,
            cancel: Mutex::new(CancellationToken::new()),
            batch_gate: AsyncMutex::new(()),
            metrics: LoaderMetrics::default(),
        }
    }

    pub fn registry(&self) -> &Arc<TableRegistry> {
        &self.registry
    }

    pub fn registrations(&self) -> &RegistrationSet {
        &self.registrations
    }

    // =====================================================
    // Readiness
    // =====================================================

    pub fn state(&self) -> LoadState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LoadState::Ready
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    /// Resolves once the first full batch has finished
    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting
        let _ = rx.wait_for(|state| *state == LoadState::Ready).await;
    }

    fn advance(&self, next: LoadState) {
        self.state.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    // =====================================================
    // Batches
    // =====================================================

    /// Initial load of every registration
    pub async fn load_all(&self) -> BatchReport {
        self.run_batch(BatchKind::Load, self.registrations.jobs().to_vec())
            .await
    }

    /// Re-run every registration and republish every slot that succeeds
    pub async fn reload_all(&self) -> BatchReport {
        self.run_batch(BatchKind::ReloadAll, self.registrations.jobs().to_vec())
            .await
    }

    /// Re-run only the selected registrations; other slots are untouched
    pub async fn reload_subset(&self, selection: &TableSelection) -> BatchReport {
        let jobs = self.registrations.select(selection);
        if jobs.is_empty() {
            warn!(?selection, "reload selection matched no registrations");
        }
        self.run_batch(BatchKind::ReloadSubset, jobs).await
    }

    /// Cancel every batch currently in flight or waiting for its turn
    ///
    /// Cancelled pipelines leave their slots as they were. Batches started
    /// afterwards run normally.
    pub fn cancel(&self) {
        let mut token = self.cancel.lock();
        token.cancel();
        *token = CancellationToken::new();
    }

    pub fn stats(&self) -> LoaderStats {
        self.metrics.snapshot()
    }

    async fn run_batch(&self, kind: BatchKind, jobs: Vec<Arc<dyn TableJob>>) -> BatchReport {
        // Must be taken before the Loading transition is visible
        let batch_token = self.cancel.lock().child_token();
        let _gate = self.batch_gate.lock().await;
        let full_batch = kind != BatchKind::ReloadSubset;
        if full_batch {
            self.advance(LoadState::Loading);
        }

        let started = Instant::now();
        info!(?kind, tables = jobs.len(), source = self.source.name(), "table batch started");

        let mut tasks = JoinSet::new();
        for (slot, job) in jobs.iter().enumerate() {
            let job = Arc::clone(job);
            let source = Arc::clone(&self.source);
            let registry = Arc::clone(&self.registry);
            let token = batch_token.clone();
            let timeout = self.config.source_timeout;
            tasks.spawn(async move {
                let outcome = run_pipeline(job.as_ref(), source.as_ref(), &registry, timeout, &token).await;
                (slot, outcome)
            });
        }

        let mut outcomes: Vec<Option<TableOutcome>> = jobs.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, outcome)) => outcomes[slot] = Some(outcome),
                Err(e) => error!(error = %e, "table load task failed"),
            }
        }

        let outcomes: Vec<TableOutcome> = outcomes
            .into_iter()
            .zip(&jobs)
            .map(|(outcome, job)| {
                outcome.unwrap_or_else(|| TableOutcome {
                    record_type: job.record_name(),
                    source_id: job.source_id().to_string(),
                    elapsed: started.elapsed(),
                    result: Err(LoadError::TaskFailed("task did not complete".to_string())),
                })
            })
            .collect();

        let report = BatchReport {
            kind,
            outcomes,
            elapsed: started.elapsed(),
        };
        self.metrics.record_batch(&report);

        if full_batch {
            self.advance(LoadState::Ready);
        }
        info!(
            ?kind,
            loaded = report.loaded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "table batch finished"
        );
        report
    }
}

impl std::fmt::Debug for TableLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableLoader")
            .field("source", &self.source.name())
            .field("registrations", &self.registrations)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// One registration: resolve, build, publish
async fn run_pipeline(
    job: &dyn TableJob,
    source: &dyn SourceProvider,
    registry: &TableRegistry,
    timeout: Duration,
    cancel: &CancellationToken,
) -> TableOutcome {
    let started = Instant::now();
    let source_ref = SourceRef {
        id: job.source_id(),
        dev_file: job.dev_file(),
    };

    let resolved = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoadError::Cancelled),
        result = tokio::time::timeout(timeout, source.resolve(&source_ref)) => match result {
            Ok(text) => text.map_err(LoadError::from),
            Err(_) => Err(LoadError::TimedOut(timeout)),
        },
    };

    let result = resolved.and_then(|raw| {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        job.publish(&raw, registry)
    });

    match &result {
        Ok(published) => info!(
            source = job.source_id(),
            record = job.record_name(),
            rows = published.rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "table published"
        ),
        Err(LoadError::Cancelled) => warn!(source = job.source_id(), "table load cancelled"),
        Err(e) => error!(
            source = job.source_id(),
            record = job.record_name(),
            error = %e,
            "table load failed"
        ),
    }

    TableOutcome {
        record_type: job.record_name(),
        source_id: job.source_id().to_string(),
        elapsed: started.elapsed(),
        result,
    }
}
