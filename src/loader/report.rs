//! Batch reports and loader counters

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::registration::PublishedTable;
use super::LoadError;

/// Which entry point started a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Load,
    ReloadAll,
    ReloadSubset,
}

/// Result of one registration's pipeline
#[derive(Debug, Serialize)]
pub struct TableOutcome {
    pub record_type: &'static str,
    pub source_id: String,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub result: Result<PublishedTable, LoadError>,
}

impl TableOutcome {
    pub fn is_loaded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&LoadError> {
        self.result.as_ref().err()
    }
}

/// Every outcome of one batch, in registration order
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub kind: BatchKind,
    pub outcomes: Vec<TableOutcome>,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn loaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_loaded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.loaded()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, source_id: &str) -> Option<&TableOutcome> {
        self.outcomes.iter().find(|o| o.source_id == source_id)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TableOutcome> {
        self.outcomes.iter().filter(|o| !o.is_loaded())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Lock-free counters shared by every batch
#[derive(Debug, Default)]
pub(crate) struct LoaderMetrics {
    batches: AtomicU64,
    tables_loaded: AtomicU64,
    tables_failed: AtomicU64,
    rows_loaded: AtomicU64,
    rows_rejected: AtomicU64,
    timeouts: AtomicU64,
}

impl LoaderMetrics {
    pub(crate) fn record_batch(&self, report: &BatchReport) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(published) => {
                    self.tables_loaded.fetch_add(1, Ordering::Relaxed);
                    self.rows_loaded.fetch_add(published.rows as u64, Ordering::Relaxed);
                    self.rows_rejected
                        .fetch_add(published.rejected_rows as u64, Ordering::Relaxed);
                }
                Err(error) => {
                    self.tables_failed.fetch_add(1, Ordering::Relaxed);
                    if matches!(error, LoadError::TimedOut(_)) {
                        self.timeouts.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    pub(crate) fn snapshot(&self) -> LoaderStats {
        LoaderStats {
            batches: self.batches.load(Ordering::Relaxed),
            tables_loaded: self.tables_loaded.load(Ordering::Relaxed),
            tables_failed: self.tables_failed.load(Ordering::Relaxed),
            rows_loaded: self.rows_loaded.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the loader counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LoaderStats {
    pub batches: u64,
    pub tables_loaded: u64,
    pub tables_failed: u64,
    pub rows_loaded: u64,
    pub rows_rejected: u64,
    pub timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;

    fn outcome(source_id: &str, result: Result<PublishedTable, LoadError>) -> TableOutcome {
        TableOutcome {
            record_type: "Skill",
            source_id: source_id.to_string(),
            elapsed: Duration::from_millis(3),
            result,
        }
    }

    fn report() -> BatchReport {
        BatchReport {
            kind: BatchKind::Load,
            outcomes: vec![
                outcome(
                    "SkillTable",
                    Ok(PublishedTable {
                        rows: 4,
                        rejected_rows: 1,
                        ..PublishedTable::default()
                    }),
                ),
                outcome(
                    "EffectTable",
                    Err(LoadError::Source(SourceError::Empty {
                        id: "EffectTable".to_string(),
                    })),
                ),
                outcome("StageTable", Err(LoadError::TimedOut(Duration::from_secs(1)))),
            ],
            elapsed: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_report_counts() {
        let report = report();
        assert_eq!(report.loaded(), 1);
        assert_eq!(report.failed(), 2);
        assert!(!report.is_complete_success());
        assert!(report.outcome("EffectTable").unwrap().error().is_some());
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn test_report_json() {
        let json = report().to_json();
        assert!(json.contains("\"kind\": \"load\""));
        assert!(json.contains("\"rows\": 4"));
        assert!(json.contains("source 'EffectTable' is empty"));
        assert!(json.contains("\"elapsed\": 12"));
    }

    #[test]
    fn test_metrics_accumulate() {
        let metrics = LoaderMetrics::default();
        metrics.record_batch(&report());
        metrics.record_batch(&report());
        let stats = metrics.snapshot();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.tables_loaded, 2);
        assert_eq!(stats.tables_failed, 4);
        assert_eq!(stats.rows_loaded, 8);
        assert_eq!(stats.rows_rejected, 2);
        assert_eq!(stats.timeouts, 2);
    }
}
