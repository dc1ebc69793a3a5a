//! Registrations - what to load, from where, and how to key it
//!
//! A [`Registration<T>`] ties one record type to its source identifier,
//! header format and schema. Registrations are erased into [`TableJob`]s
//! and collected into a [`RegistrationSet`], at most one per record type.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::LoadError;
use crate::constants::CSV_EXTENSION;
use crate::header::{normalize, HeaderFormat};
use crate::parser::{self, Schema};
use crate::registry::TableRegistry;
use crate::table::{DuplicateKeyPolicy, Table, TableError, TableKey};

/// What to do with data rows whose required cells fail conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Drop the row, log it, publish the rest
    #[default]
    SkipRow,
    /// Fail the whole table
    FailTable,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("record type {record} is already registered (source '{existing}')")]
    DuplicateType {
        record: &'static str,
        existing: String,
    },
}

type KeySelector<T> = Box<dyn Fn(&T) -> Option<TableKey> + Send + Sync>;

/// One record type's load recipe
pub struct Registration<T> {
    source_id: String,
    dev_file: String,
    format: HeaderFormat,
    schema: Schema<T>,
    key_selector: KeySelector<T>,
    row_policy: RowPolicy,
    duplicate_policy: DuplicateKeyPolicy,
}

impl<T: Default + Send + Sync + 'static> Registration<T> {
    /// Dev file defaults to `<source_id>.csv`
    pub fn new<F>(source_id: impl Into<String>, schema: Schema<T>, key_selector: F) -> Self
    where
        F: Fn(&T) -> TableKey + Send + Sync + 'static,
    {
        Self::try_keyed(source_id, schema, move |record| Some(key_selector(record)))
    }

    /// Key selector that may find no key; such records are treated like
    /// rejected rows under the registration's [`RowPolicy`]
    pub fn try_keyed<F>(source_id: impl Into<String>, schema: Schema<T>, key_selector: F) -> Self
    where
        F: Fn(&T) -> Option<TableKey> + Send + Sync + 'static,
    {
        let source_id = source_id.into();
        Self {
            dev_file: format!("{source_id}.{CSV_EXTENSION}"),
            source_id,
            format: HeaderFormat::Single,
            schema,
            key_selector: Box::new(key_selector),
            row_policy: RowPolicy::default(),
            duplicate_policy: DuplicateKeyPolicy::default(),
        }
    }

    pub fn dev_file(mut self, file: impl Into<String>) -> Self {
        self.dev_file = file.into();
        self
    }

    pub fn format(mut self, format: HeaderFormat) -> Self {
        self.format = format;
        self
    }

    pub fn triple_header(self) -> Self {
        self.format(HeaderFormat::Triple)
    }

    pub fn row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// Counts from one successful pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublishedTable {
    pub rows: usize,
    pub rejected_rows: usize,
    pub duplicate_keys: usize,
    pub malformed_header: bool,
}

/// Type-erased registration the loader can run
pub trait TableJob: Send + Sync {
    fn record_type(&self) -> TypeId;
    fn record_name(&self) -> &'static str;
    fn source_id(&self) -> &str;
    fn dev_file(&self) -> &str;
    fn format(&self) -> HeaderFormat;

    /// Normalize, parse and build from `raw`, then publish into `registry`
    fn publish(&self, raw: &str, registry: &TableRegistry) -> Result<PublishedTable, LoadError>;
}

impl<T: Default + Send + Sync + 'static> TableJob for Registration<T> {
    fn record_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn record_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn dev_file(&self) -> &str {
        &self.dev_file
    }

    fn format(&self) -> HeaderFormat {
        self.format
    }

    fn publish(&self, raw: &str, registry: &TableRegistry) -> Result<PublishedTable, LoadError> {
        let normalized = normalize(raw, self.format);
        if normalized.malformed {
            warn!(
                source = %self.source_id,
                format = %self.format,
                lines = normalized.raw_lines,
                "header rows missing, parsing text unchanged"
            );
        }

        let parsed = parser::parse(&normalized.text, &self.schema)?;
        for column in &parsed.unmatched_optional {
            warn!(source = %self.source_id, column = %column, "optional column absent, using defaults");
        }

        let rejected_rows = parsed.rejected.len();
        if let Some(first) = parsed.rejected.first() {
            if self.row_policy == RowPolicy::FailTable {
                return Err(LoadError::RejectedRows {
                    count: rejected_rows,
                    first: first.clone(),
                });
            }
            for row in &parsed.rejected {
                warn!(source = %self.source_id, %row, "row rejected");
            }
        }

        let mut keyed = Vec::with_capacity(parsed.records.len());
        let mut unkeyed = 0;
        for (position, record) in parsed.records.into_iter().enumerate() {
            if (self.key_selector)(&record).is_some() {
                keyed.push(record);
                continue;
            }
            if self.row_policy == RowPolicy::FailTable {
                return Err(TableError::UnkeyedRecord { position }.into());
            }
            warn!(source = %self.source_id, position, "record has no valid key, dropped");
            unkeyed += 1;
        }

        let table = Table::build_with_policy(
            keyed,
            |record| (self.key_selector)(record).unwrap_or_default(),
            self.duplicate_policy,
        )?;
        let duplicate_keys = table.duplicate_keys().len();
        if duplicate_keys > 0 {
            warn!(
                source = %self.source_id,
                count = duplicate_keys,
                keys = ?table.duplicate_keys(),
                "duplicate keys, last row wins"
            );
        }

        let rows = table.len();
        registry.publish(table);
        Ok(PublishedTable {
            rows,
            rejected_rows: rejected_rows + unkeyed,
            duplicate_keys,
            malformed_header: normalized.malformed,
        })
    }
}

/// Registrations for one loader, at most one per record type
#[derive(Clone, Default)]
pub struct RegistrationSet {
    jobs: Vec<Arc<dyn TableJob>>,
}

impl RegistrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: Default + Send + Sync + 'static>(
        &mut self,
        registration: Registration<T>,
    ) -> Result<&mut Self, RegistrationError> {
        if let Some(existing) = self.jobs.iter().find(|j| j.record_type() == TypeId::of::<T>()) {
            return Err(RegistrationError::DuplicateType {
                record: std::any::type_name::<T>(),
                existing: existing.source_id().to_string(),
            });
        }
        self.jobs.push(Arc::new(registration));
        Ok(self)
    }

    /// Builder form of [`RegistrationSet::add`]
    pub fn with<T: Default + Send + Sync + 'static>(
        mut self,
        registration: Registration<T>,
    ) -> Result<Self, RegistrationError> {
        self.add(registration)?;
        Ok(self)
    }

    pub fn jobs(&self) -> &[Arc<dyn TableJob>] {
        &self.jobs
    }

    /// Registrations chosen by `selection`, in registration order
    pub fn select(&self, selection: &TableSelection) -> Vec<Arc<dyn TableJob>> {
        self.jobs
            .iter()
            .filter(|job| selection.matches(job.as_ref()))
            .cloned()
            .collect()
    }

    pub fn find_by_dev_file(&self, file_name: &str) -> Option<&Arc<dyn TableJob>> {
        self.jobs.iter().find(|job| job.dev_file() == file_name)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl std::fmt::Debug for RegistrationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.jobs.iter().map(|j| (j.record_name(), j.source_id())))
            .finish()
    }
}

/// Subset of registrations for a partial reload
#[derive(Debug, Clone, Default)]
pub struct TableSelection {
    types: HashSet<TypeId>,
    names: HashSet<String>,
}

impl TableSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select by record type
    pub fn with<T: 'static>(mut self) -> Self {
        self.types.insert(TypeId::of::<T>());
        self
    }

    /// Select by source identifier or dev file name
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.names.is_empty()
    }

    pub fn matches(&self, job: &dyn TableJob) -> bool {
        self.types.contains(&job.record_type())
            || self.names.contains(job.source_id())
            || self.names.contains(job.dev_file())
    }
}

/// Options applied to every pipeline in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadConfig {
    pub source_timeout: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            source_timeout: crate::constants::DEFAULT_SOURCE_TIMEOUT,
        }
    }
}

impl From<&crate::config::LoadSettings> for LoadConfig {
    fn from(settings: &crate::config::LoadSettings) -> Self {
        Self {
            source_timeout: settings.source_timeout(),
        }
    }
}
