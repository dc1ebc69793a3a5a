//! Table<T> - immutable, key-indexed snapshot of one record type
//!
//! Built once per load from the parser output and never mutated afterwards;
//! a reload publishes a brand new table. Records keep source row order and
//! the index maps an integer key (from the registration's key selector) to a
//! row.
//!
//! Duplicate keys: with [`DuplicateKeyPolicy::LastWins`] the index points at
//! the last row carrying the key, every row stays in [`Table::all`], and the
//! colliding keys are reported through [`Table::duplicate_keys`].
//! [`DuplicateKeyPolicy::Reject`] refuses to build instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::COMPOSITE_KEY_FACTOR;

/// Integer key used for indexed lookup
pub type TableKey = i32;

/// What to do when two rows derive the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    #[default]
    LastWins,
    Reject,
}

/// Table construction failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("duplicate key {key} (rows {first_row} and {second_row}, {total} duplicates)")]
    DuplicateKey {
        key: TableKey,
        /// 0-based positions in the record sequence
        first_row: usize,
        second_row: usize,
        total: usize,
    },
    #[error("record {position} has no valid key")]
    UnkeyedRecord {
        /// 0-based position in the parsed record sequence
        position: usize,
    },
}

/// Ordered, key-indexed, immutable collection of `T`
#[derive(Debug)]
pub struct Table<T> {
    records: Vec<Arc<T>>,
    index: HashMap<TableKey, usize>,
    duplicates: Vec<TableKey>,
}

impl<T> Table<T> {
    /// Build with last-write-wins duplicate handling
    pub fn build<F>(records: Vec<T>, key_selector: F) -> Self
    where
        F: Fn(&T) -> TableKey,
    {
        let mut index = HashMap::with_capacity(records.len());
        let mut duplicates = Vec::new();
        let records: Vec<Arc<T>> = records.into_iter().map(Arc::new).collect();

        for (position, record) in records.iter().enumerate() {
            let key = key_selector(record);
            if index.insert(key, position).is_some() {
                duplicates.push(key);
            }
        }

        Self {
            records,
            index,
            duplicates,
        }
    }

    /// Build, applying `policy` to duplicate keys
    pub fn build_with_policy<F>(
        records: Vec<T>,
        key_selector: F,
        policy: DuplicateKeyPolicy,
    ) -> Result<Self, TableError>
    where
        F: Fn(&T) -> TableKey,
    {
        let table = Self::build(records, &key_selector);
        match (policy, table.duplicates.first()) {
            (DuplicateKeyPolicy::Reject, Some(&key)) => {
                let mut rows = table
                    .records
                    .iter()
                    .enumerate()
                    .filter_map(|(i, r)| (key_selector(r) == key).then_some(i));
                let first_row = rows.next().unwrap_or_default();
                let second_row = rows.next().unwrap_or_default();
                Err(TableError::DuplicateKey {
                    key,
                    first_row,
                    second_row,
                    total: table.duplicates.len(),
                })
            }
            _ => Ok(table),
        }
    }

    /// An empty table
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn get(&self, key: TableKey) -> Option<&T> {
        self.index.get(&key).map(|&i| self.records[i].as_ref())
    }

    /// Shared handle to a record, usable after the table is superseded
    pub fn get_shared(&self, key: TableKey) -> Option<Arc<T>> {
        self.index.get(&key).map(|&i| Arc::clone(&self.records[i]))
    }

    pub fn contains_key(&self, key: TableKey) -> bool {
        self.index.contains_key(&key)
    }

    /// All records in source row order (read-only)
    pub fn all(&self) -> &[Arc<T>] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().map(|r| r.as_ref())
    }

    /// First record matching `predicate`, in row order
    pub fn find<P>(&self, mut predicate: P) -> Option<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().find(|r| predicate(r))
    }

    /// Every record matching `predicate`, in row order
    pub fn find_all<P>(&self, mut predicate: P) -> Vec<Arc<T>>
    where
        P: FnMut(&T) -> bool,
    {
        self.records
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Indexed keys (unordered)
    pub fn keys(&self) -> impl Iterator<Item = TableKey> + '_ {
        self.index.keys().copied()
    }

    /// Keys that appeared more than once, one entry per extra occurrence
    pub fn duplicate_keys(&self) -> &[TableKey] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a, T> IntoIterator for &'a Table<T> {
    type Item = &'a Arc<T>;
    type IntoIter = std::slice::Iter<'a, Arc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Two-part key: `primary * 100 + secondary` (e.g. skill 39002, level 3 → 3900203)
///
/// `primary` must be non-negative and `secondary` in `0..100`; anything else,
/// or a product past `i32::MAX`, has no key.
pub fn composite_key(primary: i32, secondary: i32) -> Option<TableKey> {
    if primary < 0 || !(0..COMPOSITE_KEY_FACTOR).contains(&secondary) {
        return None;
    }
    primary
        .checked_mul(COMPOSITE_KEY_FACTOR)?
        .checked_add(secondary)
}

/// Inverse of [`composite_key`] for non-negative keys
pub fn split_composite_key(key: TableKey) -> (i32, i32) {
    (key / COMPOSITE_KEY_FACTOR, key % COMPOSITE_KEY_FACTOR)
}
