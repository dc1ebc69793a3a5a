//! Table registry - one slot per record type, atomically replaced
//!
//! Each record type `T` owns exactly one slot, keyed by `TypeId::of::<T>()`.
//! A slot holds either nothing or one complete `Table<T>`; publishing is a
//! single `ArcSwap` pointer store, so a reader sees the previous table or the
//! new one, never anything in between. Readers that hold an `Arc<Table<T>>`
//! keep their snapshot alive across reloads.
//!
//! The registry is an ordinary value: create one, wrap it in `Arc`, and hand
//! it to the loader and to every consumer. Tests use a fresh one each.

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::table::{Table, TableKey};

struct Slot<T> {
    table: ArcSwapOption<Table<T>>,
}

/// Type-erased view of a slot for registry-wide summaries
trait ErasedSlot: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn rows(&self) -> Option<usize>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + Sync + 'static> ErasedSlot for Slot<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn rows(&self) -> Option<usize> {
        self.table.load_full().map(|t| t.len())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Row count of one slot, for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub type_name: &'static str,
    /// `None` when the slot is empty
    pub rows: Option<usize>,
}

/// Slots for every record type the application loads
#[derive(Default)]
pub struct TableRegistry {
    slots: RwLock<HashMap<TypeId, Arc<dyn ErasedSlot>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn downcast<T: Send + Sync + 'static>(slot: Arc<dyn ErasedSlot>) -> Option<Arc<Slot<T>>> {
        slot.into_any().downcast::<Slot<T>>().ok()
    }

    fn existing_slot<T: Send + Sync + 'static>(&self) -> Option<Arc<Slot<T>>> {
        let slot = self.slots.read().get(&TypeId::of::<T>()).cloned()?;
        Self::downcast(slot)
    }

    fn slot<T: Send + Sync + 'static>(&self) -> Option<Arc<Slot<T>>> {
        if let Some(slot) = self.existing_slot::<T>() {
            return Some(slot);
        }
        let slot = self
            .slots
            .write()
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Arc::new(Slot::<T> {
                    table: ArcSwapOption::empty(),
                }) as Arc<dyn ErasedSlot>
            })
            .clone();
        Self::downcast(slot)
    }

    /// Atomically replace the table for `T`; returns the superseded table
    pub fn publish<T: Send + Sync + 'static>(&self, table: Table<T>) -> Option<Arc<Table<T>>> {
        self.publish_shared(Arc::new(table))
    }

    pub fn publish_shared<T: Send + Sync + 'static>(
        &self,
        table: Arc<Table<T>>,
    ) -> Option<Arc<Table<T>>> {
        match self.slot::<T>() {
            Some(slot) => slot.table.swap(Some(table)),
            None => {
                error!(record = std::any::type_name::<T>(), "registry slot type mismatch");
                None
            }
        }
    }

    /// Current table for `T`, if one has been published
    pub fn table<T: Send + Sync + 'static>(&self) -> Option<Arc<Table<T>>> {
        self.existing_slot::<T>()?.table.load_full()
    }

    pub fn get_by_key<T: Send + Sync + 'static>(&self, key: TableKey) -> Option<Arc<T>> {
        self.table::<T>()?.get_shared(key)
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.existing_slot::<T>()
            .map(|slot| slot.table.load().is_some())
            .unwrap_or(false)
    }

    /// Empty the slot for `T`; returns the removed table
    pub fn clear<T: Send + Sync + 'static>(&self) -> Option<Arc<Table<T>>> {
        self.existing_slot::<T>()?.table.swap(None)
    }

    /// Number of slots currently holding a table
    pub fn loaded_count(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.rows().is_some())
            .count()
    }

    /// Per-slot row counts, sorted by type name
    pub fn summary(&self) -> Vec<SlotSummary> {
        let mut summary: Vec<SlotSummary> = self
            .slots
            .read()
            .values()
            .map(|slot| SlotSummary {
                type_name: slot.type_name(),
                rows: slot.rows(),
            })
            .collect();
        summary.sort_by(|a, b| a.type_name.cmp(b.type_name));
        summary
    }
}

impl std::fmt::Debug for TableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRegistry")
            .field("slots", &self.summary())
            .finish()
    }
}
