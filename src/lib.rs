//! Tower Game - Table Loader Library
//!
//! Data-driven loading of designer CSV sheets into typed, key-indexed tables:
//! - Source backends (dev file fast path, packaged asset store, overlay)
//! - Header normalization (single / triple header sheets, `N/A` sentinel)
//! - Schema-driven record parsing (no reflection)
//! - Immutable `Table<T>` snapshots with O(1) key lookup
//! - Type-keyed registry with atomic table swaps
//! - Concurrent load batches with timeout, cancellation and readiness
//! - Dev-root hot reload
//! - Game table catalog

pub mod catalog;
pub mod config;
pub mod constants;
pub mod header;
pub mod hotreload;
pub mod loader;
pub mod logging;
pub mod parser;
pub mod registry;
pub mod source;
pub mod table;

pub use config::TableConfig;
pub use loader::{
    BatchReport, LoadConfig, LoadError, LoadState, Registration, RegistrationSet, TableLoader,
    TableSelection,
};
pub use registry::TableRegistry;
pub use table::{composite_key, Table, TableKey};
