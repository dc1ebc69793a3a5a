//! Centralized constants for the table loader.
//!
//! Defaults shared by config, the source backends and the loader live here so
//! the binary, tests and library agree on one value.

use std::time::Duration;

// =====================================================
// Sources
// =====================================================

/// Conventional dev fast-path root (relative to the working directory)
pub const DEFAULT_DEV_ROOT: &str = "Assets/Resources/CSV";

/// Extension appended to a source identifier to form the default dev file name
pub const CSV_EXTENSION: &str = "csv";

// =====================================================
// Normalization
// =====================================================

/// Designer placeholder for "no value" in numeric columns
pub const NOT_APPLICABLE_MARKER: &str = "N/A";

/// Literal the marker is rewritten to
pub const NOT_APPLICABLE_REPLACEMENT: &str = "0";

/// Rows required before a triple-header file carries any data
pub const TRIPLE_HEADER_MIN_LINES: usize = 4;

// =====================================================
// Loading
// =====================================================

/// Per-source resolve timeout
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Multiplier used by two-part composite keys: primary * 100 + secondary
pub const COMPOSITE_KEY_FACTOR: i32 = 100;

// =====================================================
// Hot reload
// =====================================================

/// Quiet period collecting filesystem events before a reload is issued
pub const DEFAULT_HOT_RELOAD_DEBOUNCE: Duration = Duration::from_millis(250);
