//! Header normalization - designer CSV → one machine header + data rows
//!
//! Designer sheets come in two shapes:
//! - **Single**: row 1 column names, rows 2+ data
//! - **Triple**: row 1 display labels, row 2 column names, row 3 type tags, rows 4+ data
//!
//! Triple files are reduced to row 2 followed by the non-blank data rows. Both
//! formats then get the not-applicable sentinel rewritten (`,N/A` → `,0`) so
//! numeric columns never see a placeholder.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::constants::{
    NOT_APPLICABLE_MARKER, NOT_APPLICABLE_REPLACEMENT, TRIPLE_HEADER_MIN_LINES,
};

/// Layout of the header rows in a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderFormat {
    #[default]
    Single,
    Triple,
}

impl fmt::Display for HeaderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderFormat::Single => write!(f, "single"),
            HeaderFormat::Triple => write!(f, "triple"),
        }
    }
}

/// Output of [`normalize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    /// Fewer rows than the format requires; text was passed through
    pub malformed: bool,
    /// Rows present in the raw text (blank ones included)
    pub raw_lines: usize,
}

/// Strip presentation-only header rows and rewrite sentinels
pub fn normalize(raw: &str, format: HeaderFormat) -> Normalized {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let rows = split_rows(raw);
    let raw_lines = rows.len();

    let (text, malformed) = match format {
        HeaderFormat::Single => (Cow::Borrowed(raw), false),
        HeaderFormat::Triple if rows.len() < TRIPLE_HEADER_MIN_LINES => (Cow::Borrowed(raw), true),
        HeaderFormat::Triple => {
            let mut out = String::with_capacity(raw.len());
            out.push_str(rows[1]);
            for row in rows[3..].iter().filter(|r| !r.trim().is_empty()) {
                out.push('\n');
                out.push_str(row);
            }
            (Cow::Owned(out), false)
        }
    };

    Normalized {
        text: rewrite_not_applicable(&text).into_owned(),
        malformed,
        raw_lines,
    }
}

/// Split on CRLF, CR or LF outside quoted cells.
///
/// A line break inside `"..."` belongs to the cell, so a multi-line cell stays
/// in one row. A trailing terminator does not yield an extra empty row.
pub fn split_rows(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut rows = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            // `""` toggles twice, leaving the state unchanged
            b'"' => {
                in_quotes = !in_quotes;
                i += 1;
            }
            _ if in_quotes => i += 1,
            b'\n' => {
                rows.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                rows.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        rows.push(&text[start..]);
    }
    rows
}

/// Rewrite `N/A` cells that directly follow an unquoted comma and end at a
/// comma, line break or end of text.
pub fn rewrite_not_applicable(text: &str) -> Cow<'_, str> {
    if !text.contains(NOT_APPLICABLE_MARKER) {
        return Cow::Borrowed(text);
    }

    let marker = NOT_APPLICABLE_MARKER.as_bytes();
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied_to = 0;
    let mut in_quotes = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_quotes = !in_quotes,
            b',' if !in_quotes => {
                let start = i + 1;
                let end = start + marker.len();
                let at_cell_end = matches!(bytes.get(end), None | Some(b',' | b'\r' | b'\n'));
                if bytes.get(start..end) == Some(marker) && at_cell_end {
                    out.push_str(&text[copied_to..start]);
                    out.push_str(NOT_APPLICABLE_REPLACEMENT);
                    copied_to = end;
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if copied_to == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[copied_to..]);
    Cow::Owned(out)
}
