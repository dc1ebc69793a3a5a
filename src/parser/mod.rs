//! Record parser - normalized CSV text → ordered typed records
//!
//! The first row is the header. Every schema binding is resolved to a column
//! index once; each following row then becomes one record, in source order.
//!
//! Failure rules:
//! - Required binding without a column → the whole table fails ([`ParseError`])
//! - Required cell that does not convert → that row is rejected ([`RowError`])
//! - Optional cell that does not convert → field keeps its default

pub mod schema;

use std::borrow::Cow;
use tracing::debug;

use crate::header::split_rows;

pub use schema::{Binding, FieldError, FieldValue, Schema};

/// Table-level parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no header row")]
    NoHeader,
    #[error("required column '{column}' not in header")]
    MissingColumn { column: String },
}

/// A data row dropped because a required cell failed conversion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row}, column '{column}': {error} (value '{value}')")]
pub struct RowError {
    /// 1-based logical row in the normalized text (header is row 1)
    pub row: usize,
    pub column: String,
    pub value: String,
    #[source]
    pub error: FieldError,
}

/// Parser output
#[derive(Debug)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RowError>,
    /// Optional bindings with no matching header column
    pub unmatched_optional: Vec<String>,
}

/// Parse normalized text with `schema`
pub fn parse<T: Default + 'static>(text: &str, schema: &Schema<T>) -> Result<Parsed<T>, ParseError> {
    let rows = split_rows(text);
    let header = rows.first().ok_or(ParseError::NoHeader)?;
    if header.trim().is_empty() {
        return Err(ParseError::NoHeader);
    }
    let header = header.strip_prefix('\u{feff}').unwrap_or(header);
    let columns = split_fields(header);

    let mut resolved = Vec::with_capacity(schema.len());
    let mut unmatched_optional = Vec::new();
    for binding in schema.bindings() {
        match find_column(&columns, binding.column()) {
            Some(index) => resolved.push((index, binding)),
            None if binding.is_required() => {
                return Err(ParseError::MissingColumn {
                    column: binding.column().to_string(),
                })
            }
            None => unmatched_optional.push(binding.column().to_string()),
        }
    }

    let mut records = Vec::with_capacity(rows.len().saturating_sub(1));
    let mut rejected = Vec::new();

    for (offset, line) in rows.iter().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let row = offset + 1;
        let cells = split_fields(line);
        let mut record = T::default();
        let mut failure = None;

        for (index, binding) in &resolved {
            let raw = cells.get(*index).map(|c| c.as_ref()).unwrap_or("");
            if let Err(error) = binding.apply(&mut record, raw) {
                if binding.is_required() {
                    failure = Some(RowError {
                        row,
                        column: binding.column().to_string(),
                        value: raw.to_string(),
                        error,
                    });
                    break;
                }
                debug!(row, column = binding.column(), value = raw, %error, "optional field defaulted");
            }
        }

        match failure {
            Some(error) => rejected.push(error),
            None => records.push(record),
        }
    }

    Ok(Parsed {
        records,
        rejected,
        unmatched_optional,
    })
}

/// Exact match first, then ASCII case-insensitive
fn find_column(columns: &[Cow<'_, str>], name: &str) -> Option<usize> {
    columns
        .iter()
        .position(|c| c.as_ref() == name)
        .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
}

/// Split one row into cells.
///
/// Unquoted cells are trimmed. A cell starting with `"` runs to the closing
/// quote, may contain commas, and uses `""` for a literal quote.
pub fn split_fields(line: &str) -> Vec<Cow<'_, str>> {
    let bytes = line.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;

    loop {
        let mut start = i;
        while start < bytes.len() && matches!(bytes[start], b' ' | b'\t') {
            start += 1;
        }

        let next_comma;
        if bytes.get(start) == Some(&b'"') {
            let mut j = start + 1;
            let mut segment = j;
            let mut unescaped: Option<String> = None;
            while j < bytes.len() {
                if bytes[j] == b'"' {
                    if bytes.get(j + 1) == Some(&b'"') {
                        unescaped
                            .get_or_insert_with(String::new)
                            .push_str(&line[segment..=j]);
                        j += 2;
                        segment = j;
                        continue;
                    }
                    break;
                }
                j += 1;
            }
            let end = j.min(bytes.len());
            fields.push(match unescaped {
                Some(mut value) => {
                    value.push_str(&line[segment..end]);
                    Cow::Owned(value)
                }
                None => Cow::Borrowed(&line[start + 1..end]),
            });

            let mut k = (j + 1).min(bytes.len());
            while k < bytes.len() && bytes[k] != b',' {
                k += 1;
            }
            next_comma = k;
        } else {
            let mut k = start;
            while k < bytes.len() && bytes[k] != b',' {
                k += 1;
            }
            fields.push(Cow::Borrowed(line[start..k].trim()));
            next_comma = k;
        }

        if next_comma >= bytes.len() {
            break;
        }
        i = next_comma + 1;
    }
    fields
}
