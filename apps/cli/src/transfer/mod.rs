//! # CSV Transfer
//!
//! Import and export of products, customers and invoices as CSV files.
//!
//! ## Import Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         import_*()                                      │
//! │                                                                         │
//! │  open file ─────────────── Io error → abort, nothing written           │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  resolve header ────────── MissingColumn → abort, nothing written      │
//! │      │                     (invoices: header line skipped, positional) │
//! │      ▼                                                                  │
//! │  for each record                                                        │
//! │      ├── blank name / unresolvable ──► skipped += 1, warn!             │
//! │      ├── database refuses row ───────► skipped += 1, warn!             │
//! │      └── stored ─────────────────────► inserted += 1                   │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  ImportReport { inserted, skipped }                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Record mapping (column synonyms, defaults, number parsing, invoice
//! grouping) lives in `tally_core::codec`; this module only adds files and
//! the database.

mod customer;
mod invoice;
mod product;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use tally_core::codec::MissingColumn;
use tally_db::DbError;

pub use customer::{export_customers, import_customers};
pub use invoice::{export_invoices, import_invoices};
pub use product::{export_products, import_products};

/// Why an import (or export) could not run at all.
///
/// Row-level problems never surface here; they are counted as skipped.
#[derive(Debug, Error)]
pub enum ImportError {
    /// A required column is absent from the header line.
    #[error("{0}")]
    MissingColumn(#[from] MissingColumn),

    /// The file could not be opened or created.
    #[error("Cannot open {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// The file is not readable as CSV (or could not be written).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading lookup data failed before any row was written.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Invoices need an employee and there is no active account.
    #[error("No active employee account to attribute imported invoices to")]
    NoEmployee,
}

impl ImportError {
    /// The numeric failure code older callers expect instead of a count.
    pub const fn sentinel() -> i64 {
        -1
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

pub type ImportResult<T> = Result<T, ImportError>;

/// Opens a CSV file whose first line is a header. Records may have any
/// number of fields.
fn open_reader(path: &Path) -> ImportResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

/// Creates (or truncates) a CSV file for export.
fn create_writer(path: &Path) -> ImportResult<csv::Writer<File>> {
    let file = File::create(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::WriterBuilder::new().flexible(true).from_writer(file))
}

/// 1-based line of a record, for log messages.
fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_negative() {
        assert_eq!(ImportError::sentinel(), -1);
    }

    #[test]
    fn test_open_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_reader(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}
