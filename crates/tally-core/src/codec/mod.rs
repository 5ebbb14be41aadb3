//! # Transfer Record Codec
//!
//! Maps domain types to and from CSV records for the import/export files.
//! Everything here works on in-memory [`csv::StringRecord`]s; opening files
//! and talking to the database is the caller's job.
//!
//! ## File Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.csv   header + one line per product    (header-driven)       │
//! │  customers.csv  header + one line per customer   (header-driven)       │
//! │  invoices.csv   header + per invoice:                                  │
//! │                   invoice line                                         │
//! │                   item line … (7th column is the literal "ITEM")       │
//! │                 (positional)                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Numbers
//! Written in invariant form (`1234.50`). Read invariant first, then with
//! culture-tolerant separators; unparsable values fall back to defaults.

pub mod customer;
pub mod header;
pub mod invoice;
pub mod product;

use ::csv::StringRecord;

pub use customer::{customer_record, CustomerRow, CUSTOMER_COLUMNS, CUSTOMER_HEADERS};
pub use header::{ColumnSpec, HeaderMap, MissingColumn};
pub use invoice::{
    invoice_header_record, invoice_item_record, InvoiceGroup, InvoiceGrouper, InvoiceHeaderRow,
    InvoiceItemRow, INVOICE_HEADERS, ITEM_MARKER,
};
pub use product::{product_record, CodeGenerator, ProductRow, PRODUCT_COLUMNS, PRODUCT_HEADERS};

/// Field at `index`, trimmed. Out-of-range indices read as `""`.
pub fn field(record: &StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or("").trim()
}

/// True when every field of the record is blank.
pub fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

/// `None` for blank text, otherwise the trimmed text.
pub(crate) fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

pub(crate) fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}
