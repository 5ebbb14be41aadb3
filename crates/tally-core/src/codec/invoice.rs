//! Invoice records and the two-level grouping protocol.
//!
//! ## Grouping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  InvoiceId,InvoiceDate,CustomerName,…,EmployeeId   ← file header       │
//! │  7,2024-03-01T09:00:00Z,Ana,…,1                    ← starts group A    │
//! │  7,3,PEN-01,Pen,2,5000.00,ITEM,10000.00            ← item of A         │
//! │  7,4,INK-02,Ink,1,800.00,ITEM,800.00               ← item of A         │
//! │  8,2024-03-01T09:30:00Z,,…,1                       ← flush A, start B  │
//! │  8,3,PEN-01,Pen,1,5000.00,ITEM,5000.00             ← item of B         │
//! │  <end of file>                                     ← flush B           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Grouping is purely positional: the invoice id on item lines is not used
//! to match them to their header. Items that appear before any header are
//! dropped and counted.

use ::csv::StringRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use super::{field, non_empty, opt_str};
use crate::money::{Money, Percent};
use crate::number;
use crate::types::{Customer, Id, Invoice, InvoiceLine};

/// Literal in the 7th column that marks an item line.
pub const ITEM_MARKER: &str = "ITEM";

/// Export header line.
pub const INVOICE_HEADERS: [&str; 13] = [
    "InvoiceId",
    "InvoiceDate",
    "CustomerName",
    "CustomerPhone",
    "CustomerEmail",
    "CustomerAddress",
    "Subtotal",
    "TaxPercent",
    "TaxAmount",
    "Discount",
    "Total",
    "Paid",
    "EmployeeId",
];

const MARKER_INDEX: usize = 6;

/// Whether a record is an item line.
pub fn is_item_record(record: &StringRecord) -> bool {
    field(record, MARKER_INDEX).eq_ignore_ascii_case(ITEM_MARKER)
}

// =============================================================================
// Rows
// =============================================================================

/// Invoice line of a transfer file. Totals are kept exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHeaderRow {
    pub invoice_id: Option<Id>,
    pub created_at: Option<DateTime<Utc>>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub subtotal: Money,
    pub tax_percent: Percent,
    pub tax_amount: Money,
    pub discount: Money,
    pub total: Money,
    pub paid: Money,
    pub employee_id: Option<Id>,
}

impl InvoiceHeaderRow {
    pub fn from_record(record: &StringRecord) -> InvoiceHeaderRow {
        let money = |index| {
            Money::parse_lenient(field(record, index))
                .unwrap_or_default()
                .non_negative()
        };
        InvoiceHeaderRow {
            invoice_id: number::parse_int_lenient(field(record, 0)),
            created_at: parse_date(field(record, 1)),
            customer_name: non_empty(field(record, 2)),
            customer_phone: non_empty(field(record, 3)),
            customer_email: non_empty(field(record, 4)),
            customer_address: non_empty(field(record, 5)),
            subtotal: money(6),
            tax_percent: Percent::parse_lenient(field(record, 7)).unwrap_or_default(),
            tax_amount: money(8),
            discount: money(9),
            total: money(10),
            paid: money(11),
            employee_id: number::parse_int_lenient(field(record, 12)),
        }
    }
}

/// Item line of a transfer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceItemRow {
    pub product_id: Option<Id>,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

impl InvoiceItemRow {
    pub fn from_record(record: &StringRecord) -> InvoiceItemRow {
        InvoiceItemRow {
            product_id: number::parse_int_lenient(field(record, 1)),
            product_code: non_empty(field(record, 2)),
            product_name: non_empty(field(record, 3)),
            quantity: number::parse_int_lenient(field(record, 4)).unwrap_or(0),
            unit_price: Money::parse_lenient(field(record, 5))
                .unwrap_or_default()
                .non_negative(),
            line_total: Money::parse_lenient(field(record, 7)).unwrap_or_default(),
        }
    }
}

/// An invoice line with the item lines that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceGroup {
    pub header: InvoiceHeaderRow,
    pub items: Vec<InvoiceItemRow>,
}

// =============================================================================
// Grouper
// =============================================================================

/// Streams records into [`InvoiceGroup`]s.
///
/// ## Example
/// ```rust
/// use csv::StringRecord;
/// use tally_core::codec::InvoiceGrouper;
///
/// let mut grouper = InvoiceGrouper::new();
/// let header = StringRecord::from(vec!["1", "", "", "", "", "", "10", "0", "0", "0", "10", "10", "1"]);
/// let item = StringRecord::from(vec!["1", "3", "PEN", "Pen", "1", "10", "ITEM", "10"]);
///
/// assert!(grouper.push(&header).is_none());
/// assert!(grouper.push(&item).is_none());
/// let group = grouper.finish().unwrap();
/// assert_eq!(group.items.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InvoiceGrouper {
    current: Option<InvoiceGroup>,
    orphan_items: usize,
}

impl InvoiceGrouper {
    pub fn new() -> Self {
        InvoiceGrouper::default()
    }

    /// Feeds one record. Returns the previous group when this record starts
    /// a new one.
    pub fn push(&mut self, record: &StringRecord) -> Option<InvoiceGroup> {
        if is_item_record(record) {
            match self.current.as_mut() {
                Some(group) => group.items.push(InvoiceItemRow::from_record(record)),
                None => self.orphan_items += 1,
            }
            return None;
        }

        self.current.replace(InvoiceGroup {
            header: InvoiceHeaderRow::from_record(record),
            items: Vec::new(),
        })
    }

    /// Flushes the last group.
    pub fn finish(&mut self) -> Option<InvoiceGroup> {
        self.current.take()
    }

    /// Item lines seen before any invoice line.
    pub fn orphan_items(&self) -> usize {
        self.orphan_items
    }
}

// =============================================================================
// Export
// =============================================================================

/// Export line for an invoice header, in [`INVOICE_HEADERS`] order.
pub fn invoice_header_record(invoice: &Invoice, customer: Option<&Customer>) -> Vec<String> {
    let (name, phone, email, address) = match customer {
        Some(c) => (c.name.clone(), opt_str(&c.phone), opt_str(&c.email), opt_str(&c.address)),
        None => Default::default(),
    };
    vec![
        invoice.id.to_string(),
        format_date(&invoice.created_at),
        name,
        phone,
        email,
        address,
        invoice.subtotal.to_decimal_string(),
        invoice.tax_percent.to_decimal_string(),
        invoice.tax_amount.to_decimal_string(),
        invoice.discount.to_decimal_string(),
        invoice.total.to_decimal_string(),
        invoice.paid.to_decimal_string(),
        invoice.employee_id.to_string(),
    ]
}

/// Export line for an invoice item.
pub fn invoice_item_record(line: &InvoiceLine) -> Vec<String> {
    vec![
        line.invoice_id.to_string(),
        line.product_id.to_string(),
        line.product_code.clone(),
        line.product_name.clone(),
        line.quantity.to_string(),
        line.unit_price.to_decimal_string(),
        ITEM_MARKER.to_string(),
        line.line_total.to_decimal_string(),
    ]
}

// =============================================================================
// Dates
// =============================================================================

/// RFC 3339 in UTC, whole seconds.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare `YYYY-MM-DD`.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(date.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(id: &str) -> StringRecord {
        StringRecord::from(vec![
            id,
            "2024-03-01 09:00:00",
            "Ana",
            "0912345678",
            "",
            "",
            "10000.00",
            "10",
            "1000.00",
            "0.00",
            "11000.00",
            "11000.00",
            "1",
        ])
    }

    fn item(id: &str) -> StringRecord {
        StringRecord::from(vec![id, "3", "PEN-01", "Pen", "2", "5000.00", "ITEM", "10000.00"])
    }

    #[test]
    fn test_grouping_is_positional() {
        let mut grouper = InvoiceGrouper::new();
        let mut groups = Vec::new();

        for record in [item("0"), header("7"), item("7"), item("99"), header("8"), item("8")] {
            groups.extend(grouper.push(&record));
        }
        groups.extend(grouper.finish());

        assert_eq!(grouper.orphan_items(), 1);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].header.invoice_id, Some(7));
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[1].items.len(), 1);
    }

    #[test]
    fn test_header_row_keeps_totals() {
        let row = InvoiceHeaderRow::from_record(&header("7"));
        assert_eq!(row.subtotal, Money::from_major(10_000));
        assert_eq!(row.tax_percent, Percent::from_whole(10));
        assert_eq!(row.total, Money::from_major(11_000));
        assert_eq!(row.customer_email, None);
        assert_eq!(row.employee_id, Some(1));
        assert!(row.created_at.is_some());
    }

    #[test]
    fn test_item_row() {
        let row = InvoiceItemRow::from_record(&item("7"));
        assert_eq!(row.product_code.as_deref(), Some("PEN-01"));
        assert_eq!(row.quantity, 2);
        assert_eq!(row.unit_price, Money::from_major(5_000));
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        let record = StringRecord::from(vec!["1", "2", "C", "N", "1", "1", " item ", "1"]);
        assert!(is_item_record(&record));
        assert!(!is_item_record(&StringRecord::from(vec!["1"])));
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2024-03-01T09:00:00Z").is_some());
        assert!(parse_date("2024-03-01T09:00:00+07:00").is_some());
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("").is_none());
    }
}
