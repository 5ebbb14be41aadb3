//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tables and Owners                                │
//! │                                                                         │
//! │  CategoryRepository  → categories                                      │
//! │  ProductRepository   → products        (stock levels)                  │
//! │  CustomerRepository  → customers       (points, cached tier)           │
//! │  AccountRepository   → accounts        (employees)                     │
//! │  InvoiceRepository   → invoices + invoice_items (+ stock movements)    │
//! │                                                                         │
//! │  Deletes refuse while dependents exist:                                │
//! │    category ← product ← invoice_item → invoice → customer / account    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every repository is a cheap clone over the shared `SqlitePool`; get one
//! from [`crate::Database`] rather than building it by hand.

pub mod account;
pub(crate) mod bulk;
pub mod category;
pub mod customer;
pub mod invoice;
pub mod product;

/// `%text%` with `%`, `_` and `\` escaped, for `LIKE ?1 ESCAPE '\'`.
/// Matching ignores ASCII case.
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("pen"), "%pen%");
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
