//! Header resolution for header-driven transfer files.
//!
//! Each logical column accepts several spellings. Matching ignores case,
//! spaces, underscores and hyphens, so `Sale Price`, `sale_price` and
//! `SALEPRICE` all resolve to the same column, wherever it appears.

use std::collections::HashMap;

use ::csv::StringRecord;
use thiserror::Error;

use super::field;

/// A logical column and the header spellings that map to it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Canonical name, also the key used with [`HeaderMap::get`].
    pub name: &'static str,
    pub synonyms: &'static [&'static str],
    /// Import aborts when a required column is absent.
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str, synonyms: &'static [&'static str]) -> Self {
        ColumnSpec {
            name,
            synonyms,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, synonyms: &'static [&'static str]) -> Self {
        ColumnSpec {
            name,
            synonyms,
            required: false,
        }
    }

    fn matches(&self, normalized_header: &str) -> bool {
        self.synonyms
            .iter()
            .any(|s| normalize(s) == normalized_header)
    }
}

/// A required column was not found in the header line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required column: {column}")]
pub struct MissingColumn {
    pub column: String,
}

/// Lowercases and strips spaces, underscores and hyphens.
pub fn normalize(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolved positions of logical columns in one file.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    indices: HashMap<&'static str, usize>,
}

impl HeaderMap {
    /// Resolves `columns` against a header line.
    ///
    /// When two header cells match the same column the first one wins.
    ///
    /// ## Example
    /// ```rust
    /// use csv::StringRecord;
    /// use tally_core::codec::{HeaderMap, PRODUCT_COLUMNS};
    ///
    /// let headers = StringRecord::from(vec!["Price", "product_name"]);
    /// let map = HeaderMap::resolve(&headers, PRODUCT_COLUMNS).unwrap();
    /// assert_eq!(map.index("Price"), Some(0));
    /// assert_eq!(map.index("Name"), Some(1));
    /// assert_eq!(map.index("PurchasePrice"), None);
    /// ```
    pub fn resolve(headers: &StringRecord, columns: &[ColumnSpec]) -> Result<HeaderMap, MissingColumn> {
        let mut indices = HashMap::new();

        for (index, header) in headers.iter().enumerate() {
            let normalized = normalize(header);
            if normalized.is_empty() {
                continue;
            }
            if let Some(spec) = columns.iter().find(|c| c.matches(&normalized)) {
                indices.entry(spec.name).or_insert(index);
            }
        }

        if let Some(missing) = columns
            .iter()
            .find(|c| c.required && !indices.contains_key(c.name))
        {
            return Err(MissingColumn {
                column: missing.name.to_string(),
            });
        }

        Ok(HeaderMap { indices })
    }

    /// Position of a logical column, if present.
    pub fn index(&self, column: &str) -> Option<usize> {
        self.indices.get(column).copied()
    }

    /// Whether the file has the column at all.
    pub fn has(&self, column: &str) -> bool {
        self.indices.contains_key(column)
    }

    /// Trimmed value of a logical column; `""` when the column is absent or
    /// the record is short.
    pub fn get<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        match self.index(column) {
            Some(index) => field(record, index),
            None => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[ColumnSpec] = &[
        ColumnSpec::required("Name", &["Name", "ProductName"]),
        ColumnSpec::required("Price", &["SalePrice", "Price", "Sale Price", "UnitPrice"]),
        ColumnSpec::optional("Stock", &["StockQuantity", "Stock"]),
    ];

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" Sale_Price "), "saleprice");
        assert_eq!(normalize("\u{feff}Name"), "name");
        assert_eq!(normalize("stock-quantity"), "stockquantity");
    }

    #[test]
    fn test_resolve_any_order_and_case() {
        let headers = StringRecord::from(vec!["STOCK", "sale price", "name"]);
        let map = HeaderMap::resolve(&headers, COLUMNS).unwrap();
        assert_eq!(map.index("Stock"), Some(0));
        assert_eq!(map.index("Price"), Some(1));
        assert_eq!(map.index("Name"), Some(2));
    }

    #[test]
    fn test_missing_required_column() {
        let headers = StringRecord::from(vec!["Name", "Stock"]);
        let err = HeaderMap::resolve(&headers, COLUMNS).unwrap_err();
        assert_eq!(err.column, "Price");
    }

    #[test]
    fn test_first_matching_header_wins() {
        let headers = StringRecord::from(vec!["Name", "Price", "UnitPrice"]);
        let map = HeaderMap::resolve(&headers, COLUMNS).unwrap();
        assert_eq!(map.index("Price"), Some(1));
    }

    #[test]
    fn test_get_out_of_range_is_empty() {
        let headers = StringRecord::from(vec!["Name", "Price", "Stock"]);
        let map = HeaderMap::resolve(&headers, COLUMNS).unwrap();
        let short = StringRecord::from(vec!["Pen"]);
        assert_eq!(map.get(&short, "Name"), "Pen");
        assert_eq!(map.get(&short, "Stock"), "");
    }
}
