//! Product records.
//!
//! ## Import Defaults
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PurchasePrice missing/blank/unparsable → 80% of SalePrice             │
//! │  StockQuantity missing/unparsable       → 0                            │
//! │  ImportQuantity missing/unparsable      → StockQuantity                │
//! │  Code missing                           → generated P{n}               │
//! │  CategoryName missing                   → CategoryId, else none        │
//! │  Name blank                             → row skipped                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Code generation and category lookup need the database; this module only
//! decides *what* the row says and offers [`CodeGenerator`].

use std::collections::HashSet;

use ::csv::StringRecord;

use super::header::{ColumnSpec, HeaderMap};
use super::{non_empty, opt_str};
use crate::money::{Money, Percent};
use crate::number;
use crate::types::{Id, NewProduct, Product};

/// Export header line.
pub const PRODUCT_HEADERS: [&str; 11] = [
    "Id",
    "Name",
    "Code",
    "CategoryId",
    "CategoryName",
    "SalePrice",
    "PurchasePrice",
    "PurchaseUnit",
    "ImportQuantity",
    "StockQuantity",
    "Description",
];

/// Columns understood on import.
pub const PRODUCT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec::optional("Id", &["Id", "ProductId"]),
    ColumnSpec::required("Name", &["Name", "ProductName", "Product"]),
    ColumnSpec::optional("Code", &["Code", "ProductCode", "Sku", "Barcode"]),
    ColumnSpec::optional("CategoryId", &["CategoryId"]),
    ColumnSpec::optional("CategoryName", &["CategoryName", "Category"]),
    ColumnSpec::required("Price", &["SalePrice", "Price", "Sale Price", "UnitPrice", "SellingPrice"]),
    ColumnSpec::optional("PurchasePrice", &["PurchasePrice", "CostPrice", "Cost", "ImportPrice"]),
    ColumnSpec::optional("PurchaseUnit", &["PurchaseUnit", "Unit"]),
    ColumnSpec::optional("ImportQuantity", &["ImportQuantity", "ImportQty"]),
    ColumnSpec::optional("StockQuantity", &["StockQuantity", "Stock", "Quantity", "Qty"]),
    ColumnSpec::optional("Description", &["Description", "Notes"]),
];

/// Purchase price assumed when a file has none: 80% of the sale price.
pub const DEFAULT_PURCHASE_RATIO: Percent = Percent::from_whole(80);

/// One product line as read from a file, before codes and categories are
/// resolved against the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub name: String,
    pub code: Option<String>,
    pub category_id: Option<Id>,
    pub category_name: Option<String>,
    pub sale_price: Money,
    pub purchase_price: Money,
    pub purchase_unit: Option<String>,
    pub import_quantity: i64,
    pub stock_quantity: i64,
    pub description: Option<String>,
}

impl ProductRow {
    /// Reads a record. Returns `None` when the name is blank.
    pub fn from_record(map: &HeaderMap, record: &StringRecord) -> Option<ProductRow> {
        let name = non_empty(map.get(record, "Name"))?;

        let sale_price = Money::parse_lenient(map.get(record, "Price"))
            .unwrap_or_default()
            .non_negative();
        let purchase_price = Money::parse_lenient(map.get(record, "PurchasePrice"))
            .map(Money::non_negative)
            .unwrap_or_else(|| sale_price.percent_of(DEFAULT_PURCHASE_RATIO));
        let stock_quantity = number::parse_int_lenient(map.get(record, "StockQuantity"))
            .unwrap_or(0)
            .max(0);
        let import_quantity = number::parse_int_lenient(map.get(record, "ImportQuantity"))
            .map(|q| q.max(0))
            .unwrap_or(stock_quantity);

        Some(ProductRow {
            name,
            code: non_empty(map.get(record, "Code")),
            category_id: number::parse_int_lenient(map.get(record, "CategoryId")),
            category_name: non_empty(map.get(record, "CategoryName")),
            sale_price,
            purchase_price,
            purchase_unit: non_empty(map.get(record, "PurchaseUnit")),
            import_quantity,
            stock_quantity,
            description: non_empty(map.get(record, "Description")),
        })
    }

    /// Completes the row with its resolved code and category.
    pub fn into_new_product(self, code: String, category_id: Option<Id>) -> NewProduct {
        NewProduct {
            code,
            name: self.name,
            category_id,
            sale_price: self.sale_price,
            purchase_price: self.purchase_price,
            purchase_unit: self.purchase_unit,
            import_quantity: self.import_quantity,
            stock_quantity: self.stock_quantity,
            description: self.description,
        }
    }
}

/// Export line for a product, in [`PRODUCT_HEADERS`] order.
pub fn product_record(product: &Product, category_name: Option<&str>) -> Vec<String> {
    vec![
        product.id.to_string(),
        product.name.clone(),
        product.code.clone(),
        product.category_id.map(|id| id.to_string()).unwrap_or_default(),
        category_name.unwrap_or_default().to_string(),
        product.sale_price.to_decimal_string(),
        product.purchase_price.to_decimal_string(),
        opt_str(&product.purchase_unit),
        product.import_quantity.to_string(),
        product.stock_quantity.to_string(),
        opt_str(&product.description),
    ]
}

/// Generates `P1`, `P2`, … codes that collide with neither existing codes
/// nor codes already handed out in this run.
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    taken: HashSet<String>,
    next: u64,
}

impl CodeGenerator {
    /// Starts from the codes already in the database.
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        CodeGenerator {
            taken: existing
                .into_iter()
                .map(|c| c.as_ref().to_ascii_uppercase())
                .collect(),
            next: 1,
        }
    }

    /// Records a code supplied by the file.
    pub fn reserve(&mut self, code: &str) {
        self.taken.insert(code.to_ascii_uppercase());
    }

    /// Whether a code is already used.
    pub fn is_taken(&self, code: &str) -> bool {
        self.taken.contains(&code.to_ascii_uppercase())
    }

    /// Next free generated code.
    pub fn generate(&mut self) -> String {
        loop {
            let code = format!("P{}", self.next);
            self.next += 1;
            if self.taken.insert(code.to_ascii_uppercase()) {
                return code;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(headers: &[&str]) -> HeaderMap {
        HeaderMap::resolve(&StringRecord::from(headers.to_vec()), PRODUCT_COLUMNS).unwrap()
    }

    #[test]
    fn test_purchase_price_defaults_to_80_percent() {
        let map = map(&["Name", "Price"]);
        let row = ProductRow::from_record(&map, &StringRecord::from(vec!["Pen", "5000"])).unwrap();

        assert_eq!(row.sale_price, Money::from_major(5_000));
        assert_eq!(row.purchase_price, Money::from_major(4_000));
        assert_eq!(row.stock_quantity, 0);
        assert_eq!(row.import_quantity, 0);
        assert_eq!(row.code, None);
    }

    #[test]
    fn test_blank_purchase_price_also_defaults() {
        let map = map(&["Name", "Price", "PurchasePrice"]);
        let row = ProductRow::from_record(&map, &StringRecord::from(vec!["Pen", "100", " "])).unwrap();
        assert_eq!(row.purchase_price, Money::from_major(80));
    }

    #[test]
    fn test_import_quantity_defaults_to_stock() {
        let map = map(&["Name", "Price", "Stock"]);
        let row = ProductRow::from_record(&map, &StringRecord::from(vec!["Pen", "1", "12"])).unwrap();
        assert_eq!(row.stock_quantity, 12);
        assert_eq!(row.import_quantity, 12);
    }

    #[test]
    fn test_culture_formatted_numbers() {
        let map = map(&["Name", "Sale Price", "PurchasePrice"]);
        let row = ProductRow::from_record(&map, &StringRecord::from(vec!["Ink", "1.234,50", "1,000"]))
            .unwrap();
        assert_eq!(row.sale_price, Money::from_minor(123_450));
        assert_eq!(row.purchase_price, Money::from_major(1_000));
    }

    #[test]
    fn test_unparsable_price_defaults_to_zero() {
        let map = map(&["Name", "Price"]);
        let row = ProductRow::from_record(&map, &StringRecord::from(vec!["Pen", "free"])).unwrap();
        assert_eq!(row.sale_price, Money::zero());
    }

    #[test]
    fn test_blank_name_is_skipped() {
        let map = map(&["Name", "Price"]);
        assert!(ProductRow::from_record(&map, &StringRecord::from(vec!["  ", "5"])).is_none());
    }

    #[test]
    fn test_code_generator_skips_taken() {
        let mut generator = CodeGenerator::new(["P1", "p3"]);
        generator.reserve("P2");
        assert_eq!(generator.generate(), "P4");
        assert_eq!(generator.generate(), "P5");
        assert!(generator.is_taken("p5"));
    }
}
