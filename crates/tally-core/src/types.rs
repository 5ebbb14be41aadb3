//! # Domain Types
//!
//! Core domain types used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Category     │◄──│     Product     │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id, code       │   │  id             │       │
//! │  │  name (unique)  │   │  sale_price     │   │  tier (cached)  │       │
//! │  └─────────────────┘   │  stock_quantity │   │  points         │       │
//! │                        └────────▲────────┘   └────────▲────────┘       │
//! │                                 │                     │ nullable       │
//! │  ┌─────────────────┐   ┌────────┴────────┐   ┌────────┴────────┐       │
//! │  │    Account      │◄──│   InvoiceItem   │──►│     Invoice     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  username       │   │  unit_price     │   │  subtotal, tax  │       │
//! │  │  role           │   │  quantity       │   │  discount,total │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persisted vs New
//! Every entity has a persisted form (with `id` and timestamps, read from the
//! database) and a `New*` form carrying only what a caller supplies. `New*`
//! types validate themselves before anything reaches the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::{Money, Percent};
use crate::tier::Tier;
use crate::validation::{self, ValidationResult};

/// Row identifier (SQLite `INTEGER PRIMARY KEY`).
pub type Id = i64;

// =============================================================================
// Category
// =============================================================================

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or renaming a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

impl NewCategory {
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_name("category name", &self.name)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Id,

    /// Business identifier printed on shelves and typed at checkout.
    pub code: String,

    /// Display name shown to cashier and on the invoice.
    pub name: String,

    /// `None` means uncategorized.
    pub category_id: Option<Id>,

    /// Price charged to customers.
    pub sale_price: Money,

    /// Price paid to the supplier.
    pub purchase_price: Money,

    /// Unit the supplier sells in (box, carton, ...).
    pub purchase_unit: Option<String>,

    /// Quantity received in the last import.
    pub import_quantity: i64,

    /// Units on hand. Never negative.
    pub stock_quantity: i64,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks if `quantity` units can be sold from current stock.
    pub fn can_sell(&self, quantity: i64) -> bool {
        quantity <= self.stock_quantity
    }
}

/// Input for creating or updating a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub category_id: Option<Id>,
    pub sale_price: Money,
    pub purchase_price: Money,
    pub purchase_unit: Option<String>,
    pub import_quantity: i64,
    pub stock_quantity: i64,
    pub description: Option<String>,
}

impl NewProduct {
    /// Validates code, name, prices and quantities.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::{Money, NewProduct};
    ///
    /// let pen = NewProduct {
    ///     code: "PEN-01".to_string(),
    ///     name: "Pen".to_string(),
    ///     sale_price: Money::from_major(5_000),
    ///     ..Default::default()
    /// };
    /// assert!(pen.validate().is_ok());
    ///
    /// let broken = NewProduct { stock_quantity: -1, ..pen };
    /// assert!(broken.validate().is_err());
    /// ```
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_code(&self.code)?;
        self.validate_details()
    }

    /// Validation for a product read from a file: the code only has to be
    /// non-blank and short enough. Everything else is checked as in
    /// [`validate`](Self::validate).
    pub fn validate_imported(&self) -> ValidationResult<()> {
        validation::validate_imported_code(&self.code)?;
        self.validate_details()
    }

    fn validate_details(&self) -> ValidationResult<()> {
        validation::validate_name("name", &self.name)?;
        validation::validate_money("sale price", self.sale_price)?;
        validation::validate_money("purchase price", self.purchase_price)?;
        validation::validate_stock("stock quantity", self.stock_quantity)?;
        validation::validate_stock("import quantity", self.import_quantity)?;
        Ok(())
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer known to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: Id,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,

    /// Free-form grouping (retail, wholesale, ...).
    pub customer_type: Option<String>,

    pub address: Option<String>,

    /// Tier at the time of the last accrual. May be stale after a policy
    /// change.
    pub tier: Tier,

    /// Loyalty point balance. Never negative.
    pub points: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub customer_type: Option<String>,
    pub address: Option<String>,
    pub tier: Tier,
    pub points: i64,
}

impl NewCustomer {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(phone) = &self.phone {
            validation::validate_phone(phone)?;
        }
        if let Some(email) = &self.email {
            validation::validate_email(email)?;
        }
        self.validate_details()
    }

    /// Validation for a customer read from a file: phone and email are kept
    /// as written as long as they fit.
    pub fn validate_imported(&self) -> ValidationResult<()> {
        if let Some(phone) = &self.phone {
            validation::validate_imported_contact("phone", phone)?;
        }
        if let Some(email) = &self.email {
            validation::validate_imported_contact("email", email)?;
        }
        self.validate_details()
    }

    fn validate_details(&self) -> ValidationResult<()> {
        validation::validate_name("name", &self.name)?;
        if self.points < 0 {
            return Err(ValidationError::Negative {
                field: "points".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Account
// =============================================================================

/// Employee role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cashier,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Cashier
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "cashier" => Ok(Role::Cashier),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["admin".to_string(), "cashier".to_string()],
            }),
        }
    }
}

/// An employee account. Invoices record which account rang them up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub id: Id,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl NewAccount {
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_username(&self.username)?;
        validation::validate_name("full name", &self.full_name)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How an invoice was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Bank transfer, typically via a printed QR code.
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::BankTransfer,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Accepts `cash`, `card`, `bank_transfer` (also `bank-transfer`,
/// `transfer`), case-insensitive.
impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "bank_transfer" | "transfer" => Ok(PaymentMethod::BankTransfer),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A committed invoice (header).
///
/// ## Invariants
/// - `total == max(0, subtotal + tax_amount - discount)`
/// - `tax_amount == round(subtotal × tax_percent, 2)`
///
/// Immutable once saved; deletion reverses its stock movements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Invoice {
    pub id: Id,

    /// `None` for walk-in sales.
    pub customer_id: Option<Id>,

    /// Account that rang up the sale.
    pub employee_id: Id,

    pub subtotal: Money,
    pub tax_percent: Percent,
    pub tax_amount: Money,

    /// Manual plus tier discount.
    pub discount: Money,

    pub total: Money,
    pub paid: Money,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Change handed back to the customer.
    pub fn change_due(&self) -> Money {
        (self.paid - self.total).non_negative()
    }
}

/// A line of a committed invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceItem {
    pub id: Id,
    pub invoice_id: Id,
    pub product_id: Id,

    /// Repeats the invoice's employee.
    pub employee_id: Id,

    /// Price at time of sale (frozen).
    pub unit_price: Money,

    pub quantity: i64,

    /// `unit_price × quantity`.
    pub line_total: Money,
}

/// An invoice line joined with its product's code and name, as shown on
/// screen and written to transfer files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InvoiceLine {
    pub invoice_id: Id,
    pub product_id: Id,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A line to be saved with a new invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub product_id: Id,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewInvoiceItem {
    /// `unit_price × quantity`; `AmountTooLarge` on overflow.
    pub fn line_total(&self) -> ValidationResult<Money> {
        crate::pricing::line_total(self.unit_price, self.quantity)
    }
}

/// Everything needed to persist an invoice with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub customer_id: Option<Id>,
    pub employee_id: Id,
    pub subtotal: Money,
    pub tax_percent: Percent,
    pub tax_amount: Money,
    pub discount: Money,
    pub total: Money,
    pub paid: Money,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewInvoiceItem>,

    /// Defaults to now. Imports keep the original date.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewInvoice {
    /// Checks that the invoice has lines, every line is sellable and every
    /// stored amount is within `Money::MAX`.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.items.is_empty() {
            return Err(ValidationError::required("items"));
        }
        for item in &self.items {
            validation::validate_quantity(item.quantity)?;
            validation::validate_money("unit price", item.unit_price)?;
            item.line_total()?;
        }
        validation::validate_money("subtotal", self.subtotal)?;
        validation::validate_money("tax amount", self.tax_amount)?;
        validation::validate_money("discount", self.discount)?;
        validation::validate_money("total", self.total)?;
        validation::validate_money("paid", self.paid)?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("Cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!(
            "bank-transfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("manager".parse::<Role>().is_err());
    }

    #[test]
    fn test_new_invoice_requires_items() {
        let invoice = NewInvoice {
            customer_id: None,
            employee_id: 1,
            subtotal: Money::zero(),
            tax_percent: Percent::zero(),
            tax_amount: Money::zero(),
            discount: Money::zero(),
            total: Money::zero(),
            paid: Money::zero(),
            payment_method: PaymentMethod::Cash,
            items: vec![],
            created_at: None,
        };
        assert!(invoice.validate().is_err());
    }

    #[test]
    fn test_new_item_line_total() {
        let item = NewInvoiceItem {
            product_id: 1,
            quantity: 3,
            unit_price: Money::from_minor(1_250),
        };
        assert_eq!(item.line_total().unwrap(), Money::from_minor(3_750));
    }

    #[test]
    fn test_new_invoice_rejects_amounts_beyond_max() {
        let item = NewInvoiceItem {
            product_id: 1,
            quantity: 1,
            unit_price: Money::from_major(10),
        };
        let invoice = NewInvoice {
            customer_id: None,
            employee_id: 1,
            subtotal: Money::from_major(10),
            tax_percent: Percent::zero(),
            tax_amount: Money::zero(),
            discount: Money::zero(),
            total: Money::from_minor(Money::MAX.minor() + 1),
            paid: Money::zero(),
            payment_method: PaymentMethod::Cash,
            items: vec![item],
            created_at: None,
        };
        assert!(matches!(
            invoice.validate(),
            Err(ValidationError::AmountTooLarge { .. })
        ));
    }

    #[test]
    fn test_new_customer_rejects_negative_points() {
        let customer = NewCustomer {
            name: "Ana".to_string(),
            points: -1,
            ..Default::default()
        };
        assert!(customer.validate().is_err());
    }

    #[test]
    fn test_imported_product_keeps_loose_code() {
        let product = NewProduct {
            code: "PEN 01".to_string(),
            name: "Pen".to_string(),
            ..Default::default()
        };
        assert!(product.validate().is_err());
        assert!(product.validate_imported().is_ok());

        let unnamed = NewProduct {
            name: " ".to_string(),
            ..product
        };
        assert!(unnamed.validate_imported().is_err());
    }

    #[test]
    fn test_imported_customer_keeps_loose_phone() {
        let customer = NewCustomer {
            name: "Ana".to_string(),
            phone: Some("0901 234 567 ext. 2".to_string()),
            ..Default::default()
        };
        assert!(customer.validate().is_err());
        assert!(customer.validate_imported().is_ok());

        let negative = NewCustomer { points: -1, ..customer };
        assert!(negative.validate_imported().is_err());
    }
}
