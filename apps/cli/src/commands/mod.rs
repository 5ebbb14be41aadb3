//! # Commands
//!
//! Subcommands of the `tally` binary and their dispatch.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (clap enums, dispatch, output)
//! ├── catalog.rs   ◄─── product / category
//! ├── people.rs    ◄─── customer / account
//! ├── invoice.rs   ◄─── checkout, quote, show, list, delete, report
//! ├── transfer.rs  ◄─── import / export
//! └── settings.rs  ◄─── settings show / set-*
//! ```
//!
//! ## How Commands Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tally --json product add --name Pen --price 5000                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Cli::parse() ──► Command::Product(ProductCommand::Add { .. })          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  AppState::open()  (settings file + database, migrations)               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  catalog::run_product(&state, cmd, output)                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Output::emit(&product)  ──► JSON with --json, text otherwise           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `settings` commands never open the database.

pub mod catalog;
pub mod invoice;
pub mod people;
pub mod settings;
pub mod transfer;

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;

use tally_core::{Discount, Id, Money, PaymentMethod, Percent, Role, Tier};

use crate::error::{AppError, AppResult};
use crate::services::ItemSpec;
use crate::state::AppState;

// =============================================================================
// Command Tree
// =============================================================================

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage products
    #[command(subcommand)]
    Product(ProductCommand),

    /// Manage product categories
    #[command(subcommand)]
    Category(CategoryCommand),

    /// Manage customers
    #[command(subcommand)]
    Customer(CustomerCommand),

    /// Manage employee accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Price, save and inspect invoices
    #[command(subcommand)]
    Invoice(InvoiceCommand),

    /// Sales totals and best sellers for a period
    Report(ReportArgs),

    /// Import a CSV file
    Import {
        #[arg(value_enum)]
        entity: Entity,
        path: PathBuf,
    },

    /// Export to a CSV file
    Export {
        #[arg(value_enum)]
        entity: Entity,
        path: PathBuf,
    },

    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

/// What an import or export works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Entity {
    Products,
    Customers,
    Invoices,
}

#[derive(Debug, Subcommand)]
pub enum ProductCommand {
    /// Add a product
    Add(ProductArgs),
    /// Replace a product's fields; unspecified fields keep their value
    Update {
        id: Id,
        #[command(flatten)]
        fields: ProductPatch,
    },
    /// Show one product by code or id
    Show { key: String },
    /// List all products
    List,
    /// Products whose name or code contains the query
    Search { query: String },
    /// Delete a product that no invoice references
    Delete { id: Id },
    /// Delete every product (refused while invoices reference any)
    Purge {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
pub struct ProductArgs {
    #[arg(long)]
    pub name: String,
    /// Generated when omitted
    #[arg(long)]
    pub code: Option<String>,
    #[arg(long, value_parser = parse_money)]
    pub price: Money,
    /// Defaults to 80% of the sale price
    #[arg(long, value_parser = parse_money)]
    pub purchase_price: Option<Money>,
    /// Category name; created when unknown
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub unit: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub stock: i64,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Args, Default)]
pub struct ProductPatch {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub code: Option<String>,
    #[arg(long, value_parser = parse_money)]
    pub price: Option<Money>,
    #[arg(long, value_parser = parse_money)]
    pub purchase_price: Option<Money>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub unit: Option<String>,
    #[arg(long)]
    pub stock: Option<i64>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Rename {
        id: Id,
        name: String,
    },
    List,
    /// Delete a category no product uses
    Delete { id: Id },
    /// Delete every category (refused while products use any)
    Purge {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CustomerCommand {
    Add(CustomerArgs),
    Update {
        id: Id,
        #[command(flatten)]
        fields: CustomerPatch,
    },
    Show { id: Id },
    List,
    /// Customers whose name, phone or email contains the query
    Search { query: String },
    Delete { id: Id },
    /// Delete every customer (refused while invoices reference any)
    Purge {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
pub struct CustomerArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long = "type")]
    pub customer_type: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub points: i64,
    /// Derived from points when omitted
    #[arg(long)]
    pub tier: Option<Tier>,
}

#[derive(Debug, Args, Default)]
pub struct CustomerPatch {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long = "type")]
    pub customer_type: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    Add {
        username: String,
        #[arg(long)]
        full_name: String,
        #[arg(long, default_value_t = Role::Cashier)]
        role: Role,
    },
    List,
    Deactivate { id: Id },
    Activate { id: Id },
    /// Delete an account that rang up no invoice
    Delete { id: Id },
}

#[derive(Debug, Subcommand)]
pub enum InvoiceCommand {
    /// Save an invoice, decrement stock and credit loyalty points
    Checkout(CheckoutArgs),
    /// Price a sale without saving it
    Quote(CheckoutArgs),
    /// Show an invoice with its lines
    Show { id: Id },
    /// Invoices in a period, newest first
    List(PeriodArgs),
    /// Delete an invoice and restore its stock
    Delete { id: Id },
    /// Delete every invoice and restore stock
    Purge {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// CODE[:QTY][@PRICE], repeatable
    #[arg(long = "item", short = 'i', required = true)]
    pub items: Vec<ItemSpec>,
    /// Customer id; omit for a walk-in sale
    #[arg(long)]
    pub customer: Option<Id>,
    /// Employee username; defaults to the first active account
    #[arg(long)]
    pub employee: Option<String>,
    /// Tax percent; defaults to the settings value
    #[arg(long, value_parser = parse_percent)]
    pub tax: Option<Percent>,
    /// Manual discount, an amount unless --discount-percent
    #[arg(long)]
    pub discount: Option<String>,
    #[arg(long)]
    pub discount_percent: bool,
    /// Amount handed over; defaults to the total
    #[arg(long, value_parser = parse_money)]
    pub paid: Option<Money>,
    #[arg(long)]
    pub method: Option<PaymentMethod>,
}

impl CheckoutArgs {
    pub fn discount(&self) -> Discount {
        match &self.discount {
            Some(text) => Discount::parse(text, self.discount_percent),
            None => Discount::None,
        }
    }
}

/// `[from, to)` period. Dates are `YYYY-MM-DD` or RFC 3339, read as UTC.
#[derive(Debug, Args, Default)]
pub struct PeriodArgs {
    #[arg(long, value_parser = parse_date)]
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    /// Exclusive
    #[arg(long, value_parser = parse_date)]
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub period: PeriodArgs,
    /// Best sellers to list
    #[arg(long, default_value_t = 5)]
    pub top: u32,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the settings file location and content
    Show,
    /// Default tax percent for new invoices
    SetTax {
        #[arg(value_parser = parse_percent)]
        percent: Percent,
    },
    /// Threshold and discount of one tier
    SetTier {
        tier: Tier,
        #[arg(long)]
        min_points: Option<i64>,
        #[arg(long, value_parser = parse_percent)]
        discount: Option<Percent>,
    },
    /// Spend that earns one loyalty point
    SetSpend {
        #[arg(value_parser = parse_money)]
        amount: Money,
    },
    SetStore {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    SetPayment {
        #[arg(long)]
        method: Option<PaymentMethod>,
        #[arg(long)]
        bank_code: Option<String>,
        #[arg(long)]
        account_number: Option<String>,
        #[arg(long)]
        account_name: Option<String>,
    },
    /// Database file used when --db and TALLY_DB_PATH are absent
    SetDb { path: PathBuf },
}

// =============================================================================
// Dispatch
// =============================================================================

/// Runs a command that needs the database.
pub async fn dispatch(state: &AppState, command: Command, output: Output) -> AppResult<()> {
    match command {
        Command::Product(cmd) => catalog::run_product(state, cmd, output).await,
        Command::Category(cmd) => catalog::run_category(state, cmd, output).await,
        Command::Customer(cmd) => people::run_customer(state, cmd, output).await,
        Command::Account(cmd) => people::run_account(state, cmd, output).await,
        Command::Invoice(cmd) => invoice::run_invoice(state, cmd, output).await,
        Command::Report(args) => invoice::run_report(state, args, output).await,
        Command::Import { entity, path } => transfer::run_import(state, entity, &path, output).await,
        Command::Export { entity, path } => transfer::run_export(state, entity, &path, output).await,
        Command::Settings(cmd) => settings::run_settings(state.settings(), cmd, output),
    }
}

// =============================================================================
// Output
// =============================================================================

/// Where results go: pretty JSON on stdout with `--json`, text otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
}

impl Output {
    /// Prints `value` as JSON, or hands it to `text` for the human form.
    pub fn emit<T, F>(&self, value: &T, text: F) -> AppResult<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T),
    {
        if self.json {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| AppError::internal(format!("Cannot encode output: {}", e)))?;
            println!("{}", json);
        } else {
            text(value);
        }
        Ok(())
    }
}

/// Bulk deletes must be confirmed with `--yes`.
fn confirm(yes: bool, what: &str) -> AppResult<()> {
    if yes {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Refusing to delete all {} without --yes",
            what
        )))
    }
}

// =============================================================================
// Argument Parsers
// =============================================================================

/// Non-negative amount up to `Money::MAX`, invariant or culture format.
pub fn parse_money(text: &str) -> Result<Money, String> {
    Money::parse_lenient(text)
        .filter(|m| !m.is_negative() && m.is_within_bounds())
        .ok_or_else(|| format!("'{}' is not an amount between 0 and {}", text, Money::MAX))
}

/// Percentage such as `10` or `7.5`, at most 100.
pub fn parse_percent(text: &str) -> Result<Percent, String> {
    Percent::parse_lenient(text)
        .filter(|p| *p <= Percent::HUNDRED)
        .ok_or_else(|| format!("'{}' is not a percentage between 0 and 100", text))
}

pub fn parse_date(text: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    tally_core::codec::invoice::parse_date(text)
        .ok_or_else(|| format!("'{}' is not a date (YYYY-MM-DD)", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("1.250,50"), Ok(Money::from_minor(125_050)));
        assert!(parse_money("-3").is_err());
        assert!(parse_money("abc").is_err());
        assert!(parse_money("50000000000000000").is_err());
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("7.5"), Ok(Percent::from_bps(750)));
        assert!(parse_percent("101").is_err());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2026-03-01").unwrap();
        assert_eq!(date.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert!(parse_date("March").is_err());
    }

    #[test]
    fn test_discount_from_args() {
        let args = CheckoutArgs {
            items: vec!["PEN".parse().unwrap()],
            customer: None,
            employee: None,
            tax: None,
            discount: Some("10".to_string()),
            discount_percent: true,
            paid: None,
            method: None,
        };
        assert_eq!(args.discount(), Discount::Percent(Percent::from_whole(10)));
    }

    #[test]
    fn test_purge_needs_confirmation() {
        assert!(confirm(false, "products").is_err());
        assert!(confirm(true, "products").is_ok());
    }
}
