//! # Invoice Repository
//!
//! Persists invoices together with their lines and the stock movements they
//! cause.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Lifecycle                                 │
//! │                                                                         │
//! │  1. SAVE (one transaction)                                             │
//! │     ├── INSERT invoices                  → new id                      │
//! │     ├── INSERT invoice_items (each line)                               │
//! │     └── UPDATE products stock = MAX(0, stock - qty) (each line)        │
//! │     Any failure → ROLLBACK, error returned, nothing persisted          │
//! │                                                                         │
//! │  2. READ                                                               │
//! │     └── get / items / lines / list / sales_report                      │
//! │                                                                         │
//! │  3. DELETE (one transaction)                                           │
//! │     ├── UPDATE products stock = stock + qty (each line)                │
//! │     ├── DELETE invoice_items                                           │
//! │     └── DELETE invoices                                                │
//! │                                                                         │
//! │  Invoices are never edited after save.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, FromRow, SqlitePool};
use tracing::{debug, info};

use super::bulk::RelaxedForeignKeys;
use crate::error::{DbError, DbResult};
use tally_core::{Id, Invoice, InvoiceItem, InvoiceLine, Money, NewInvoice};

const INVOICE_COLUMNS: &str = "id, customer_id, employee_id, subtotal, tax_percent, tax_amount, \
     discount, total, paid, payment_method, created_at";

const LINE_SELECT: &str = "SELECT ii.invoice_id, ii.product_id, p.code AS product_code, \
     p.name AS product_name, ii.quantity, ii.unit_price, ii.line_total \
     FROM invoice_items ii JOIN products p ON p.id = ii.product_id";

// =============================================================================
// Report Types
// =============================================================================

/// Aggregates over the invoices of a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesReport {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub invoice_count: i64,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount: Money,
    pub total: Money,
    pub paid: Money,
    /// Best sellers by quantity, highest first.
    pub top_products: Vec<ProductSales>,
}

/// Units sold and revenue of one product in a report period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProductSales {
    pub product_id: Id,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(FromRow)]
struct ReportTotals {
    invoice_count: i64,
    subtotal: Money,
    tax_amount: Money,
    discount: Money,
    total: Money,
    paid: Money,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Saves an invoice with all its lines and decrements stock.
    ///
    /// Header, lines and stock updates commit together or not at all.
    /// Stock is floored at zero; callers check availability beforehand.
    ///
    /// ## Returns
    /// The id of the new invoice.
    ///
    /// ## Errors
    /// - `Validation` when the invoice has no lines or a bad quantity
    /// - `NotFound` when a line names a product that does not exist
    /// - `ForeignKeyViolation` for an unknown customer or employee
    pub async fn save_invoice(&self, invoice: &NewInvoice) -> DbResult<Id> {
        invoice.validate()?;
        let created_at = invoice.created_at.unwrap_or_else(Utc::now);
        let now = Utc::now();

        debug!(
            customer_id = ?invoice.customer_id,
            employee_id = invoice.employee_id,
            lines = invoice.items.len(),
            total = %invoice.total,
            "Saving invoice"
        );

        let mut tx = self.pool.begin().await?;

        let invoice_id = sqlx::query(
            r#"
            INSERT INTO invoices (
                customer_id, employee_id, subtotal, tax_percent, tax_amount,
                discount, total, paid, payment_method, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(invoice.customer_id)
        .bind(invoice.employee_id)
        .bind(invoice.subtotal)
        .bind(invoice.tax_percent)
        .bind(invoice.tax_amount)
        .bind(invoice.discount)
        .bind(invoice.total)
        .bind(invoice.paid)
        .bind(invoice.payment_method)
        .bind(created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for item in &invoice.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    invoice_id, product_id, employee_id, unit_price, quantity, line_total
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(invoice_id)
            .bind(item.product_id)
            .bind(invoice.employee_id)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.line_total()?)
            .execute(&mut *tx)
            .await?;

            let updated = sqlx::query(
                "UPDATE products SET stock_quantity = MAX(0, stock_quantity - ?2), updated_at = ?3 WHERE id = ?1",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::not_found("Product", item.product_id.to_string()));
            }
        }

        tx.commit().await?;

        info!(invoice_id = invoice_id, total = %invoice.total, "Invoice saved");
        Ok(invoice_id)
    }

    /// Deletes an invoice and puts its quantities back into stock.
    ///
    /// ## Errors
    /// `NotFound` when the invoice does not exist.
    pub async fn delete_invoice(&self, id: Id) -> DbResult<()> {
        debug!(invoice_id = id, "Deleting invoice");

        let mut tx = self.pool.begin().await?;

        let exists: Option<Id> = sqlx::query_scalar("SELECT id FROM invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Invoice", id.to_string()));
        }

        let items: Vec<(Id, i64)> =
            sqlx::query_as("SELECT product_id, quantity FROM invoice_items WHERE invoice_id = ?1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let now = Utc::now();
        for (product_id, quantity) in &items {
            sqlx::query("UPDATE products SET stock_quantity = stock_quantity + ?2, updated_at = ?3 WHERE id = ?1")
                .bind(product_id)
                .bind(quantity)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(invoice_id = id, lines = items.len(), "Invoice deleted, stock restored");
        Ok(())
    }

    /// Gets an invoice header by ID.
    pub async fn get(&self, id: Id) -> DbResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    /// Gets the stored lines of an invoice.
    pub async fn items(&self, invoice_id: Id) -> DbResult<Vec<InvoiceItem>> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, product_id, employee_id, unit_price, quantity, line_total
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Gets the lines of an invoice with product code and name.
    pub async fn lines(&self, invoice_id: Id) -> DbResult<Vec<InvoiceLine>> {
        let sql = format!("{LINE_SELECT} WHERE ii.invoice_id = ?1 ORDER BY ii.id");
        let lines = sqlx::query_as::<_, InvoiceLine>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Every invoice line, grouped by invoice id ascending.
    pub async fn all_lines(&self) -> DbResult<Vec<InvoiceLine>> {
        let sql = format!("{LINE_SELECT} ORDER BY ii.invoice_id, ii.id");
        let lines = sqlx::query_as::<_, InvoiceLine>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(lines)
    }

    /// Lists invoices, newest first, optionally within `[from, to)`.
    pub async fn list(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at < ?2) \
             ORDER BY created_at DESC, id DESC"
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Lists every invoice ordered by ID (export order).
    pub async fn list_by_id(&self) -> DbResult<Vec<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY id");
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Counts invoices.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deletes every invoice, putting all sold quantities back into stock.
    ///
    /// ## Returns
    /// Number of invoices deleted.
    pub async fn purge_all(&self) -> DbResult<u64> {
        let mut guard = RelaxedForeignKeys::acquire(&self.pool).await?;
        let outcome = purge(&mut guard).await;
        let restored = guard.restore().await;
        let deleted = outcome?;
        restored?;

        info!(deleted = deleted, "All invoices deleted, stock restored");
        Ok(deleted)
    }

    /// Totals and best sellers for invoices created within `[from, to)`.
    pub async fn sales_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        top: u32,
    ) -> DbResult<SalesReport> {
        debug!(from = ?from, to = ?to, "Building sales report");

        let totals = sqlx::query_as::<_, ReportTotals>(
            r#"
            SELECT
                COUNT(*)                      AS invoice_count,
                COALESCE(SUM(subtotal), 0)    AS subtotal,
                COALESCE(SUM(tax_amount), 0)  AS tax_amount,
                COALESCE(SUM(discount), 0)    AS discount,
                COALESCE(SUM(total), 0)       AS total,
                COALESCE(SUM(paid), 0)        AS paid
            FROM invoices
            WHERE (?1 IS NULL OR created_at >= ?1) AND (?2 IS NULL OR created_at < ?2)
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let top_products = sqlx::query_as::<_, ProductSales>(
            r#"
            SELECT
                p.id               AS product_id,
                p.code             AS code,
                p.name             AS name,
                SUM(ii.quantity)   AS quantity,
                SUM(ii.line_total) AS revenue
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            JOIN products p ON p.id = ii.product_id
            WHERE (?1 IS NULL OR i.created_at >= ?1) AND (?2 IS NULL OR i.created_at < ?2)
            GROUP BY p.id, p.code, p.name
            ORDER BY quantity DESC, p.id
            LIMIT ?3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(top)
        .fetch_all(&self.pool)
        .await?;

        Ok(SalesReport {
            from,
            to,
            invoice_count: totals.invoice_count,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            discount: totals.discount,
            total: totals.total,
            paid: totals.paid,
            top_products,
        })
    }
}

async fn purge(guard: &mut RelaxedForeignKeys) -> DbResult<u64> {
    let mut tx = guard.conn()?.begin().await?;

    sqlx::query(
        r#"
        UPDATE products SET stock_quantity = stock_quantity + (
            SELECT COALESCE(SUM(quantity), 0) FROM invoice_items WHERE product_id = products.id
        )
        WHERE id IN (SELECT DISTINCT product_id FROM invoice_items)
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM invoice_items").execute(&mut *tx).await?;
    let deleted = sqlx::query("DELETE FROM invoices")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted)
}

// =============================================================================
// Unit Tests
// =============================================================================
