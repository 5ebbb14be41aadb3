//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD operations keyed by id or by code
//! - Substring search on name and code
//! - Fresh stock reads for checkout
//!
//! ## Stock Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Changes stock_quantity                           │
//! │                                                                         │
//! │  insert / update (this file)  ← operator or import sets the level       │
//! │  save_invoice (invoice.rs)    ← MAX(0, stock - qty), in the invoice tx  │
//! │  delete_invoice (invoice.rs)  ← stock + qty, in the delete tx           │
//! │                                                                         │
//! │  Checkout never trusts a cached value: stock_of / stock_levels read    │
//! │  the row right before each check.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Connection, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::bulk::RelaxedForeignKeys;
use super::contains_pattern;
use crate::error::{DbError, DbResult};
use tally_core::validation::validate_search_query;
use tally_core::{Id, NewProduct, Product};

const PRODUCT_COLUMNS: &str = "id, code, name, category_id, sale_price, purchase_price, \
     purchase_unit, import_quantity, stock_quantity, description, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let pen = repo.get_by_code("PEN-01").await?;
/// let results = repo.search("pen").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product.
    ///
    /// ## Returns
    /// The stored product with its new id.
    ///
    /// ## Errors
    /// - `Validation` for a bad code, name, price or quantity
    /// - `UniqueViolation` when the code is taken
    /// - `ForeignKeyViolation` when the category does not exist
    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        product.validate()?;
        self.store(product).await
    }

    /// Inserts a product read from a file. Codes such as `PEN 01` are kept
    /// as written; see [`NewProduct::validate_imported`].
    pub async fn insert_imported(&self, product: &NewProduct) -> DbResult<Product> {
        product.validate_imported()?;
        self.store(product).await
    }

    async fn store(&self, product: &NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let code = product.code.trim();

        debug!(code = %code, name = %product.name, "Inserting product");

        let id = sqlx::query(
            r#"
            INSERT INTO products (
                code, name, category_id, sale_price, purchase_price,
                purchase_unit, import_quantity, stock_quantity, description,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(code)
        .bind(product.name.trim())
        .bind(product.category_id)
        .bind(product.sale_price)
        .bind(product.purchase_price)
        .bind(&product.purchase_unit)
        .bind(product.import_quantity)
        .bind(product.stock_quantity)
        .bind(&product.description)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code),
            other => other,
        })?
        .last_insert_rowid();

        self.require(id).await
    }

    /// Replaces every editable field of a product.
    ///
    /// A code that came in through an import and is left unchanged is
    /// accepted even when a new code of that shape would not be.
    pub async fn update(&self, id: Id, product: &NewProduct) -> DbResult<Product> {
        match self.get_by_id(id).await? {
            Some(current) if current.code == product.code.trim() => product.validate_imported()?,
            _ => product.validate()?,
        }
        debug!(id = id, code = %product.code, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                code = ?2, name = ?3, category_id = ?4, sale_price = ?5,
                purchase_price = ?6, purchase_unit = ?7, import_quantity = ?8,
                stock_quantity = ?9, description = ?10, updated_at = ?11
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(product.code.trim())
        .bind(product.name.trim())
        .bind(product.category_id)
        .bind(product.sale_price)
        .bind(product.purchase_price)
        .bind(&product.purchase_unit)
        .bind(product.import_quantity)
        .bind(product.stock_quantity)
        .bind(&product.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id.to_string()));
        }
        self.require(id).await
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: Id) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets a product by its code (case-insensitive).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE code = ?1 COLLATE NOCASE");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Lists all products ordered by ID.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Searches products whose name or code contains `query`.
    ///
    /// An empty query lists everything.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, "Searching products");

        if query.is_empty() {
            return self.list().await;
        }

        let pattern = contains_pattern(&query);
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE name LIKE ?1 ESCAPE '\\' OR code LIKE ?1 ESCAPE '\\' ORDER BY name, id"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// All product codes (for generating new unique codes).
    pub async fn list_codes(&self) -> DbResult<Vec<String>> {
        let codes = sqlx::query_scalar("SELECT code FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(codes)
    }

    /// Current persisted stock of one product.
    pub async fn stock_of(&self, id: Id) -> DbResult<Option<i64>> {
        let stock = sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }

    /// Current persisted stock of several products. Missing ids are absent
    /// from the map.
    pub async fn stock_levels(&self, ids: &[Id]) -> DbResult<HashMap<Id, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, stock_quantity FROM products WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(Id, i64)> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }

    /// Counts products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deletes a product that no invoice line references.
    ///
    /// ## Errors
    /// - `Referenced` when invoice lines still point at it
    /// - `NotFound` when it does not exist
    pub async fn delete(&self, id: Id) -> DbResult<()> {
        let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_items WHERE product_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if lines > 0 {
            return Err(DbError::referenced(format!("product {id}"), "invoice lines", lines));
        }

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id.to_string()));
        }

        info!(id = id, "Product deleted");
        Ok(())
    }

    /// Deletes every product.
    ///
    /// ## Errors
    /// `Referenced` when any invoice line exists; nothing is deleted.
    pub async fn purge_all(&self) -> DbResult<u64> {
        let mut guard = RelaxedForeignKeys::acquire(&self.pool).await?;
        let outcome = purge(&mut guard).await;
        let restored = guard.restore().await;
        let deleted = outcome?;
        restored?;

        info!(deleted = deleted, "All products deleted");
        Ok(deleted)
    }

    async fn require(&self, id: Id) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id.to_string()))
    }
}

async fn purge(guard: &mut RelaxedForeignKeys) -> DbResult<u64> {
    let mut tx = guard.conn()?.begin().await?;

    let lines: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_items")
        .fetch_one(&mut *tx)
        .await?;
    if lines > 0 {
        return Err(DbError::referenced("products", "invoice lines", lines));
    }

    let deleted = sqlx::query("DELETE FROM products")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted)
}
