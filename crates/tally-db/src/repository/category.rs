//! # Category Repository
//!
//! Database operations for product categories. Names are unique,
//! case-insensitively.

use chrono::Utc;
use sqlx::{Connection, SqlitePool};
use tracing::{debug, info};

use super::bulk::RelaxedForeignKeys;
use crate::error::{DbError, DbResult};
use tally_core::{Category, Id, NewCategory};

const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Inserts a category.
    ///
    /// ## Errors
    /// `UniqueViolation` when the name is taken (any case).
    pub async fn insert(&self, category: &NewCategory) -> DbResult<Category> {
        category.validate()?;
        let name = category.name.trim();
        let now = Utc::now();

        debug!(name = %name, "Inserting category");

        let id = sqlx::query(
            "INSERT INTO categories (name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        )
        .bind(name)
        .bind(&category.description)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, name),
            other => other,
        })?
        .last_insert_rowid();

        self.require(id).await
    }

    /// Renames a category or changes its description.
    pub async fn update(&self, id: Id, category: &NewCategory) -> DbResult<Category> {
        category.validate()?;
        debug!(id = id, name = %category.name, "Updating category");

        let result = sqlx::query(
            "UPDATE categories SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(category.name.trim())
        .bind(&category.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id.to_string()));
        }
        self.require(id).await
    }

    /// Gets a category by ID.
    pub async fn get_by_id(&self, id: Id) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    /// Gets a category by name, ignoring case and surrounding spaces.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = ?1 COLLATE NOCASE");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    /// Returns the category with this name, creating it if needed.
    pub async fn get_or_create(&self, name: &str) -> DbResult<Category> {
        if let Some(existing) = self.get_by_name(name).await? {
            return Ok(existing);
        }
        self.insert(&NewCategory {
            name: name.trim().to_string(),
            description: None,
        })
        .await
    }

    /// Lists all categories ordered by ID.
    pub async fn list(&self) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id");
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    /// Counts categories.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deletes a category that no product uses.
    ///
    /// ## Errors
    /// - `Referenced` when products still belong to it
    /// - `NotFound` when it does not exist
    pub async fn delete(&self, id: Id) -> DbResult<()> {
        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if products > 0 {
            return Err(DbError::referenced(format!("category {id}"), "products", products));
        }

        let result = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id.to_string()));
        }

        info!(id = id, "Category deleted");
        Ok(())
    }

    /// Deletes every category.
    ///
    /// ## Errors
    /// `Referenced` when any product is still categorized; nothing is
    /// deleted in that case.
    pub async fn purge_all(&self) -> DbResult<u64> {
        let mut guard = RelaxedForeignKeys::acquire(&self.pool).await?;
        let outcome = purge(&mut guard).await;
        let restored = guard.restore().await;
        let deleted = outcome?;
        restored?;

        info!(deleted = deleted, "All categories deleted");
        Ok(deleted)
    }

    async fn require(&self, id: Id) -> DbResult<Category> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id.to_string()))
    }
}

async fn purge(guard: &mut RelaxedForeignKeys) -> DbResult<u64> {
    let mut tx = guard.conn()?.begin().await?;

    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id IS NOT NULL")
        .fetch_one(&mut *tx)
        .await?;
    if products > 0 {
        return Err(DbError::referenced("categories", "products", products));
    }

    let deleted = sqlx::query("DELETE FROM categories")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted)
}
