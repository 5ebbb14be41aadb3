//! # Customer Repository
//!
//! Database operations for customers, including the loyalty balance and the
//! cached tier.

use chrono::Utc;
use sqlx::{Connection, SqlitePool};
use tracing::{debug, info};

use super::bulk::RelaxedForeignKeys;
use super::contains_pattern;
use crate::error::{DbError, DbResult};
use tally_core::validation::validate_search_query;
use tally_core::{Customer, Id, NewCustomer, Tier};

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, customer_type, address, tier, points, created_at, updated_at";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer.
    pub async fn insert(&self, customer: &NewCustomer) -> DbResult<Customer> {
        customer.validate()?;
        self.store(customer).await
    }

    /// Inserts a customer read from a file. Phone and email are kept as
    /// written; see [`NewCustomer::validate_imported`].
    pub async fn insert_imported(&self, customer: &NewCustomer) -> DbResult<Customer> {
        customer.validate_imported()?;
        self.store(customer).await
    }

    async fn store(&self, customer: &NewCustomer) -> DbResult<Customer> {
        let now = Utc::now();

        debug!(name = %customer.name, "Inserting customer");

        let id = sqlx::query(
            r#"
            INSERT INTO customers (
                name, phone, email, customer_type, address, tier, points,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(customer.name.trim())
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.customer_type)
        .bind(&customer.address)
        .bind(customer.tier)
        .bind(customer.points)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.require(id).await
    }

    /// Replaces every editable field of a customer.
    ///
    /// Imported contact details that are left unchanged are accepted as
    /// they are.
    pub async fn update(&self, id: Id, customer: &NewCustomer) -> DbResult<Customer> {
        match self.get_by_id(id).await? {
            Some(current) if current.phone == customer.phone && current.email == customer.email => {
                customer.validate_imported()?
            }
            _ => customer.validate()?,
        }
        debug!(id = id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, phone = ?3, email = ?4, customer_type = ?5,
                address = ?6, tier = ?7, points = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(customer.name.trim())
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.customer_type)
        .bind(&customer.address)
        .bind(customer.tier)
        .bind(customer.points)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id.to_string()));
        }
        self.require(id).await
    }

    /// Stores a new point balance and tier after a sale.
    pub async fn update_loyalty(&self, id: Id, points: i64, tier: Tier) -> DbResult<()> {
        debug!(id = id, points = points, tier = %tier, "Updating loyalty");

        let result = sqlx::query("UPDATE customers SET points = ?2, tier = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(points.max(0))
            .bind(tier)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id.to_string()));
        }
        Ok(())
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: Id) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Finds a customer by exact name (case-insensitive) and phone.
    ///
    /// A `None` phone matches customers without a phone.
    pub async fn find_by_name_phone(&self, name: &str, phone: Option<&str>) -> DbResult<Option<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE name = ?1 COLLATE NOCASE AND COALESCE(phone, '') = ?2 \
             ORDER BY id LIMIT 1"
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(name.trim())
            .bind(phone.map(str::trim).unwrap_or(""))
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Lists all customers ordered by ID.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id");
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    /// Searches customers by name or phone substring.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Customer>> {
        let query = validate_search_query(query)?;
        debug!(query = %query, "Searching customers");

        if query.is_empty() {
            return self.list().await;
        }

        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE name LIKE ?1 ESCAPE '\\' OR phone LIKE ?1 ESCAPE '\\' ORDER BY name, id"
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(contains_pattern(&query))
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    /// Counts customers.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deletes a customer without invoices.
    ///
    /// ## Errors
    /// - `Referenced` when invoices belong to the customer
    /// - `NotFound` when it does not exist
    pub async fn delete(&self, id: Id) -> DbResult<()> {
        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE customer_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if invoices > 0 {
            return Err(DbError::referenced(format!("customer {id}"), "invoices", invoices));
        }

        let result = sqlx::query("DELETE FROM customers WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id.to_string()));
        }

        info!(id = id, "Customer deleted");
        Ok(())
    }

    /// Deletes every customer.
    ///
    /// ## Errors
    /// `Referenced` when any invoice names a customer; nothing is deleted.
    pub async fn purge_all(&self) -> DbResult<u64> {
        let mut guard = RelaxedForeignKeys::acquire(&self.pool).await?;
        let outcome = purge(&mut guard).await;
        let restored = guard.restore().await;
        let deleted = outcome?;
        restored?;

        info!(deleted = deleted, "All customers deleted");
        Ok(deleted)
    }

    async fn require(&self, id: Id) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id.to_string()))
    }
}

async fn purge(guard: &mut RelaxedForeignKeys) -> DbResult<u64> {
    let mut tx = guard.conn()?.begin().await?;

    let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE customer_id IS NOT NULL")
        .fetch_one(&mut *tx)
        .await?;
    if invoices > 0 {
        return Err(DbError::referenced("customers", "invoices", invoices));
    }

    let deleted = sqlx::query("DELETE FROM customers")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn ana() -> NewCustomer {
        NewCustomer {
            name: "Ana".to_string(),
            phone: Some("0912345678".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_defaults_to_regular() {
        let db = db().await;
        let customer = db.customers().insert(&ana()).await.unwrap();
        assert_eq!(customer.tier, Tier::Regular);
        assert_eq!(customer.points, 0);
    }

    #[tokio::test]
    async fn test_find_by_name_phone() {
        let db = db().await;
        let inserted = db.customers().insert(&ana()).await.unwrap();
        let walk_up = db
            .customers()
            .insert(&NewCustomer {
                name: "Bao".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let found = db
            .customers()
            .find_by_name_phone("ana", Some("0912345678"))
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.id), Some(inserted.id));

        let found = db.customers().find_by_name_phone("Bao", None).await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(walk_up.id));

        assert!(db
            .customers()
            .find_by_name_phone("Ana", Some("000000"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_loyalty() {
        let db = db().await;
        let customer = db.customers().insert(&ana()).await.unwrap();
        db.customers()
            .update_loyalty(customer.id, 550, Tier::Gold)
            .await
            .unwrap();

        let reloaded = db.customers().get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.points, 550);
        assert_eq!(reloaded.tier, Tier::Gold);
    }

    #[tokio::test]
    async fn test_search() {
        let db = db().await;
        db.customers().insert(&ana()).await.unwrap();
        assert_eq!(db.customers().search("AN").await.unwrap().len(), 1);
        assert_eq!(db.customers().search("0912").await.unwrap().len(), 1);
        assert!(db.customers().search("zzz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let db = db().await;
        db.customers().insert(&ana()).await.unwrap();
        db.customers()
            .insert(&NewCustomer {
                name: "Shop 100% Organic".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let found = db.customers().search("100%").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Shop 100% Organic");
        assert!(db.customers().search("_").await.unwrap().is_empty());
        assert_eq!(db.customers().search("%").await.unwrap().len(), 1);
    }
}
