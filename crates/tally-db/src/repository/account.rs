//! # Account Repository
//!
//! Employee accounts. Every invoice records the account that rang it up,
//! so accounts with invoices cannot be deleted, only deactivated.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use tally_core::{Account, Id, NewAccount};

const ACCOUNT_COLUMNS: &str = "id, username, full_name, role, is_active, created_at, updated_at";

/// Repository for employee account operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Creates a new AccountRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Inserts an active account.
    ///
    /// ## Errors
    /// `UniqueViolation` when the username is taken (any case).
    pub async fn insert(&self, account: &NewAccount) -> DbResult<Account> {
        account.validate()?;
        let now = Utc::now();

        debug!(username = %account.username, role = %account.role, "Inserting account");

        let id = sqlx::query(
            r#"
            INSERT INTO accounts (username, full_name, role, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            "#,
        )
        .bind(&account.username)
        .bind(account.full_name.trim())
        .bind(account.role)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &account.username),
            other => other,
        })?
        .last_insert_rowid();

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Account", id.to_string()))
    }

    /// Gets an account by ID.
    pub async fn get_by_id(&self, id: Id) -> DbResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Gets an account by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?1 COLLATE NOCASE");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// The active account with the lowest id, used when a caller does not
    /// name one (imports, first checkout).
    pub async fn default_employee(&self) -> DbResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_active = 1 ORDER BY id LIMIT 1");
        let account = sqlx::query_as::<_, Account>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Lists all accounts ordered by ID.
    pub async fn list(&self) -> DbResult<Vec<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id");
        let accounts = sqlx::query_as::<_, Account>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    /// Activates or deactivates an account.
    pub async fn set_active(&self, id: Id, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE accounts SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id.to_string()));
        }
        info!(id = id, active = active, "Account status changed");
        Ok(())
    }

    /// Counts accounts.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Deletes an account that never rang up an invoice.
    ///
    /// ## Errors
    /// - `Referenced` when invoices name the account
    /// - `NotFound` when it does not exist
    pub async fn delete(&self, id: Id) -> DbResult<()> {
        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE employee_id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if invoices > 0 {
            return Err(DbError::referenced(format!("account {id}"), "invoices", invoices));
        }

        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id.to_string()));
        }

        info!(id = id, "Account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::Role;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn admin() -> NewAccount {
        NewAccount {
            username: "admin".to_string(),
            full_name: "Store Admin".to_string(),
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = db().await;
        let account = db.accounts().insert(&admin()).await.unwrap();
        assert!(account.is_active);
        assert_eq!(account.role, Role::Admin);

        let found = db.accounts().get_by_username("ADMIN").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let db = db().await;
        db.accounts().insert(&admin()).await.unwrap();
        assert!(matches!(
            db.accounts().insert(&admin()).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_default_employee_skips_inactive() {
        let db = db().await;
        let first = db.accounts().insert(&admin()).await.unwrap();
        let second = db
            .accounts()
            .insert(&NewAccount {
                username: "cashier1".to_string(),
                full_name: "Cashier One".to_string(),
                role: Role::Cashier,
            })
            .await
            .unwrap();

        assert_eq!(db.accounts().default_employee().await.unwrap().unwrap().id, first.id);

        db.accounts().set_active(first.id, false).await.unwrap();
        assert_eq!(db.accounts().default_employee().await.unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_delete_unused_account() {
        let db = db().await;
        let account = db.accounts().insert(&admin()).await.unwrap();
        db.accounts().delete(account.id).await.unwrap();
        assert_eq!(db.accounts().count().await.unwrap(), 0);
    }
}
