//! # Database Handle
//!
//! Opens the store's SQLite file (or a private in-memory database for
//! tests), applies the embedded schema and hands out repositories.
//!
//! ## Connection Settings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  journal_mode = WAL       reports read while an invoice is being saved │
//! │  synchronous  = NORMAL    a crash may lose the last commit, never more │
//! │  foreign_keys = ON        on every connection; bulk purges switch it   │
//! │                           off on one dedicated connection (bulk.rs)    │
//! │  busy_timeout = 5s        a second `tally` process waits for the lock  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pool Size
//! A `tally` invocation runs one command and exits, and every command awaits
//! its queries one after another, so a file database gets a small pool. An
//! in-memory database gets exactly one connection: each new `:memory:`
//! connection would open a separate, empty database.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::account::AccountRepository;
use crate::repository::category::CategoryRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::product::ProductRepository;

const MEMORY: &str = ":memory:";

/// Connections kept for a file database.
const FILE_POOL_SIZE: u32 = 4;

/// How long a statement waits on another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Configuration
// =============================================================================

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// SQLite file, created with its parent directory when missing.
    /// `:memory:` for a throwaway database.
    pub database_path: PathBuf,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
        }
    }

    /// A private database that disappears with the handle. Used by tests.
    pub fn in_memory() -> Self {
        DbConfig::new(MEMORY)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(MEMORY)
    }

    fn pool_size(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            FILE_POOL_SIZE
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to an open, migrated database.
///
/// Cloning shares the pool; every repository holds its own clone of it.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./tally.db")).await?;
///
/// let pen = db.products().get_by_code("PEN-01").await?;
/// let id = db.invoices().save_invoice(&new_invoice).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) and migrates the database.
    ///
    /// ## Errors
    /// - `ConnectionFailed` when the file cannot be opened or created
    /// - `MigrationFailed` when the embedded schema cannot be applied
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        if !config.is_in_memory() {
            if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::ConnectionFailed(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", config.database_path.display()))
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size())
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(connections = config.pool_size(), "Pool ready");

        migrations::run_migrations(&pool).await?;
        Ok(Database { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    /// Employee accounts.
    pub fn accounts(&self) -> AccountRepository {
        AccountRepository::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    /// Closes every connection so the WAL is checkpointed before the
    /// process exits. Repository calls fail afterwards.
    pub async fn close(&self) {
        debug!("Closing database");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert_eq!(db.products().count().await.unwrap(), 0);
        assert_eq!(db.customers().count().await.unwrap(), 0);
        assert!(db.invoices().list(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_database_and_parent_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("tally.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        db.categories()
            .insert(&tally_core::NewCategory {
                name: "Paper".to_string(),
                description: None,
            })
            .await
            .unwrap();
        db.close().await;

        // Reopening keeps the data and does not re-run the schema
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert_eq!(db.categories().list().await.unwrap().len(), 1);
    }

    #[test]
    fn test_pool_size() {
        assert!(DbConfig::in_memory().is_in_memory());
        assert_eq!(DbConfig::in_memory().pool_size(), 1);
        assert_eq!(DbConfig::new("tally.db").pool_size(), FILE_POOL_SIZE);
    }
}
