//! # Schema
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary and
//! applied by [`Database::new`](crate::Database::new) before any repository
//! is handed out.
//!
//! ```text
//! Database::new ──► run_migrations ──► _sqlx_migrations
//!                                       │
//!                                       ├── 001_initial_schema.sql  applied once
//!                                       └── NNN_*.sql               applied in order
//! ```
//!
//! Applied files are checksummed. Change the schema by adding
//! `NNN_description.sql`; editing an applied file makes every existing store
//! refuse to open.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every schema file the database has not seen yet. A store that is
/// already current is left untouched.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    info!(files = MIGRATOR.migrations.len(), "Schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn applied(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_every_schema_file_is_applied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(!MIGRATOR.migrations.is_empty());
        assert_eq!(applied(db.pool()).await as usize, MIGRATOR.migrations.len());
    }

    #[tokio::test]
    async fn test_rerun_applies_nothing_new() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        assert_eq!(applied(db.pool()).await as usize, MIGRATOR.migrations.len());
    }
}
