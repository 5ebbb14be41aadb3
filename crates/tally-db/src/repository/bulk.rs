//! # Bulk Deletion Support
//!
//! Bulk purges run on one dedicated connection with SQLite foreign-key
//! enforcement switched off, and always switch it back on before that
//! connection can serve anyone else.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pool.acquire()                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PRAGMA foreign_keys = OFF   (no-op inside a transaction, so first)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN … DELETE … COMMIT     (success or error)                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PRAGMA foreign_keys = ON ──── fails? ──► connection closed, not       │
//! │       │                                   returned to the pool         │
//! │       ▼                                                                 │
//! │  connection back in pool with enforcement on                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let mut guard = RelaxedForeignKeys::acquire(&pool).await?;
//! let outcome = purge(guard.conn()).await;
//! let restored = guard.restore().await;
//! let deleted = outcome?;
//! restored?;
//! ```

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// A pooled connection with foreign-key enforcement off.
///
/// Call [`RelaxedForeignKeys::restore`] when done. If the guard is dropped
/// without it, the connection is detached from the pool and closed rather
/// than handed out with enforcement still off.
pub(crate) struct RelaxedForeignKeys {
    conn: Option<PoolConnection<Sqlite>>,
}

impl RelaxedForeignKeys {
    /// Checks out a connection and turns enforcement off on it.
    pub(crate) async fn acquire(pool: &SqlitePool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;
        debug!("Foreign key enforcement relaxed for bulk operation");
        Ok(RelaxedForeignKeys { conn: Some(conn) })
    }

    /// The dedicated connection.
    pub(crate) fn conn(&mut self) -> DbResult<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| DbError::Internal("bulk connection already released".to_string()))
    }

    /// Turns enforcement back on and releases the connection to the pool.
    ///
    /// When the pragma itself fails, the connection is closed instead.
    pub(crate) async fn restore(mut self) -> DbResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        match sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                debug!("Foreign key enforcement restored");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Could not restore foreign keys, closing connection");
                if let Err(close_err) = conn.close().await {
                    warn!(error = %close_err, "Closing bulk connection failed");
                }
                Err(err.into())
            }
        }
    }
}

impl Drop for RelaxedForeignKeys {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Bulk connection dropped without restoring foreign keys, detaching");
            drop(conn.detach());
        }
    }
}
