//! # Application Error Type
//!
//! Unified error type for `tally` commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tally POS                              │
//! │                                                                         │
//! │  tally checkout --item PEN-01:2                                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Command Function                                                │  │
//! │  │  AppResult<T>                                                    │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Database Error? ─── DbError::Referenced {..} ─────┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  Business Error? ─── CoreError::InsufficientStock ─ AppError ───►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  main.rs prints "error[INSUFFICIENT_STOCK]: ..." and exits with        │
//! │  ErrorCode::exit_code()                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tally_core::{CoreError, ValidationError};
use tally_db::DbError;

use crate::state::SettingsError;
use crate::transfer::ImportError;

/// Error returned from every command.
///
/// ## Serialization
/// With `--json` this is what gets printed when a command fails:
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Product not found: PEN-01"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes, one per class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Entity not found
    NotFound,

    /// Input validation failed; nothing changed
    ValidationError,

    /// Delete refused because other rows depend on the entity
    Referenced,

    /// Not enough stock for the requested quantity
    InsufficientStock,

    /// Business rule violated (empty invoice, bad tier policy...)
    BusinessLogic,

    /// Database operation failed
    DatabaseError,

    /// Settings file unreadable or unwritable
    SettingsError,

    /// CSV file unreadable or missing a required column
    ImportError,

    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Process exit status for this class of failure.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorCode::ValidationError | ErrorCode::NotFound => 2,
            ErrorCode::Referenced | ErrorCode::InsufficientStock | ErrorCode::BusinessLogic => 3,
            ErrorCode::ImportError | ErrorCode::SettingsError => 4,
            ErrorCode::DatabaseError | ErrorCode::Internal => 1,
        }
    }
}

impl AppError {
    /// Creates a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        AppError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        AppError::new(ErrorCode::Internal, message)
    }
}

/// Converts database errors.
impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => AppError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => AppError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::Referenced { .. } => AppError::new(ErrorCode::Referenced, err.to_string()),
            DbError::Validation(e) => AppError::validation(e.to_string()),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Migration failed: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                AppError::new(ErrorCode::DatabaseError, format!("Database operation failed: {}", e))
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                AppError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::PoolExhausted => AppError::new(ErrorCode::DatabaseError, "Database pool exhausted"),
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                AppError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors.
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(code) => AppError::not_found("Product", &code),
            CoreError::InsufficientStock { .. } => AppError::new(ErrorCode::InsufficientStock, err.to_string()),
            CoreError::QuantityTooLarge { .. } => AppError::validation(err.to_string()),
            CoreError::Validation(e) => AppError::validation(e.to_string()),
            CoreError::DraftTooLarge { .. }
            | CoreError::LineNotFound(_)
            | CoreError::EmptyInvoice
            | CoreError::InvalidTierPolicy(_) => AppError::new(ErrorCode::BusinessLogic, err.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::validation(err.to_string())
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        AppError::new(ErrorCode::SettingsError, err.to_string())
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Db(e) => AppError::from(e),
            other => AppError::new(ErrorCode::ImportError, other.to_string()),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Result type for commands.
pub type AppResult<T> = Result<T, AppError>;
