//! # Validation Module
//!
//! Input validation utilities for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Command line (clap)                                          │
//! │  └── Type validation (argument parsing)                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (via New*::validate)                             │
//! │  └── Business rule validation, nothing touched yet                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_code, validate_quantity};
//!
//! validate_code("PEN-01").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_DRAFT_LINES, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of names (products, customers, categories, accounts).
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of product codes.
pub const MAX_CODE_LEN: usize = 50;

/// Maximum length of a phone number or email address read from a file.
pub const MAX_CONTACT_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens, underscores and dots only
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_code;
///
/// assert!(validate_code("PEN-01").is_ok());
/// assert!(validate_code("P12").is_ok());
/// assert!(validate_code("").is_err());
/// assert!(validate_code("has space").is_err());
/// ```
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::invalid(
            "code",
            "must contain only letters, numbers, hyphens, underscores and dots",
        ));
    }

    Ok(())
}

/// Validates a display name.
///
/// ## Rules
/// - Must not be blank
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an account username: 3-32 characters, letters, digits,
/// `.`, `_` or `-`.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let len = username.chars().count();
    if username.trim().is_empty() {
        return Err(ValidationError::required("username"));
    }
    if !(3..=32).contains(&len) {
        return Err(ValidationError::OutOfRange {
            field: "username length".to_string(),
            min: 3,
            max: 32,
        });
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::invalid(
            "username",
            "must contain only letters, numbers, dots, underscores and hyphens",
        ));
    }
    Ok(())
}

/// Validates a phone number.
///
/// Digits with optional `+`, spaces, hyphens, dots and parentheses; between
/// 6 and 20 digits. Blank is accepted (phone is optional).
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Ok(());
    }

    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'))
    {
        return Err(ValidationError::invalid("phone", "contains invalid characters"));
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(6..=20).contains(&digits) {
        return Err(ValidationError::invalid("phone", "must have 6 to 20 digits"));
    }

    Ok(())
}

/// Validates an email address shape (`local@domain.tld`). Blank is
/// accepted.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    if email.is_empty() {
        return Ok(());
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ValidationError::invalid("email", "must look like name@example.com"))
    }
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Import Validators
// =============================================================================
//
// Files exported by other systems carry codes like `PEN 01` and phones like
// `0901 234 567 ext. 2`. Rows read from a file keep such values as written;
// only blank or oversized values are refused.

/// Validates a product code read from a file: non-blank after trimming and
/// at most [`MAX_CODE_LEN`] characters.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_imported_code;
///
/// assert!(validate_imported_code(" PEN 01 ").is_ok());
/// assert!(validate_imported_code("A/4 #2").is_ok());
/// assert!(validate_imported_code("  ").is_err());
/// ```
pub fn validate_imported_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("code"));
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    Ok(())
}

/// Validates a phone number or email read from a file. Only the length is
/// checked; blank is accepted.
pub fn validate_imported_contact(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().chars().count() > MAX_CONTACT_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_CONTACT_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock-like count (zero allowed, negative rejected).
pub fn validate_stock(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a monetary amount.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
/// - At most [`Money::MAX`]
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::validation::validate_money;
///
/// assert!(validate_money("price", Money::from_minor(1099)).is_ok());
/// assert!(validate_money("price", Money::zero()).is_ok());
/// assert!(validate_money("price", Money::from_minor(-100)).is_err());
/// assert!(validate_money("price", Money::from_minor(5_000_000_000_000_000_000)).is_err());
/// ```
pub fn validate_money(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    if !amount.is_within_bounds() {
        return Err(ValidationError::amount_too_large(field));
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that another line can be added to a draft.
pub fn validate_draft_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_DRAFT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "invoice lines".to_string(),
            min: 0,
            max: MAX_DRAFT_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
