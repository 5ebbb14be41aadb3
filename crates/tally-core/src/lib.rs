//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate is the **heart** of Tally POS. It contains the invoice pricing
//! engine, loyalty tier rules and CSV record mapping as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tally (command line)                         │   │
//! │  │    checkout, import/export, report, settings                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  types  │ │  money  │ │ pricing │ │  tier   │ │  codec  │  │   │
//! │  │   │ Product │ │  Money  │ │ Totals  │ │ Policy  │ │ records │  │   │
//! │  │   │ Invoice │ │ Percent │ │  Draft  │ │ Accrual │ │ headers │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Invoice, etc.)
//! - [`money`] - Money and Percent with integer arithmetic
//! - [`number`] - Invariant and culture-tolerant decimal parsing
//! - [`tier`] - Loyalty tiers, tier policy and point accrual
//! - [`pricing`] - Invoice total calculator
//! - [`draft`] - In-progress invoice with line merging and stock checks
//! - [`codec`] - Header-driven CSV record mapping for transfer files
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::{Money, Percent};
//! use tally_core::pricing::{calculate, Discount, LineItem};
//!
//! let lines = [LineItem::new(1, 2, Money::from_major(50_000))];
//! let totals = calculate(
//!     &lines,
//!     Percent::from_whole(10),
//!     Discount::None,
//!     Percent::from_whole(7),
//!     Money::zero(),
//! )
//! .unwrap();
//!
//! assert_eq!(totals.tax_amount, Money::from_major(10_000));
//! assert_eq!(totals.total, Money::from_major(103_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod draft;
pub mod error;
pub mod money;
pub mod number;
pub mod pricing;
pub mod tier;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use draft::{DraftLine, InvoiceDraft};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use pricing::{Discount, InvoiceTotals, LineItem};
pub use tier::{Accrual, Tier, TierPolicy, TierRule};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed on a single invoice draft.
pub const MAX_DRAFT_LINES: usize = 200;

/// Maximum quantity of a single product on one invoice.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 10000 instead of 100).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
