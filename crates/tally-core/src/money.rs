//! # Money Module
//!
//! Provides the `Money` and `Percent` types for handling monetary values and
//! rates safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (1/100 of the currency unit)         │
//! │    Money(123450) = 1234.50                                              │
//! │    Percent(825)  = 8.25%   (basis points)                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Rule
//! Every monetary rounding in Tally rounds to 2 decimals (a whole minor unit)
//! **half away from zero**: 0.125 → 0.13, -0.125 → -0.13. There is no second
//! rounding mode anywhere in the codebase; it is
//! `RoundingStrategy::MidpointAwayFromZero` from `rust_decimal`.
//!
//! ## Bounds
//! Stored amounts never exceed [`Money::MAX`] (999 999 999 999.99). At that
//! bound a full line (`MAX × MAX_ITEM_QUANTITY`) still fits in an `i64`;
//! sums over lines go through the `checked_*` methods.
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Money, Percent};
//!
//! let price = Money::from_major(5_000);        // 5000.00
//! let tax = price.percent_of(Percent::from_whole(10));
//! assert_eq!(tax, Money::from_major(500));
//! assert_eq!(price.to_decimal_string(), "5000.00");
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::number;

/// Number of minor units in one major unit.
pub const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units (1/100 of the currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: Intermediate values may go negative (e.g. before the
///   `max(0, ..)` clamp on invoice totals)
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Transparent storage**: Stored as INTEGER minor units in SQLite and as
///   a plain integer in JSON settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Largest amount accepted anywhere: 999 999 999 999.99.
    pub const MAX: Money = Money(99_999_999_999_999);

    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_minor(1099); // 10.99
    /// assert_eq!(price.minor(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(-550).non_negative(), Money::zero());
    /// assert_eq!(Money::from_minor(550).non_negative().minor(), 550);
    /// ```
    #[inline]
    pub const fn non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Whether `|self| <= Money::MAX`.
    #[inline]
    pub const fn is_within_bounds(&self) -> bool {
        self.0.unsigned_abs() <= Money::MAX.0 as u64
    }

    /// Adds, returning `None` on `i64` overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Subtracts, returning `None` on `i64` overflow.
    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Multiplies by a quantity, returning `None` on `i64` overflow.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(299);
    /// assert_eq!(unit_price.checked_mul(3), Some(Money::from_minor(897)));
    /// assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
    /// ```
    #[inline]
    pub const fn checked_mul(self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Returns `percent` of this amount, rounded to a whole minor unit
    /// half away from zero. `None` if the result does not fit.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Money, Percent};
    ///
    /// let subtotal = Money::from_minor(1000);            // 10.00
    /// let tax = subtotal.checked_percent_of(Percent::from_bps(825)); // 8.25%
    /// // 10.00 × 8.25% = 0.825 → 0.83
    /// assert_eq!(tax, Some(Money::from_minor(83)));
    /// ```
    pub fn checked_percent_of(&self, percent: Percent) -> Option<Money> {
        let rate = Decimal::new(i64::from(percent.bps()), 4);
        let product = Decimal::from(self.0).checked_mul(rate)?;
        number::to_scaled(product, 0).map(Money)
    }

    /// Returns `percent` of this amount, rounded half away from zero.
    ///
    /// Saturates at the `i64` range instead of wrapping; for rates up to
    /// 100% the result never exceeds the amount itself.
    pub fn percent_of(&self, percent: Percent) -> Money {
        self.checked_percent_of(percent).unwrap_or(if self.0 < 0 {
            Money(i64::MIN)
        } else {
            Money(i64::MAX)
        })
    }

    /// Formats the amount in invariant notation: `.` decimal separator,
    /// exactly two decimals, no grouping (`1234.50`).
    ///
    /// Transfer files always use this form so they read back identically
    /// on any machine.
    pub fn to_decimal_string(&self) -> String {
        number::format_scaled(self.0, 2)
    }

    /// Parses invariant notation only (`1234.5`, `-3`, `0.125` → 0.13).
    pub fn parse_invariant(text: &str) -> Option<Money> {
        number::parse_invariant(text, 2).map(Money)
    }

    /// Parses invariant notation, falling back to culture-formatted input
    /// (`1.234,50`, `5,000`).
    pub fn parse_lenient(text: &str) -> Option<Money> {
        number::parse_lenient(text, 2).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display uses the invariant decimal form; presentation layers add
/// currency symbols.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_decimal_string())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

// =============================================================================
// Percent Type
// =============================================================================

/// A non-negative percentage in basis points (1 bps = 0.01%).
///
/// ## Why Basis Points?
/// 825 bps = 8.25% exactly, with no float in storage or arithmetic.
/// Negative inputs cannot be represented; constructors from user input
/// clamp them to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(transparent)]
pub struct Percent(u32);

impl Percent {
    /// 100%.
    pub const HUNDRED: Percent = Percent(10_000);

    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Creates a percentage from a whole number of percent (`7` → 7%).
    #[inline]
    pub const fn from_whole(percent: u32) -> Self {
        Percent(percent * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    /// Checks if the percentage is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the rate as a float percentage (for display only).
    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Converts a signed basis-point value, clamping negatives to zero.
    pub fn clamped_bps(bps: i64) -> Self {
        Percent(bps.clamp(0, u32::MAX as i64) as u32)
    }

    /// Parses a percentage leniently (`"10"`, `"8.25"`, `"8,25"`).
    ///
    /// Returns `None` for non-numeric text; negative values clamp to zero.
    pub fn parse_lenient(text: &str) -> Option<Percent> {
        number::parse_lenient(text, 2).map(Percent::clamped_bps)
    }

    /// Formats as an invariant decimal without trailing zeros
    /// (`1000` bps → `10`, `825` → `8.25`, `850` → `8.5`).
    pub fn to_decimal_string(&self) -> String {
        Decimal::new(i64::from(self.0), 2).normalize().to_string()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.to_decimal_string())
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
