//! # Invoice Total Calculator
//!
//! Pure calculation of invoice totals from lines, tax, manual discount and
//! the customer's tier discount.
//!
//! ## Calculation Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. subtotal        = Σ quantity × unit_price                           │
//! │  2. manual_discount = Percent(p) → round(subtotal × p)                 │
//! │                       Amount(a)  → a                                   │
//! │  3. tier_discount   = round(subtotal × tier_percent)                   │
//! │  4. tax_amount      = round(subtotal × tax_percent)                    │
//! │  5. total           = max(0, subtotal + tax − manual − tier)           │
//! │  6. change_due      = max(0, paid − total)                             │
//! │                                                                         │
//! │  Tax and every discount are computed on the SUBTOTAL, never on each    │
//! │  other. Rounding is half away from zero (see Money::percent_of).       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step is checked: a line, subtotal or total that leaves the `i64`
//! range, or an input beyond [`Money::MAX`], is an `AmountTooLarge` error
//! instead of a wrapped value.
//!
//! ## Worked Example
//! subtotal 100000.00, tax 10%, Gold customer (7%), no manual discount:
//! tax 10000.00, tier discount 7000.00, total 103000.00.

use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};
use crate::money::{Money, Percent};
use crate::types::Id;
use crate::validation::ValidationResult;

// =============================================================================
// Inputs
// =============================================================================

/// A priced line fed to the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Id,
    pub quantity: i64,
    pub unit_price: Money,
}

impl LineItem {
    pub const fn new(product_id: Id, quantity: i64, unit_price: Money) -> Self {
        LineItem {
            product_id,
            quantity,
            unit_price,
        }
    }

    /// `unit_price × quantity`.
    #[inline]
    pub fn line_total(&self) -> ValidationResult<Money> {
        line_total(self.unit_price, self.quantity)
    }
}

/// Manual discount entered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    /// Fixed amount off. Negative amounts count as zero.
    Amount(Money),
    /// Percentage of the subtotal.
    Percent(Percent),
}

impl Discount {
    /// Builds a discount from operator text, treating it as a percentage
    /// or an amount. Unparsable or negative text yields a zero discount.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Money, Percent};
    /// use tally_core::pricing::Discount;
    ///
    /// assert_eq!(Discount::parse("10", true), Discount::Percent(Percent::from_whole(10)));
    /// assert_eq!(Discount::parse("2,500", false), Discount::Amount(Money::from_major(2_500)));
    /// assert_eq!(Discount::parse("abc", false), Discount::None);
    /// ```
    pub fn parse(text: &str, as_percent: bool) -> Discount {
        if as_percent {
            let percent = parse_percent_non_negative(text);
            if percent.is_zero() {
                Discount::None
            } else {
                Discount::Percent(percent)
            }
        } else {
            let amount = parse_non_negative(text);
            if amount.is_zero() {
                Discount::None
            } else {
                Discount::Amount(amount)
            }
        }
    }

    /// Amount this discount takes off `subtotal`. A percentage above 100%
    /// saturates rather than wrapping.
    pub fn amount_on(&self, subtotal: Money) -> Money {
        match self {
            Discount::None => Money::zero(),
            Discount::Amount(amount) => amount.non_negative(),
            Discount::Percent(percent) => subtotal.percent_of(*percent),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Result of [`calculate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub tax_percent: Percent,
    pub tax_amount: Money,
    pub manual_discount: Money,
    pub tier_discount: Money,
    pub total: Money,
    pub paid: Money,
    pub change_due: Money,
}

impl InvoiceTotals {
    /// Combined manual and tier discount, as stored on the invoice.
    pub fn discount(&self) -> Money {
        self.manual_discount + self.tier_discount
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Computes invoice totals.
///
/// ## Arguments
/// * `lines` - Priced lines (quantity × unit price each)
/// * `tax` - Tax rate applied to the subtotal
/// * `manual` - Operator-entered discount
/// * `tier_discount` - Discount percentage of the customer's tier
///   (zero for walk-in sales)
/// * `paid` - Amount tendered; negative counts as zero
///
/// ## Errors
/// - `Validation(AmountTooLarge)` when the subtotal, discount, paid amount
///   or total is beyond [`Money::MAX`]
pub fn calculate(
    lines: &[LineItem],
    tax: Percent,
    manual: Discount,
    tier_discount: Percent,
    paid: Money,
) -> CoreResult<InvoiceTotals> {
    let mut subtotal = Money::zero();
    for line in lines {
        subtotal = subtotal
            .checked_add(line.line_total()?)
            .ok_or_else(|| ValidationError::amount_too_large("subtotal"))?;
    }
    bounded("subtotal", subtotal)?;

    let manual_discount = bounded("discount", manual.amount_on(subtotal))?;
    let tier_discount = bounded("discount", subtotal.percent_of(tier_discount))?;
    let tax_amount = bounded("tax", subtotal.percent_of(tax))?;
    let paid = bounded("paid", paid.non_negative())?;

    // Each operand is within Money::MAX, so none of these can overflow
    let total = bounded("total", (subtotal + tax_amount - manual_discount - tier_discount).non_negative())?;
    let change_due = (paid - total).non_negative();

    Ok(InvoiceTotals {
        subtotal,
        tax_percent: tax,
        tax_amount,
        manual_discount,
        tier_discount,
        total,
        paid,
        change_due,
    })
}

/// `unit_price × quantity`, or `AmountTooLarge` on overflow.
pub fn line_total(unit_price: Money, quantity: i64) -> ValidationResult<Money> {
    unit_price
        .checked_mul(quantity)
        .ok_or_else(|| ValidationError::amount_too_large("line total"))
}

fn bounded(field: &str, amount: Money) -> ValidationResult<Money> {
    if amount.is_within_bounds() {
        Ok(amount)
    } else {
        Err(ValidationError::amount_too_large(field))
    }
}

/// Parses operator-entered money. Non-numeric text and negatives become zero.
pub fn parse_non_negative(text: &str) -> Money {
    Money::parse_lenient(text)
        .map(Money::non_negative)
        .unwrap_or_default()
}

/// Parses an operator-entered percentage. Non-numeric text and negatives
/// become zero.
pub fn parse_percent_non_negative(text: &str) -> Percent {
    Percent::parse_lenient(text).unwrap_or_default()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lines() -> Vec<LineItem> {
        vec![LineItem::new(1, 2, Money::from_major(50_000))]
    }

    #[test]
    fn test_gold_customer_example() {
        let totals = calculate(
            &lines(),
            Percent::from_whole(10),
            Discount::None,
            Percent::from_whole(7),
            Money::zero(),
        )
        .unwrap();

        assert_eq!(totals.subtotal, Money::from_major(100_000));
        assert_eq!(totals.tax_amount, Money::from_major(10_000));
        assert_eq!(totals.tier_discount, Money::from_major(7_000));
        assert_eq!(totals.discount(), Money::from_major(7_000));
        assert_eq!(totals.total, Money::from_major(103_000));
    }

    #[test]
    fn test_manual_and_tier_discount_both_on_subtotal() {
        let totals = calculate(
            &lines(),
            Percent::zero(),
            Discount::Percent(Percent::from_whole(5)),
            Percent::from_whole(3),
            Money::zero(),
        )
        .unwrap();
        assert_eq!(totals.manual_discount, Money::from_major(5_000));
        assert_eq!(totals.tier_discount, Money::from_major(3_000));
        assert_eq!(totals.total, Money::from_major(92_000));
    }

    #[test]
    fn test_total_never_negative() {
        let totals = calculate(
            &[LineItem::new(1, 1, Money::from_major(10))],
            Percent::zero(),
            Discount::Amount(Money::from_major(50)),
            Percent::zero(),
            Money::zero(),
        )
        .unwrap();
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_change_due() {
        let totals = calculate(
            &[LineItem::new(1, 3, Money::from_major(100))],
            Percent::zero(),
            Discount::None,
            Percent::zero(),
            Money::from_major(500),
        )
        .unwrap();
        assert_eq!(totals.total, Money::from_major(300));
        assert_eq!(totals.change_due, Money::from_major(200));

        let short = calculate(
            &[LineItem::new(1, 3, Money::from_major(100))],
            Percent::zero(),
            Discount::None,
            Percent::zero(),
            Money::from_major(100),
        )
        .unwrap();
        assert_eq!(short.change_due, Money::zero());
    }

    #[test]
    fn test_negative_amount_discount_counts_as_zero() {
        let discount = Discount::Amount(Money::from_minor(-500));
        assert_eq!(discount.amount_on(Money::from_major(10)), Money::zero());
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 10.50 × 5% = 0.525 → 0.53
        let totals = calculate(
            &[LineItem::new(1, 1, Money::from_minor(1_050))],
            Percent::from_whole(5),
            Discount::None,
            Percent::zero(),
            Money::zero(),
        )
        .unwrap();
        assert_eq!(totals.tax_amount, Money::from_minor(53));
    }

    #[test]
    fn test_oversized_line_is_an_error_not_a_wrap() {
        let price = Money::from_minor(5_000_000_000_000_000_000);
        let err = calculate(
            &[LineItem::new(1, 2, price)],
            Percent::zero(),
            Discount::None,
            Percent::zero(),
            Money::zero(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::CoreError::Validation(ValidationError::AmountTooLarge { .. })
        ));
    }

    #[test]
    fn test_subtotal_beyond_max_is_rejected() {
        let lines = vec![LineItem::new(1, 2, Money::MAX), LineItem::new(2, 1, Money::MAX)];
        assert!(calculate(&lines, Percent::zero(), Discount::None, Percent::zero(), Money::zero()).is_err());

        let one = calculate(
            &[LineItem::new(1, 1, Money::MAX)],
            Percent::zero(),
            Discount::None,
            Percent::zero(),
            Money::zero(),
        )
        .unwrap();
        assert_eq!(one.total, Money::MAX);
    }

    #[test]
    fn test_parse_non_negative() {
        assert_eq!(parse_non_negative("1500.5"), Money::from_minor(150_050));
        assert_eq!(parse_non_negative("-20"), Money::zero());
        assert_eq!(parse_non_negative("twenty"), Money::zero());
        assert_eq!(parse_percent_non_negative("-3"), Percent::zero());
    }

    proptest! {
        #[test]
        fn totals_invariant_holds(
            items in proptest::collection::vec((1i64..100, 0i64..10_000_000), 0..10),
            tax_bps in 0u32..=10_000,
            tier_bps in 0u32..=10_000,
            manual in 0i64..100_000_000,
            as_percent in any::<bool>(),
        ) {
            let lines: Vec<LineItem> = items
                .iter()
                .enumerate()
                .map(|(i, (qty, price))| LineItem::new(i as Id, *qty, Money::from_minor(*price)))
                .collect();
            let discount = if as_percent {
                Discount::Percent(Percent::from_bps((manual % 10_001) as u32))
            } else {
                Discount::Amount(Money::from_minor(manual))
            };

            let totals = calculate(
                &lines,
                Percent::from_bps(tax_bps),
                discount,
                Percent::from_bps(tier_bps),
                Money::zero(),
            )
            .unwrap();

            prop_assert_eq!(totals.tax_amount, totals.subtotal.percent_of(Percent::from_bps(tax_bps)));
            prop_assert_eq!(
                totals.total,
                (totals.subtotal + totals.tax_amount - totals.discount()).non_negative()
            );
            prop_assert!(!totals.total.is_negative());
        }
    }
}
