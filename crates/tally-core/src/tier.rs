//! # Loyalty Tiers
//!
//! Customers collect points on every sale and are classified into a tier
//! that grants a percentage discount on future invoices.
//!
//! ## Tier Ladder
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  points ≥ platinum.min_points  →  Platinum   (default 1000 pts, 10%)   │
//! │  points ≥ gold.min_points      →  Gold       (default  500 pts,  7%)   │
//! │  points ≥ silver.min_points    →  Silver     (default  100 pts,  3%)   │
//! │  otherwise                     →  Regular    (default    0 pts,  0%)   │
//! │                                                                         │
//! │  Evaluated top-down: the first threshold the points reach wins.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cached Classification
//! The tier stored on a customer is the result of [`TierPolicy::tier_for`]
//! at the time of the last accrual. Editing thresholds does not re-classify
//! existing customers; the next accrual does.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, Percent};

// =============================================================================
// Tier
// =============================================================================

/// Loyalty bracket of a customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "PascalCase"))]
pub enum Tier {
    #[default]
    Regular,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Tier; 4] = [Tier::Regular, Tier::Silver, Tier::Gold, Tier::Platinum];

    /// Canonical name as stored and exported.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Tier::Regular => "Regular",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
        }
    }

    /// Parses legacy or hand-edited data, treating anything unrecognized
    /// (including blank) as Regular.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::tier::Tier;
    ///
    /// assert_eq!(Tier::parse_lenient(" gold "), Tier::Gold);
    /// assert_eq!(Tier::parse_lenient("Diamond"), Tier::Regular);
    /// ```
    pub fn parse_lenient(text: &str) -> Tier {
        text.parse().unwrap_or(Tier::Regular)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Strict, case-insensitive parse. Unknown names are rejected.
impl FromStr for Tier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "tier".to_string(),
                allowed: Tier::ALL.iter().map(|t| t.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Tier Policy
// =============================================================================

/// Threshold and discount for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    /// Minimum points a customer needs to reach this tier.
    pub min_points: i64,

    /// Discount granted on the invoice subtotal.
    #[serde(rename = "discount_bps")]
    pub discount: Percent,
}

impl TierRule {
    pub const fn new(min_points: i64, discount: Percent) -> Self {
        TierRule {
            min_points,
            discount,
        }
    }
}

/// Thresholds and discounts for every tier.
///
/// Loaded from the settings file on every use, so edits apply to the next
/// invoice without a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    pub regular: TierRule,
    pub silver: TierRule,
    pub gold: TierRule,
    pub platinum: TierRule,
}

impl Default for TierPolicy {
    fn default() -> Self {
        TierPolicy {
            regular: TierRule::new(0, Percent::zero()),
            silver: TierRule::new(100, Percent::from_whole(3)),
            gold: TierRule::new(500, Percent::from_whole(7)),
            platinum: TierRule::new(1000, Percent::from_whole(10)),
        }
    }
}

impl TierPolicy {
    /// Rule for a tier.
    pub fn rule(&self, tier: Tier) -> &TierRule {
        match tier {
            Tier::Regular => &self.regular,
            Tier::Silver => &self.silver,
            Tier::Gold => &self.gold,
            Tier::Platinum => &self.platinum,
        }
    }

    /// Mutable rule for a tier (used by the settings editor).
    pub fn rule_mut(&mut self, tier: Tier) -> &mut TierRule {
        match tier {
            Tier::Regular => &mut self.regular,
            Tier::Silver => &mut self.silver,
            Tier::Gold => &mut self.gold,
            Tier::Platinum => &mut self.platinum,
        }
    }

    /// Discount percentage granted to a tier.
    pub fn discount_for(&self, tier: Tier) -> Percent {
        self.rule(tier).discount
    }

    /// Classifies a point balance.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::tier::{Tier, TierPolicy};
    ///
    /// let policy = TierPolicy::default();
    /// assert_eq!(policy.tier_for(0), Tier::Regular);
    /// assert_eq!(policy.tier_for(500), Tier::Gold);
    /// assert_eq!(policy.tier_for(999), Tier::Gold);
    /// assert_eq!(policy.tier_for(1000), Tier::Platinum);
    /// ```
    pub fn tier_for(&self, points: i64) -> Tier {
        [Tier::Platinum, Tier::Gold, Tier::Silver]
            .into_iter()
            .find(|tier| points >= self.rule(*tier).min_points)
            .unwrap_or(Tier::Regular)
    }

    /// Checks that thresholds and discounts never decrease going up the
    /// ladder, that no threshold is negative and no discount exceeds 100%.
    pub fn validate(&self) -> CoreResult<()> {
        for tier in Tier::ALL {
            let rule = self.rule(tier);
            if rule.min_points < 0 {
                return Err(CoreError::InvalidTierPolicy(format!(
                    "{} threshold must not be negative",
                    tier
                )));
            }
            if rule.discount > Percent::HUNDRED {
                return Err(CoreError::InvalidTierPolicy(format!(
                    "{} discount exceeds 100%",
                    tier
                )));
            }
        }

        for pair in Tier::ALL.windows(2) {
            let (lower, upper) = (self.rule(pair[0]), self.rule(pair[1]));
            if upper.min_points < lower.min_points {
                return Err(CoreError::InvalidTierPolicy(format!(
                    "{} threshold ({}) is below {} threshold ({})",
                    pair[1], upper.min_points, pair[0], lower.min_points
                )));
            }
            if upper.discount < lower.discount {
                return Err(CoreError::InvalidTierPolicy(format!(
                    "{} discount ({}) is below {} discount ({})",
                    pair[1], upper.discount, pair[0], lower.discount
                )));
            }
        }

        Ok(())
    }

    /// Applies a sale to a point balance.
    ///
    /// ## Returns
    /// The points earned and the resulting balance and tier.
    pub fn accrue(&self, current_points: i64, total: Money, spend_per_point: Money) -> Accrual {
        let awarded = points_for(total, spend_per_point);
        let points = current_points.max(0) + awarded;
        Accrual {
            awarded,
            points,
            tier: self.tier_for(points),
        }
    }
}

/// Outcome of crediting a sale to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accrual {
    /// Points earned by this sale.
    pub awarded: i64,
    /// New balance.
    pub points: i64,
    /// Tier for the new balance.
    pub tier: Tier,
}

/// Points earned for an invoice total: one point per whole
/// `spend_per_point` spent, rounded down.
///
/// A zero or negative `spend_per_point` disables accrual.
pub fn points_for(total: Money, spend_per_point: Money) -> i64 {
    if !spend_per_point.is_positive() || !total.is_positive() {
        return 0;
    }
    total.minor() / spend_per_point.minor()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tier_parse_strict() {
        assert_eq!("Silver".parse::<Tier>().unwrap(), Tier::Silver);
        assert_eq!("PLATINUM".parse::<Tier>().unwrap(), Tier::Platinum);
        assert!("Diamond".parse::<Tier>().is_err());
        assert!("".parse::<Tier>().is_err());
    }

    #[test]
    fn test_default_tier_is_regular() {
        assert_eq!(Tier::default(), Tier::Regular);
        assert_eq!(Tier::default(), Tier::ALL[0]);
    }

    #[test]
    fn test_unknown_tier_gets_regular_discount() {
        let policy = TierPolicy::default();
        let tier = Tier::parse_lenient("VIP");
        assert_eq!(policy.discount_for(tier), Percent::zero());
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert!(TierPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_decreasing_thresholds() {
        let mut policy = TierPolicy::default();
        policy.gold.min_points = 50;
        assert!(matches!(
            policy.validate(),
            Err(CoreError::InvalidTierPolicy(_))
        ));
    }

    #[test]
    fn test_validate_rejects_decreasing_discounts() {
        let mut policy = TierPolicy::default();
        policy.platinum.discount = Percent::from_whole(5);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_points_for_rounds_down() {
        let spend = Money::from_major(1_000);
        assert_eq!(points_for(Money::from_major(103_000), spend), 103);
        assert_eq!(points_for(Money::from_minor(99_999), spend), 0);
        assert_eq!(points_for(Money::from_major(5_000), Money::zero()), 0);
    }

    #[test]
    fn test_accrue_promotes_customer() {
        let policy = TierPolicy::default();
        let accrual = policy.accrue(90, Money::from_major(20_000), Money::from_major(1_000));
        assert_eq!(accrual.awarded, 20);
        assert_eq!(accrual.points, 110);
        assert_eq!(accrual.tier, Tier::Silver);
    }

    #[test]
    fn test_policy_serializes_basis_points() {
        let json = serde_json::to_value(TierPolicy::default()).unwrap();
        assert_eq!(json["gold"]["discount_bps"], 700);
        assert_eq!(json["gold"]["min_points"], 500);
    }

    fn valid_policy() -> impl Strategy<Value = TierPolicy> {
        (
            proptest::collection::vec(0i64..5_000, 4),
            proptest::collection::vec(0u32..=10_000, 4),
        )
            .prop_map(|(mut points, mut bps)| {
                points.sort_unstable();
                bps.sort_unstable();
                TierPolicy {
                    regular: TierRule::new(points[0], Percent::from_bps(bps[0])),
                    silver: TierRule::new(points[1], Percent::from_bps(bps[1])),
                    gold: TierRule::new(points[2], Percent::from_bps(bps[2])),
                    platinum: TierRule::new(points[3], Percent::from_bps(bps[3])),
                }
            })
    }

    proptest! {
        #[test]
        fn tier_for_is_monotonic(policy in valid_policy(), a in 0i64..10_000, b in 0i64..10_000) {
            prop_assert!(policy.validate().is_ok());
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(policy.tier_for(low) <= policy.tier_for(high));
        }

        #[test]
        fn discount_is_monotonic_in_points(policy in valid_policy(), a in 0i64..10_000, b in 0i64..10_000) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let low_discount = policy.discount_for(policy.tier_for(low));
            let high_discount = policy.discount_for(policy.tier_for(high));
            prop_assert!(low_discount <= high_discount);
        }
    }
}
