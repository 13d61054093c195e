//! Precision normalizer: converts a desired order value into an exchange-legal quantity.
//!
//! All arithmetic is exact `rust_decimal`. Quantities are truncated toward zero; the
//! only upward adjustment is the minimum-size bump described on [`MinSizePolicy`].

use crate::error::SizeRejection;
use crate::market::AssetMeta;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Venue constraints for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingRules {
    /// Minimum order value in quote currency.
    pub min_notional: Decimal,
    /// Minimum position value in quote currency.
    pub min_position_size: Decimal,
    /// Maximum decimals allowed in a quantity.
    pub size_decimals: u32,
}

/// What to do when the truncated order falls under the venue minimums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MinSizePolicy {
    /// Never raise an order; undersized orders are rejected.
    Reject,
    /// Raise the order to the smallest legal quantity, but only when that quantity
    /// costs at most `tolerance` more than the desired notional.
    BumpWithinTolerance { tolerance: Decimal },
}

impl Default for MinSizePolicy {
    fn default() -> Self {
        Self::BumpWithinTolerance {
            tolerance: Decimal::ONE,
        }
    }
}

/// A quantity the exchange will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSize {
    pub quantity: Decimal,
    /// quantity × market price.
    pub notional: Decimal,
    /// True when the minimum-size bump raised the order above the truncated size.
    pub bumped: bool,
}

/// Truncates a quantity toward zero at `size_decimals`.
#[must_use]
pub fn truncate_quantity(quantity: Decimal, size_decimals: u32) -> Decimal {
    quantity.round_dp_with_strategy(size_decimals, RoundingStrategy::ToZero)
}

fn ceil_quantity(quantity: Decimal, size_decimals: u32) -> Decimal {
    quantity.round_dp_with_strategy(size_decimals, RoundingStrategy::AwayFromZero)
}

/// Smallest representable quantity step at `size_decimals`.
#[must_use]
pub fn lot_size(size_decimals: u32) -> Decimal {
    Decimal::new(1, size_decimals)
}

/// Converts `desired_notional` at `market_price` into a legal quantity.
///
/// # Errors
/// Returns a [`SizeRejection`] when the inputs are non-positive or the order cannot
/// satisfy the venue minimums under `policy`.
pub fn normalize(
    desired_notional: Decimal,
    market_price: Decimal,
    rules: &SizingRules,
    policy: MinSizePolicy,
) -> Result<NormalizedSize, SizeRejection> {
    if desired_notional <= Decimal::ZERO || market_price <= Decimal::ZERO {
        return Err(SizeRejection::NonPositiveInput {
            desired_notional,
            market_price,
        });
    }

    let quantity = truncate_quantity(desired_notional / market_price, rules.size_decimals);
    let notional = quantity * market_price;

    let Err(rejection) = check_minimums(quantity, notional, rules) else {
        return Ok(NormalizedSize {
            quantity,
            notional,
            bumped: false,
        });
    };

    match policy {
        MinSizePolicy::Reject => Err(rejection),
        MinSizePolicy::BumpWithinTolerance { tolerance } => {
            let bumped = minimum_legal_size(market_price, rules);
            if bumped.notional - desired_notional <= tolerance {
                tracing::debug!(
                    desired = %desired_notional,
                    bumped = %bumped.notional,
                    "Raised order to venue minimum"
                );
                Ok(bumped)
            } else {
                Err(rejection)
            }
        }
    }
}

/// Normalizes against the rules published in `meta`.
///
/// # Errors
/// See [`normalize`].
pub fn normalize_for(
    desired_notional: Decimal,
    market_price: Decimal,
    meta: &AssetMeta,
    policy: MinSizePolicy,
) -> Result<NormalizedSize, SizeRejection> {
    normalize(desired_notional, market_price, &meta.sizing_rules(), policy)
}

fn check_minimums(
    quantity: Decimal,
    notional: Decimal,
    rules: &SizingRules,
) -> Result<(), SizeRejection> {
    if quantity.is_zero() {
        return Err(SizeRejection::ZeroQuantity {
            size_decimals: rules.size_decimals,
        });
    }
    if notional < rules.min_notional {
        return Err(SizeRejection::BelowMinNotional {
            notional,
            min_notional: rules.min_notional,
        });
    }
    if notional < rules.min_position_size {
        return Err(SizeRejection::BelowMinPositionSize {
            value: notional,
            min_position_size: rules.min_position_size,
        });
    }
    Ok(())
}

/// Smallest quantity at the venue precision that clears both minimums.
fn minimum_legal_size(market_price: Decimal, rules: &SizingRules) -> NormalizedSize {
    let lot = lot_size(rules.size_decimals);
    let floor_value = rules.min_notional.max(rules.min_position_size);

    let mut quantity = ceil_quantity(floor_value / market_price, rules.size_decimals).max(lot);
    // Division is exact to 28 significant digits; step up if the last digit rounded down.
    while quantity * market_price < floor_value {
        quantity += lot;
    }

    NormalizedSize {
        quantity,
        notional: quantity * market_price,
        bumped: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc_rules() -> SizingRules {
        SizingRules {
            min_notional: dec!(10),
            min_position_size: dec!(0.001),
            size_decimals: 5,
        }
    }

    #[test]
    fn test_fifteen_dollars_of_btc_is_accepted() {
        let size = normalize(dec!(15), dec!(50000), &btc_rules(), MinSizePolicy::default())
            .unwrap();

        // 15 / 50000 = 0.0003 → 0.00030 at 5 decimals, notional exactly $15
        assert_eq!(size.quantity, dec!(0.00030));
        assert_eq!(size.notional, dec!(15));
        assert!(!size.bumped);
    }

    #[test]
    fn test_truncation_never_rounds_up() {
        let rules = SizingRules {
            min_notional: dec!(10),
            min_position_size: Decimal::ZERO,
            size_decimals: 2,
        };
        // 100 / 3 = 33.333.. → 33.33
        let size = normalize(dec!(100), dec!(3), &rules, MinSizePolicy::Reject).unwrap();
        assert_eq!(size.quantity, dec!(33.33));
        assert_eq!(size.notional, dec!(99.99));

        // 20 / 0.07 = 285.714.. → 285.71, never 285.72
        let size = normalize(dec!(20), dec!(0.07), &rules, MinSizePolicy::Reject).unwrap();
        assert_eq!(size.quantity, dec!(285.71));
        assert!(size.notional <= dec!(20));
    }

    #[test]
    fn test_notional_never_exceeds_budget_without_bump() {
        let rules = SizingRules {
            min_notional: dec!(10),
            min_position_size: Decimal::ZERO,
            size_decimals: 3,
        };
        let prices = [dec!(0.37), dec!(1.5), dec!(3.14159), dec!(97.3), dec!(2543.21)];
        let budgets = [dec!(10), dec!(10.01), dec!(17.5), dec!(250), dec!(9999.99)];

        for price in prices {
            for budget in budgets {
                if let Ok(size) = normalize(budget, price, &rules, MinSizePolicy::Reject) {
                    assert!(
                        size.notional <= budget,
                        "budget {budget} at {price} produced {}",
                        size.notional
                    );
                    assert!(size.notional >= rules.min_notional);
                    assert!(size.quantity.scale() <= 3);
                }
            }
        }
    }

    #[test]
    fn test_bump_within_tolerance_reaches_minimum_exactly() {
        let size = normalize(
            dec!(9.5),
            dec!(50000),
            &btc_rules(),
            MinSizePolicy::BumpWithinTolerance { tolerance: dec!(1) },
        )
        .unwrap();

        // 10 / 50000 = 0.0002 exactly at 5 decimals
        assert_eq!(size.quantity, dec!(0.0002));
        assert_eq!(size.notional, dec!(10));
        assert!(size.bumped);
    }

    #[test]
    fn test_bump_outside_tolerance_rejects() {
        let result = normalize(
            dec!(5),
            dec!(50000),
            &btc_rules(),
            MinSizePolicy::BumpWithinTolerance { tolerance: dec!(1) },
        );
        assert!(matches!(
            result,
            Err(SizeRejection::BelowMinNotional { .. })
        ));
    }

    #[test]
    fn test_reject_policy_never_bumps() {
        let result = normalize(dec!(9.99), dec!(50000), &btc_rules(), MinSizePolicy::Reject);
        assert!(matches!(
            result,
            Err(SizeRejection::BelowMinNotional { .. })
        ));
    }

    #[test]
    fn test_coarse_lot_bump_limited_by_tolerance() {
        let rules = SizingRules {
            min_notional: dec!(10),
            min_position_size: Decimal::ZERO,
            size_decimals: 3,
        };
        // 10 / 50000 truncates to 0.000; one lot costs $50, far above a $1 tolerance
        let result = normalize(dec!(10), dec!(50000), &rules, MinSizePolicy::default());
        assert_eq!(
            result,
            Err(SizeRejection::ZeroQuantity { size_decimals: 3 })
        );

        // A generous tolerance accepts the single-lot bump
        let size = normalize(
            dec!(10),
            dec!(50000),
            &rules,
            MinSizePolicy::BumpWithinTolerance { tolerance: dec!(50) },
        )
        .unwrap();
        assert_eq!(size.quantity, dec!(0.001));
        assert!(size.bumped);
    }

    #[test]
    fn test_bump_rounds_to_next_lot_when_minimum_is_not_representable() {
        let rules = SizingRules {
            min_notional: dec!(10),
            min_position_size: Decimal::ZERO,
            size_decimals: 0,
        };
        // price 3: 3 units = $9 < $10, bump to 4 units = $12 (overshoot $2.5 from $9.5)
        let size = normalize(
            dec!(9.5),
            dec!(3),
            &rules,
            MinSizePolicy::BumpWithinTolerance { tolerance: dec!(3) },
        )
        .unwrap();
        assert_eq!(size.quantity, dec!(4));
        assert_eq!(size.notional, dec!(12));
    }

    #[test]
    fn test_position_floor_applies() {
        let rules = SizingRules {
            min_notional: dec!(1),
            min_position_size: dec!(25),
            size_decimals: 4,
        };
        let result = normalize(dec!(20), dec!(100), &rules, MinSizePolicy::Reject);
        assert!(matches!(
            result,
            Err(SizeRejection::BelowMinPositionSize { .. })
        ));
    }

    #[test]
    fn test_non_positive_inputs_rejected() {
        let rules = btc_rules();
        assert!(matches!(
            normalize(dec!(0), dec!(50000), &rules, MinSizePolicy::default()),
            Err(SizeRejection::NonPositiveInput { .. })
        ));
        assert!(matches!(
            normalize(dec!(15), dec!(-1), &rules, MinSizePolicy::default()),
            Err(SizeRejection::NonPositiveInput { .. })
        ));
    }

    #[test]
    fn test_truncate_quantity_helper() {
        assert_eq!(truncate_quantity(dec!(1.23456789), 4), dec!(1.2345));
        assert_eq!(truncate_quantity(dec!(0.99999), 0), dec!(0));
        assert_eq!(lot_size(5), dec!(0.00001));
    }
}
