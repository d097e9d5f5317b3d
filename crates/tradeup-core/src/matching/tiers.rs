use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TradeUpError;
use crate::types::{Money, Rate};
use crate::TradeUpResult;

/// Payment-change category of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Refresh,
    Upgrade,
    MaxUpgrade,
    OutOfRange,
}

/// Contiguous payment-delta bands, defined by their boundaries:
/// Refresh `[refresh_min, upgrade_min)`, Upgrade `[upgrade_min,
/// max_upgrade_min)`, MaxUpgrade `[max_upgrade_min, max_upgrade_max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBands {
    pub refresh_min: Rate,
    pub upgrade_min: Rate,
    pub max_upgrade_min: Rate,
    pub max_upgrade_max: Rate,
}

impl Default for TierBands {
    fn default() -> Self {
        TierBands {
            refresh_min: dec!(-0.05),
            upgrade_min: dec!(0.05),
            max_upgrade_min: dec!(0.25),
            max_upgrade_max: dec!(1.00),
        }
    }
}

impl TierBands {
    pub fn validate(&self) -> TradeUpResult<()> {
        if !(self.refresh_min < self.upgrade_min
            && self.upgrade_min < self.max_upgrade_min
            && self.max_upgrade_min < self.max_upgrade_max)
        {
            return Err(TradeUpError::invalid(
                "tiers",
                "Band boundaries must be strictly increasing.",
            ));
        }
        if self.refresh_min <= dec!(-1) {
            return Err(TradeUpError::invalid(
                "tiers.refresh_min",
                "A payment cannot fall by 100% or more.",
            ));
        }
        Ok(())
    }

    pub fn classify(&self, payment_delta: Rate) -> Tier {
        if payment_delta < self.refresh_min || payment_delta > self.max_upgrade_max {
            Tier::OutOfRange
        } else if payment_delta < self.upgrade_min {
            Tier::Refresh
        } else if payment_delta < self.max_upgrade_min {
            Tier::Upgrade
        } else {
            Tier::MaxUpgrade
        }
    }
}

/// `(new / current) - 1`.
pub fn payment_delta(new_payment: Money, current_payment: Money) -> TradeUpResult<Rate> {
    if current_payment.is_zero() {
        return Err(TradeUpError::DivisionByZero {
            context: "payment delta against a zero current payment".into(),
        });
    }
    Ok(new_payment / current_payment - Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_band_edges() {
        let bands = TierBands::default();
        assert_eq!(bands.classify(dec!(-0.05)), Tier::Refresh);
        assert_eq!(bands.classify(dec!(0.0499)), Tier::Refresh);
        assert_eq!(bands.classify(dec!(0.05)), Tier::Upgrade);
        assert_eq!(bands.classify(dec!(0.25)), Tier::MaxUpgrade);
        assert_eq!(bands.classify(dec!(1.00)), Tier::MaxUpgrade);
        assert_eq!(bands.classify(dec!(1.0001)), Tier::OutOfRange);
        assert_eq!(bands.classify(dec!(-0.0501)), Tier::OutOfRange);
    }

    #[test]
    fn test_small_and_large_increases_never_swap() {
        let bands = TierBands::default();
        let a = bands.classify(dec!(0.03));
        let b = bands.classify(dec!(0.40));
        assert!(matches!(a, Tier::Refresh | Tier::Upgrade));
        assert!(matches!(b, Tier::MaxUpgrade | Tier::OutOfRange));
    }

    #[test]
    fn test_overlapping_bands_rejected() {
        let bands = TierBands {
            upgrade_min: dec!(0.30),
            ..TierBands::default()
        };
        assert!(bands.validate().is_err());
    }

    #[test]
    fn test_payment_delta() {
        assert_eq!(payment_delta(dec!(10300), dec!(10000)).unwrap(), dec!(0.03));
        assert!(payment_delta(dec!(1), Decimal::ZERO).is_err());
    }
}
