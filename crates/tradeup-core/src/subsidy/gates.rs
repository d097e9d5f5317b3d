use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TradeUpError;
use crate::matching::offer::Offer;
use crate::types::{Money, Rate};
use crate::TradeUpResult;

/// A pass/fail business rule an offer must clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    PaymentDelta,
    Npv,
    LoanToValue,
}

/// Hard-gate thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubsidyGates {
    /// Ceiling on (new / current payment) - 1.
    pub max_payment_delta: Rate,
    /// Floor on interest NPV.
    pub min_npv: Money,
    /// Ceiling on loan amount / vehicle price.
    pub max_loan_to_value: Rate,
}

impl Default for SubsidyGates {
    fn default() -> Self {
        SubsidyGates {
            max_payment_delta: dec!(0.25),
            min_npv: dec!(20000),
            max_loan_to_value: dec!(0.85),
        }
    }
}

impl SubsidyGates {
    pub fn validate(&self) -> TradeUpResult<()> {
        if self.max_payment_delta <= dec!(-1) {
            return Err(TradeUpError::invalid(
                "gates.max_payment_delta",
                "Payment-delta ceiling must be greater than -100%.",
            ));
        }
        if self.min_npv < Decimal::ZERO {
            return Err(TradeUpError::invalid("gates.min_npv", "NPV floor cannot be negative."));
        }
        if self.max_loan_to_value <= Decimal::ZERO {
            return Err(TradeUpError::invalid(
                "gates.max_loan_to_value",
                "LTV ceiling must be positive.",
            ));
        }
        Ok(())
    }

    /// Check every gate, labelling each result individually.
    pub fn check(&self, offer: &Offer) -> Vec<GateCheck> {
        vec![
            GateCheck {
                gate: Gate::PaymentDelta,
                passed: offer.payment_delta <= self.max_payment_delta,
                observed: offer.payment_delta,
                limit: self.max_payment_delta,
            },
            GateCheck {
                gate: Gate::Npv,
                passed: offer.npv >= self.min_npv,
                observed: offer.npv,
                limit: self.min_npv,
            },
            GateCheck {
                gate: Gate::LoanToValue,
                passed: offer.loan_to_value <= self.max_loan_to_value,
                observed: offer.loan_to_value,
                limit: self.max_loan_to_value,
            },
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateCheck {
    pub gate: Gate,
    pub passed: bool,
    pub observed: Decimal,
    pub limit: Decimal,
}

pub fn failing(checks: &[GateCheck]) -> Vec<Gate> {
    checks.iter().filter(|c| !c.passed).map(|c| c.gate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::tiers::Tier;
    use crate::pricing::fees::{FeeBreakdown, LoanBuckets};

    fn offer(payment_delta: Rate, npv: Money, loan_to_value: Rate) -> Offer {
        Offer {
            vehicle_id: "V".into(),
            brand: "Kia".into(),
            model: "Sportage".into(),
            year: 2025,
            price: dec!(300000),
            term: 48,
            annual_rate: dec!(0.20),
            tax_rate: dec!(0.16),
            min_down_payment_fraction: dec!(0.15),
            required_down_payment: dec!(45000),
            effective_equity: dec!(137130),
            fees: FeeBreakdown {
                service_fee: dec!(12000),
                marketing_fee: dec!(12000),
                acquisition_bonus: Decimal::ZERO,
                loyalty_program: Decimal::ZERO,
                insurance: dec!(10999),
                gps_install_with_tax: dec!(870),
                gps_monthly_with_tax: dec!(406),
            },
            buckets: LoanBuckets::default(),
            loan_amount: dec!(185869),
            monthly_payment: dec!(7000),
            payment_delta,
            tier: Tier::Refresh,
            npv,
            loan_to_value,
            gps_monthly_fee: dec!(350),
            gps_install_fee: dec!(750),
        }
    }

    #[test]
    fn test_all_gates_pass_at_limits() {
        let gates = SubsidyGates::default();
        let checks = gates.check(&offer(dec!(0.25), dec!(20000), dec!(0.85)));
        assert!(checks.iter().all(|c| c.passed));
        assert!(failing(&checks).is_empty());
    }

    #[test]
    fn test_each_failure_is_labelled() {
        let gates = SubsidyGates::default();
        let checks = gates.check(&offer(dec!(0.30), dec!(19999), dec!(0.62)));
        assert_eq!(failing(&checks), vec![Gate::PaymentDelta, Gate::Npv]);

        let checks = gates.check(&offer(dec!(-0.10), dec!(50000), dec!(0.90)));
        assert_eq!(failing(&checks), vec![Gate::LoanToValue]);
        assert_eq!(checks[2].observed, dec!(0.90));
        assert_eq!(checks[2].limit, dec!(0.85));
    }

    #[test]
    fn test_invalid_gates_rejected() {
        let bad_delta = SubsidyGates {
            max_payment_delta: dec!(-1),
            ..SubsidyGates::default()
        };
        assert!(bad_delta.validate().is_err());

        let bad_ltv = SubsidyGates {
            max_loan_to_value: Decimal::ZERO,
            ..SubsidyGates::default()
        };
        assert!(bad_ltv.validate().is_err());
        assert!(SubsidyGates::default().validate().is_ok());
    }
}
