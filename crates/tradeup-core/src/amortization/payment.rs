//! Payment component calculator.
//!
//! This is the only place a bucket-period principal/interest split is
//! computed. The first-month estimate, the NPV engine and the table generator
//! all call [`payment_component`].
//!
//! Each bucket is a level-payment loan amortized at the tax-inflated monthly
//! rate `j = rate / 12 * (1 + tax)`, so principal plus tax-inclusive interest
//! equals the audited level payment in every period.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::MAX_AMOUNT;
use crate::error::TradeUpError;
use crate::pricing::fees::{BucketKind, LoanBuckets};
use crate::time_value::{balance_after, level_payment, monthly_rate};
use crate::types::{Money, Months, Rate};
use crate::TradeUpResult;

/// One bucket in one period of its own cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentInput {
    /// The bucket's original notional for the current cycle.
    pub principal: Money,
    pub cycle_months: Months,
    /// 1-based period within the cycle.
    pub period: Months,
    pub annual_rate: Rate,
    pub tax_rate: Rate,
}

/// Principal and interest owed for one bucket-period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PaymentComponent {
    pub principal: Money,
    /// Tax-inclusive interest.
    pub interest: Money,
    pub interest_pre_tax: Money,
    /// Tax on interest; `interest_pre_tax + tax == interest`.
    pub tax: Money,
}

impl PaymentComponent {
    pub const ZERO: PaymentComponent = PaymentComponent {
        principal: Decimal::ZERO,
        interest: Decimal::ZERO,
        interest_pre_tax: Decimal::ZERO,
        tax: Decimal::ZERO,
    };

    pub fn payment(&self) -> Money {
        self.principal + self.interest
    }
}

/// Split one bucket-period into principal and tax-inclusive interest.
pub fn payment_component(input: &ComponentInput) -> TradeUpResult<PaymentComponent> {
    check_contract(input)?;

    if input.principal.is_zero() {
        return Ok(PaymentComponent::ZERO);
    }

    let rate = monthly_rate(input.annual_rate);
    let taxed_rate = rate * (Decimal::ONE + input.tax_rate);

    let payment = level_payment(taxed_rate, input.cycle_months, input.principal)?;
    let opening = balance_after(taxed_rate, input.principal, payment, input.period - 1);

    let interest = opening * taxed_rate;
    let interest_pre_tax = opening * rate;

    Ok(PaymentComponent {
        principal: payment - interest,
        interest,
        interest_pre_tax,
        tax: interest - interest_pre_tax,
    })
}

/// First-period payment across all four buckets, before GPS charges.
pub fn first_period_components(
    buckets: &LoanBuckets,
    term: Months,
    annual_rate: Rate,
    tax_rate: Rate,
) -> TradeUpResult<PaymentComponent> {
    let mut total = PaymentComponent::ZERO;
    for kind in BucketKind::ALL {
        let c = payment_component(&ComponentInput {
            principal: buckets.get(kind),
            cycle_months: kind.cycle_months(term),
            period: 1,
            annual_rate,
            tax_rate,
        })?;
        total.principal += c.principal;
        total.interest += c.interest;
        total.interest_pre_tax += c.interest_pre_tax;
        total.tax += c.tax;
    }
    Ok(total)
}

/// Quoted monthly payment: first-period bucket payments plus the
/// tax-inclusive GPS monthly fee. The one-off install fee is not included.
pub fn estimate_monthly_payment(
    buckets: &LoanBuckets,
    term: Months,
    annual_rate: Rate,
    tax_rate: Rate,
    gps_monthly_fee: Money,
) -> TradeUpResult<Money> {
    let components = first_period_components(buckets, term, annual_rate, tax_rate)?;
    Ok(components.payment() + gps_monthly_fee * (Decimal::ONE + tax_rate))
}

fn check_contract(input: &ComponentInput) -> TradeUpResult<()> {
    if input.principal < Decimal::ZERO {
        return Err(TradeUpError::internal(format!(
            "negative principal {} reached the payment calculator",
            input.principal
        )));
    }
    if input.principal > MAX_AMOUNT {
        return Err(TradeUpError::internal(format!(
            "principal {} above {MAX_AMOUNT} reached the payment calculator",
            input.principal
        )));
    }
    if input.cycle_months == 0 {
        return Err(TradeUpError::internal("zero-length amortization cycle"));
    }
    if input.period == 0 || input.period > input.cycle_months {
        return Err(TradeUpError::internal(format!(
            "period {} outside cycle of {} months",
            input.period, input.cycle_months
        )));
    }
    if input.annual_rate < Decimal::ZERO || input.tax_rate < Decimal::ZERO {
        return Err(TradeUpError::internal("negative rate reached the payment calculator"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TOL: Decimal = dec!(0.000001);

    fn input(principal: Money, cycle: Months, period: Months) -> ComponentInput {
        ComponentInput {
            principal,
            cycle_months: cycle,
            period,
            annual_rate: dec!(0.20),
            tax_rate: dec!(0.16),
        }
    }

    #[test]
    fn test_components_reproduce_level_payment_every_period() {
        let taxed = dec!(0.20) / dec!(12) * dec!(1.16);
        let pmt = level_payment(taxed, 48, dec!(100000)).unwrap();
        for period in 1..=48 {
            let c = payment_component(&input(dec!(100000), 48, period)).unwrap();
            assert!((c.payment() - pmt).abs() < TOL, "period {period}");
        }
    }

    #[test]
    fn test_principal_portions_retire_the_loan() {
        let total: Decimal = (1..=36)
            .map(|p| payment_component(&input(dec!(75000), 36, p)).unwrap().principal)
            .sum();
        assert!((total - dec!(75000)).abs() < TOL);
    }

    #[test]
    fn test_first_period_interest_split() {
        let c = payment_component(&input(dec!(120000), 48, 1)).unwrap();
        // Pre-tax interest = 120,000 * 0.20 / 12 = 2,000; tax = 320
        assert!((c.interest_pre_tax - dec!(2000)).abs() < TOL);
        assert!((c.tax - dec!(320)).abs() < TOL);
        assert_eq!(c.interest, c.interest_pre_tax + c.tax);
    }

    #[test]
    fn test_zero_principal_yields_zero() {
        let c = payment_component(&input(Decimal::ZERO, 12, 5)).unwrap();
        assert_eq!(c, PaymentComponent::ZERO);
    }

    #[test]
    fn test_zero_rate_is_straight_line() {
        let c = payment_component(&ComponentInput {
            principal: dec!(1200),
            cycle_months: 12,
            period: 7,
            annual_rate: Decimal::ZERO,
            tax_rate: dec!(0.16),
        })
        .unwrap();
        assert_eq!(c.principal, dec!(100));
        assert_eq!(c.interest, Decimal::ZERO);
    }

    #[test]
    fn test_contract_violations_are_internal_errors() {
        for bad in [
            input(dec!(-1), 12, 1),
            input(dec!(100), 0, 1),
            input(dec!(100), 12, 0),
            input(dec!(100), 12, 13),
        ] {
            assert!(matches!(
                payment_component(&bad),
                Err(TradeUpError::InternalInvariant { .. })
            ));
        }
    }

    #[test]
    fn test_estimate_adds_taxed_gps() {
        let buckets = LoanBuckets::default();
        let pmt = estimate_monthly_payment(&buckets, 48, dec!(0.2), dec!(0.16), dec!(350)).unwrap();
        assert_eq!(pmt, dec!(406));
    }
}
