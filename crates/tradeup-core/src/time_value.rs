//! Monthly time-value helpers over `Decimal`.
//!
//! Exponents are always whole periods, so powers are computed by repeated
//! multiplication rather than `powd` to keep results exact and deterministic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::TradeUpError;
use crate::types::{Money, Months, Rate};
use crate::TradeUpResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Convert a nominal annual rate to its monthly rate.
pub fn monthly_rate(annual_nominal: Rate) -> Rate {
    annual_nominal / MONTHS_PER_YEAR
}

/// Compute base^n for a non-negative integer exponent.
pub fn iterative_pow(base: Decimal, n: u32) -> Decimal {
    let mut result = Decimal::ONE;
    for _ in 0..n {
        result *= base;
    }
    result
}

/// Level payment that retires `principal` over `nper` periods at `rate`.
pub fn level_payment(rate: Rate, nper: Months, principal: Money) -> TradeUpResult<Money> {
    if nper == 0 {
        return Err(TradeUpError::invalid(
            "nper",
            "Number of periods must be > 0",
        ));
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(nper));
    }

    let factor = iterative_pow(Decimal::ONE + rate, nper);
    let annuity_factor = factor - Decimal::ONE;

    if annuity_factor.is_zero() {
        return Err(TradeUpError::DivisionByZero {
            context: "level payment annuity factor".into(),
        });
    }

    Ok(principal * rate * factor / annuity_factor)
}

/// Outstanding balance after `elapsed` level payments.
pub fn balance_after(rate: Rate, principal: Money, payment: Money, elapsed: Months) -> Money {
    if rate.is_zero() {
        return principal - payment * Decimal::from(elapsed);
    }
    let growth = iterative_pow(Decimal::ONE + rate, elapsed);
    principal * growth - payment * (growth - Decimal::ONE) / rate
}

/// Present value of a stream whose first flow arrives at the end of period 1.
pub fn present_value(rate: Rate, flows: &[Money]) -> TradeUpResult<Money> {
    if rate <= dec!(-1) {
        return Err(TradeUpError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for (t, cf) in flows.iter().enumerate() {
        discount *= one_plus_r;
        if discount.is_zero() {
            return Err(TradeUpError::DivisionByZero {
                context: format!("PV discount factor at period {}", t + 1),
            });
        }
        result += cf / discount;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_level_payment_known_answer() {
        // 100,000 at 1% per month over 12 months ≈ 8,884.88
        let pmt = level_payment(dec!(0.01), 12, dec!(100000)).unwrap();
        assert!((pmt - dec!(8884.88)).abs() < dec!(0.01));
    }

    #[test]
    fn test_level_payment_zero_rate() {
        let pmt = level_payment(Decimal::ZERO, 4, dec!(1000)).unwrap();
        assert_eq!(pmt, dec!(250));
    }

    #[test]
    fn test_level_payment_zero_periods_rejected() {
        assert!(level_payment(dec!(0.01), 0, dec!(1000)).is_err());
    }

    #[test]
    fn test_balance_after_full_term_is_zero() {
        let pmt = level_payment(dec!(0.015), 36, dec!(50000)).unwrap();
        let remaining = balance_after(dec!(0.015), dec!(50000), pmt, 36);
        assert!(remaining.abs() < dec!(0.000001));
    }

    #[test]
    fn test_present_value_single_flow() {
        let pv = present_value(dec!(0.10), &[dec!(110)]).unwrap();
        assert_eq!(pv, dec!(100));
    }

    #[test]
    fn test_present_value_zero_rate() {
        let pv = present_value(Decimal::ZERO, &[dec!(50), dec!(50), dec!(50)]).unwrap();
        assert_eq!(pv, dec!(150));
    }

    #[test]
    fn test_iterative_pow() {
        assert_eq!(iterative_pow(dec!(1.1), 2), dec!(1.21));
        assert_eq!(iterative_pow(dec!(7), 0), Decimal::ONE);
    }
}
