//! Fee & equity bucketization.
//!
//! Splits a vehicle purchase into the fee breakdown, the customer's effective
//! equity, and the four independently amortized loan buckets. The marketing
//! fee is always based on vehicle price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{validate_amount, FeeConfig, INSURANCE_CYCLE_MONTHS, MAX_AMOUNT};
use crate::error::TradeUpError;
use crate::types::{Money, Months, Rate};
use crate::TradeUpResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The four independently amortized loan components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKind {
    Main,
    ServiceFee,
    LoyaltyProgram,
    Insurance,
}

impl BucketKind {
    pub const ALL: [BucketKind; 4] = [
        BucketKind::Main,
        BucketKind::ServiceFee,
        BucketKind::LoyaltyProgram,
        BucketKind::Insurance,
    ];

    /// Amortization cycle length for this bucket under an offer of `term`.
    pub fn cycle_months(self, term: Months) -> Months {
        match self {
            BucketKind::Insurance => INSURANCE_CYCLE_MONTHS,
            _ => term,
        }
    }

    /// Whether the bucket restarts at its original notional after each cycle.
    pub fn is_recurring(self) -> bool {
        matches!(self, BucketKind::Insurance)
    }
}

/// Principal (or balance) per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoanBuckets {
    pub main: Money,
    pub service_fee: Money,
    pub loyalty_program: Money,
    pub insurance: Money,
}

impl LoanBuckets {
    pub fn get(&self, kind: BucketKind) -> Money {
        match kind {
            BucketKind::Main => self.main,
            BucketKind::ServiceFee => self.service_fee,
            BucketKind::LoyaltyProgram => self.loyalty_program,
            BucketKind::Insurance => self.insurance,
        }
    }

    pub fn set(&mut self, kind: BucketKind, value: Money) {
        match kind {
            BucketKind::Main => self.main = value,
            BucketKind::ServiceFee => self.service_fee = value,
            BucketKind::LoyaltyProgram => self.loyalty_program = value,
            BucketKind::Insurance => self.insurance = value,
        }
    }

    pub fn total(&self) -> Money {
        self.main + self.service_fee + self.loyalty_program + self.insurance
    }

    pub fn round_dp(&self, dp: u32) -> LoanBuckets {
        LoanBuckets {
            main: self.main.round_dp(dp),
            service_fee: self.service_fee.round_dp(dp),
            loyalty_program: self.loyalty_program.round_dp(dp),
            insurance: self.insurance.round_dp(dp),
        }
    }
}

/// Up-front and recurring fees attached to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub service_fee: Money,
    pub marketing_fee: Money,
    pub acquisition_bonus: Money,
    pub loyalty_program: Money,
    pub insurance: Money,
    pub gps_install_with_tax: Money,
    pub gps_monthly_with_tax: Money,
}

/// A feasible split of the purchase into equity and buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucketization {
    pub fees: FeeBreakdown,
    pub effective_equity: Money,
    pub required_down_payment: Money,
    pub buckets: LoanBuckets,
    pub loan_amount: Money,
}

/// Why a vehicle cannot be financed for this customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Infeasibility {
    NonPositivePrincipal {
        principal: Money,
    },
    InsufficientEquity {
        effective_equity: Money,
        required_down_payment: Money,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BucketOutcome {
    Feasible(Bucketization),
    Infeasible(Infeasibility),
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Compute fees, effective equity and loan buckets for one vehicle.
pub fn bucketize(
    price: Money,
    equity: Money,
    config: &FeeConfig,
    down_payment_fraction: Rate,
) -> TradeUpResult<BucketOutcome> {
    validate_input(price, equity, down_payment_fraction)?;
    config.validate()?;

    let service_fee = price * config.service_fee_fraction;
    let marketing_fee = price * config.marketing_fee_fraction;
    let gps_install_with_tax = config.gps_install_with_tax();
    let gps_monthly_with_tax = config.gps_monthly_fee * (Decimal::ONE + config.tax_rate);

    let effective_equity =
        equity + config.acquisition_bonus - marketing_fee - gps_install_with_tax;
    let principal = price - effective_equity;
    let required_down_payment = price * down_payment_fraction;

    if principal > MAX_AMOUNT {
        return Err(TradeUpError::invalid(
            "price",
            format!("Financed principal {principal} exceeds {MAX_AMOUNT}."),
        ));
    }
    if principal <= Decimal::ZERO {
        return Ok(BucketOutcome::Infeasible(
            Infeasibility::NonPositivePrincipal { principal },
        ));
    }
    if effective_equity < required_down_payment {
        return Ok(BucketOutcome::Infeasible(
            Infeasibility::InsufficientEquity {
                effective_equity,
                required_down_payment,
            },
        ));
    }

    let buckets = LoanBuckets {
        main: principal,
        service_fee,
        loyalty_program: config.loyalty_program_amount,
        insurance: config.insurance_amount,
    };

    Ok(BucketOutcome::Feasible(Bucketization {
        fees: FeeBreakdown {
            service_fee,
            marketing_fee,
            acquisition_bonus: config.acquisition_bonus,
            loyalty_program: config.loyalty_program_amount,
            insurance: config.insurance_amount,
            gps_install_with_tax,
            gps_monthly_with_tax,
        },
        effective_equity,
        required_down_payment,
        buckets,
        loan_amount: buckets.total(),
    }))
}

fn validate_input(price: Money, equity: Money, down_payment_fraction: Rate) -> TradeUpResult<()> {
    if price <= Decimal::ZERO {
        return Err(TradeUpError::invalid("price", "Vehicle price must be positive."));
    }
    if equity < Decimal::ZERO {
        return Err(TradeUpError::invalid("equity", "Equity cannot be negative."));
    }
    validate_amount("price", price)?;
    validate_amount("equity", equity)?;
    if down_payment_fraction < Decimal::ZERO || down_payment_fraction > Decimal::ONE {
        return Err(TradeUpError::invalid(
            "down_payment_fraction",
            "Down-payment fraction must be in [0, 1].",
        ));
    }
    Ok(())
}
