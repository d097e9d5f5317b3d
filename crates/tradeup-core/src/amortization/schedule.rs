//! Month-by-month amortization table across all four loan buckets.
//!
//! Every bucket is tracked by its own [`BucketLedger`], which counts the
//! period within the bucket's current cycle. The insurance ledger restarts
//! at its original notional once its 12-month cycle is exhausted; the other
//! ledgers run a single cycle equal to the offer term.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::payment::{payment_component, ComponentInput};
use crate::config::{validate_amount, validate_rate, validate_term, MAX_AMOUNT};
use crate::error::TradeUpError;
use crate::pricing::fees::{BucketKind, LoanBuckets};
use crate::types::*;
use crate::TradeUpResult;

const CENTS: u32 = 2;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Everything needed to regenerate a schedule; nothing else is consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub buckets: LoanBuckets,
    pub term: Months,
    pub annual_rate: Rate,
    pub tax_rate: Rate,
    /// Pre-tax GPS monthly fee.
    pub gps_monthly_fee: Money,
    /// Pre-tax GPS install fee, charged in period 1.
    pub gps_install_fee: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_due_date: Option<NaiveDate>,
}

/// One month of the ledger. Monetary fields are rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub period: Months,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub beginning_balance: Money,
    /// Bucket principal, plus the taxed GPS install fee in period 1.
    pub principal: Money,
    /// Pre-tax interest.
    pub interest: Money,
    /// Tax on interest and on the GPS monthly fee.
    pub tax: Money,
    /// Pre-tax GPS monthly fee.
    pub charges: Money,
    pub total_due: Money,
    pub ending_balance: Money,
    pub bucket_balances: LoanBuckets,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduleTotals {
    pub principal: Money,
    pub interest: Money,
    pub tax: Money,
    pub charges: Money,
    pub total_due: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationTable {
    pub term: Months,
    pub rows: Vec<AmortizationRow>,
    pub totals: ScheduleTotals,
}

// ---------------------------------------------------------------------------
// Bucket ledger
// ---------------------------------------------------------------------------

/// Per-bucket state machine: amortizing -> cycle complete -> reset.
#[derive(Debug, Clone)]
struct BucketLedger {
    kind: BucketKind,
    notional: Money,
    cycle_months: Months,
    period_in_cycle: Months,
    balance: Money,
}

impl BucketLedger {
    fn new(kind: BucketKind, notional: Money, term: Months) -> Self {
        BucketLedger {
            kind,
            notional,
            cycle_months: kind.cycle_months(term),
            period_in_cycle: 0,
            balance: notional,
        }
    }

    /// Step into the next period, resetting a completed recurring cycle.
    /// Returns the 1-based period within the (possibly new) cycle.
    fn begin_period(&mut self) -> TradeUpResult<Months> {
        if self.period_in_cycle == self.cycle_months {
            if !self.kind.is_recurring() {
                return Err(TradeUpError::internal(format!(
                    "{:?} bucket amortized past its {}-month cycle",
                    self.kind, self.cycle_months
                )));
            }
            self.period_in_cycle = 0;
            self.balance = self.notional;
        }
        self.period_in_cycle += 1;
        Ok(self.period_in_cycle)
    }
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Generate the amortization table wrapped in the standard output envelope.
pub fn build_schedule(
    input: &ScheduleInput,
) -> TradeUpResult<ComputationOutput<AmortizationTable>> {
    let start = Instant::now();
    let table = generate_table(input)?;

    let mut warnings = Vec::new();
    if input.buckets.main.is_zero() {
        warnings.push("Main bucket is zero; schedule covers fees only".to_string());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Four-bucket level-payment amortization (tax-inflated rate, 12-month insurance renewal)",
        &serde_json::json!({
            "term": input.term,
            "annual_rate": input.annual_rate.to_string(),
            "tax_rate": input.tax_rate.to_string(),
            "loan_amount": input.buckets.total().to_string(),
        }),
        warnings,
        elapsed,
        table,
    ))
}

/// Generate the amortization table. Pure and deterministic.
pub fn generate_table(input: &ScheduleInput) -> TradeUpResult<AmortizationTable> {
    validate_input(input)?;

    let tax_factor = Decimal::ONE + input.tax_rate;
    let install_with_tax = input.gps_install_fee * tax_factor;

    let mut ledgers: Vec<BucketLedger> = BucketKind::ALL
        .iter()
        .map(|&kind| BucketLedger::new(kind, input.buckets.get(kind), input.term))
        .collect();

    let mut rows = Vec::with_capacity(input.term as usize);
    let mut totals = ScheduleTotals::default();

    for period in 1..=input.term {
        let mut beginning = Decimal::ZERO;
        let mut principal = Decimal::ZERO;
        let mut interest_pre_tax = Decimal::ZERO;
        let mut ending = LoanBuckets::default();

        for ledger in ledgers.iter_mut() {
            let period_in_cycle = ledger.begin_period()?;
            let c = payment_component(&ComponentInput {
                principal: ledger.notional,
                cycle_months: ledger.cycle_months,
                period: period_in_cycle,
                annual_rate: input.annual_rate,
                tax_rate: input.tax_rate,
            })?;

            beginning += ledger.balance;
            principal += c.principal;
            interest_pre_tax += c.interest_pre_tax;

            ledger.balance = (ledger.balance - c.principal).max(Decimal::ZERO);
            ending.set(ledger.kind, ledger.balance);
        }

        if period == 1 {
            principal += install_with_tax;
        }

        let principal = principal.round_dp(CENTS);
        let interest = interest_pre_tax.round_dp(CENTS);
        let tax = ((interest_pre_tax + input.gps_monthly_fee) * input.tax_rate).round_dp(CENTS);
        let charges = input.gps_monthly_fee.round_dp(CENTS);
        let total_due = principal + interest + tax + charges;

        totals.principal += principal;
        totals.interest += interest;
        totals.tax += tax;
        totals.charges += charges;
        totals.total_due += total_due;

        let bucket_balances = ending.round_dp(CENTS);
        rows.push(AmortizationRow {
            period,
            due_date: due_date(input.first_due_date, period)?,
            beginning_balance: beginning.round_dp(CENTS),
            principal,
            interest,
            tax,
            charges,
            total_due,
            ending_balance: bucket_balances.total(),
            bucket_balances,
        });
    }

    Ok(AmortizationTable {
        term: input.term,
        rows,
        totals,
    })
}

fn due_date(first: Option<NaiveDate>, period: Months) -> TradeUpResult<Option<NaiveDate>> {
    match first {
        None => Ok(None),
        Some(date) => date
            .checked_add_months(chrono::Months::new(period - 1))
            .map(Some)
            .ok_or_else(|| {
                TradeUpError::invalid(
                    "first_due_date",
                    format!("Period {period} due date overflows"),
                )
            }),
    }
}

fn validate_input(input: &ScheduleInput) -> TradeUpResult<()> {
    validate_term("term", input.term)?;
    validate_rate("annual_rate", input.annual_rate)?;
    validate_rate("tax_rate", input.tax_rate)?;
    validate_amount("gps_monthly_fee", input.gps_monthly_fee)?;
    validate_amount("gps_install_fee", input.gps_install_fee)?;
    for kind in BucketKind::ALL {
        let principal = input.buckets.get(kind);
        if principal < Decimal::ZERO {
            return Err(TradeUpError::invalid(
                "buckets",
                format!("{kind:?} bucket principal cannot be negative."),
            ));
        }
        if principal > MAX_AMOUNT {
            return Err(TradeUpError::invalid(
                "buckets",
                format!("{kind:?} bucket principal cannot exceed {MAX_AMOUNT}."),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn reference_input() -> ScheduleInput {
        ScheduleInput {
            buckets: LoanBuckets {
                main: dec!(162870),
                service_fee: dec!(12000),
                loyalty_program: Decimal::ZERO,
                insurance: dec!(10999),
            },
            term: 48,
            annual_rate: dec!(0.20),
            tax_rate: dec!(0.16),
            gps_monthly_fee: dec!(350),
            gps_install_fee: dec!(750),
            first_due_date: None,
        }
    }

    #[test]
    fn test_row_count_equals_term() {
        let table = generate_table(&reference_input()).unwrap();
        assert_eq!(table.rows.len(), 48);
        assert_eq!(table.rows[47].period, 48);
    }

    #[test]
    fn test_rows_sum_to_total_due() {
        let table = generate_table(&reference_input()).unwrap();
        for row in &table.rows {
            let sum = row.principal + row.interest + row.tax + row.charges;
            assert!((sum - row.total_due).abs() <= dec!(0.01), "period {}", row.period);
        }
    }

    #[test]
    fn test_install_fee_only_in_first_period() {
        let input = reference_input();
        let with_fee = generate_table(&input).unwrap();
        let without_fee = generate_table(&ScheduleInput {
            gps_install_fee: Decimal::ZERO,
            ..input
        })
        .unwrap();

        // 750 * 1.16 = 870 folded into period-1 principal
        assert_eq!(
            with_fee.rows[0].principal - without_fee.rows[0].principal,
            dec!(870)
        );
        for (a, b) in with_fee.rows.iter().zip(&without_fee.rows).skip(1) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_insurance_resets_every_twelve_periods() {
        let table = generate_table(&reference_input()).unwrap();
        for row in &table.rows {
            let ins = row.bucket_balances.insurance;
            if row.period % 12 == 0 {
                assert!(ins <= dec!(0.01), "period {} insurance {}", row.period, ins);
            } else {
                assert!(ins > Decimal::ZERO);
            }
        }
        // Period 13 re-opens at the notional
        assert!(table.rows[12].beginning_balance > table.rows[11].ending_balance);
    }

    #[test]
    fn test_non_insurance_buckets_fully_retired() {
        let table = generate_table(&reference_input()).unwrap();
        let last = table.rows.last().unwrap();
        assert!(last.bucket_balances.main <= dec!(0.01));
        assert!(last.bucket_balances.service_fee <= dec!(0.01));
    }

    #[test]
    fn test_tax_line_covers_interest_and_gps() {
        let table = generate_table(&reference_input()).unwrap();
        let first = &table.rows[0];
        // Pre-tax interest on 185,869 at 20%/12 = 3,097.82; tax = (3,097.82 + 350) * 0.16
        assert!((first.interest - dec!(3097.82)).abs() <= dec!(0.01));
        assert!((first.tax - dec!(551.65)).abs() <= dec!(0.01));
    }

    #[test]
    fn test_due_dates_step_monthly() {
        let mut input = reference_input();
        input.first_due_date = NaiveDate::from_ymd_opt(2024, 1, 31);
        let table = generate_table(&input).unwrap();
        assert_eq!(table.rows[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(table.rows[1].due_date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(table.rows[12].due_date, NaiveDate::from_ymd_opt(2025, 1, 31));
    }

    #[test]
    fn test_negative_bucket_rejected() {
        let mut input = reference_input();
        input.buckets.service_fee = dec!(-5);
        assert!(matches!(
            generate_table(&input),
            Err(TradeUpError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_oversized_bucket_rejected_before_arithmetic() {
        let mut input = reference_input();
        input.buckets.main = dec!(100_000_000_000_000_000_000_000_000);
        input.term = 120;
        input.annual_rate = dec!(1.0);
        match generate_table(&input) {
            Err(TradeUpError::InvalidInput { field, .. }) => assert_eq!(field, "buckets"),
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_totals_match_rows() {
        let table = generate_table(&reference_input()).unwrap();
        let total: Decimal = table.rows.iter().map(|r| r.total_due).sum();
        assert_eq!(table.totals.total_due, total);
    }
}
