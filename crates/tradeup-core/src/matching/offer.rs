//! Pricing of a single (vehicle, term) combination into an [`Offer`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::npv::NpvCache;
use crate::amortization::payment::estimate_monthly_payment;
use crate::amortization::schedule::{build_schedule, AmortizationTable, ScheduleInput};
use crate::config::{validate_term, FeeConfig};
use crate::error::TradeUpError;
use crate::matching::matcher::OfferRequest;
use crate::matching::tiers::{payment_delta, Tier, TierBands};
use crate::pricing::fees::{bucketize, BucketOutcome, FeeBreakdown, Infeasibility, LoanBuckets};
use crate::pricing::rates::{RateTable, Resolution, ResolverMiss};
use crate::types::*;
use crate::TradeUpResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One vehicle x term result. Self-contained: the amortization table can be
/// regenerated from these fields alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub vehicle_id: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: Money,
    pub term: Months,
    pub annual_rate: Rate,
    pub tax_rate: Rate,
    pub min_down_payment_fraction: Rate,
    pub required_down_payment: Money,
    pub effective_equity: Money,
    pub fees: FeeBreakdown,
    pub buckets: LoanBuckets,
    pub loan_amount: Money,
    pub monthly_payment: Money,
    pub payment_delta: Rate,
    pub tier: Tier,
    pub npv: Money,
    pub loan_to_value: Rate,
    /// Pre-tax GPS fees, kept for schedule regeneration.
    pub gps_monthly_fee: Money,
    pub gps_install_fee: Money,
}

impl Offer {
    pub fn schedule_input(&self, first_due_date: Option<NaiveDate>) -> ScheduleInput {
        ScheduleInput {
            buckets: self.buckets,
            term: self.term,
            annual_rate: self.annual_rate,
            tax_rate: self.tax_rate,
            gps_monthly_fee: self.gps_monthly_fee,
            gps_install_fee: self.gps_install_fee,
            first_due_date,
        }
    }
}

/// Why a combination produced no offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    ResolverMiss(ResolverMiss),
    Infeasible(Infeasibility),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Quote {
    Offered(Box<Offer>),
    Skipped(SkipReason),
}

/// Read-only inputs shared by every combination of one run.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    pub customer: &'a Customer,
    pub config: &'a FeeConfig,
    pub rate_table: &'a RateTable,
    pub tiers: &'a TierBands,
    pub npv_cache: &'a NpvCache,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Price one vehicle at one term. Resolver misses and infeasibility are
/// returned as [`Quote::Skipped`]; only invalid input is an error.
pub fn price_combination(
    ctx: &PricingContext<'_>,
    vehicle: &Vehicle,
    term: Months,
) -> TradeUpResult<Quote> {
    let customer = ctx.customer;
    let config = ctx.config;

    let quote = match ctx.rate_table.resolve(
        &customer.risk_class,
        customer.risk_ordinal,
        term,
        config.rate_override,
    )? {
        Resolution::Resolved(q) => q,
        Resolution::Miss(miss) => return Ok(Quote::Skipped(SkipReason::ResolverMiss(miss))),
    };

    let split = match bucketize(
        vehicle.price,
        customer.vehicle_equity,
        config,
        quote.min_down_payment_fraction,
    )? {
        BucketOutcome::Feasible(b) => b,
        BucketOutcome::Infeasible(why) => return Ok(Quote::Skipped(SkipReason::Infeasible(why))),
    };

    let monthly_payment = estimate_monthly_payment(
        &split.buckets,
        term,
        quote.annual_rate,
        config.tax_rate,
        config.gps_monthly_fee,
    )?;
    let delta = payment_delta(monthly_payment, customer.current_monthly_payment)?;
    let npv = ctx.npv_cache.get_or_compute(
        split.buckets.main,
        quote.annual_rate,
        term,
        config.tax_rate,
    )?;

    Ok(Quote::Offered(Box::new(Offer {
        vehicle_id: vehicle.id.clone(),
        brand: vehicle.brand.clone(),
        model: vehicle.model.clone(),
        year: vehicle.year,
        price: vehicle.price,
        term,
        annual_rate: quote.annual_rate,
        tax_rate: config.tax_rate,
        min_down_payment_fraction: quote.min_down_payment_fraction,
        required_down_payment: split.required_down_payment,
        effective_equity: split.effective_equity,
        fees: split.fees,
        buckets: split.buckets,
        loan_amount: split.loan_amount,
        monthly_payment,
        payment_delta: delta,
        tier: ctx.tiers.classify(delta),
        npv,
        loan_to_value: split.loan_amount / vehicle.price,
        gps_monthly_fee: config.gps_monthly_fee,
        gps_install_fee: config.gps_install_fee,
    })))
}

/// Quote a single catalog vehicle at a single term, outside the matcher.
pub fn quote_vehicle(
    request: &OfferRequest,
    vehicle_id: &str,
    term: Months,
) -> TradeUpResult<ComputationOutput<Quote>> {
    let start = Instant::now();
    request.validate()?;
    validate_term("term", term)?;

    let vehicle = request
        .vehicles
        .iter()
        .find(|v| v.id == vehicle_id)
        .ok_or_else(|| {
            TradeUpError::invalid("vehicle_id", format!("No vehicle with id '{vehicle_id}'."))
        })?;

    let cache = NpvCache::new();
    let ctx = request.pricing_context(&cache);
    let quote = price_combination(&ctx, vehicle, term)?;

    let mut warnings = Vec::new();
    if vehicle.price <= request.customer.current_vehicle.price {
        warnings.push(format!(
            "Vehicle {} is not priced above the current vehicle; the matcher would exclude it",
            vehicle.id
        ));
    }
    if let Quote::Offered(offer) = &quote {
        if offer.tier == Tier::OutOfRange {
            warnings.push("Payment delta falls outside every tier band".into());
        }
        if offer.npv <= Decimal::ZERO {
            warnings.push("Non-positive NPV; the matcher would drop this offer".into());
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Single vehicle x term trade-up quote",
        &serde_json::json!({
            "customer_id": request.customer.customer_id,
            "vehicle_id": vehicle_id,
            "term": term,
        }),
        warnings,
        elapsed,
        quote,
    ))
}

/// Regenerate the amortization table for a stored offer.
pub fn offer_schedule(
    offer: &Offer,
    first_due_date: Option<NaiveDate>,
) -> TradeUpResult<ComputationOutput<AmortizationTable>> {
    build_schedule(&offer.schedule_input(first_due_date))
}
