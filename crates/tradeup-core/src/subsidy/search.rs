//! Minimum-subsidy search.
//!
//! For one vehicle, walks the subsidy levers in a fixed priority order and
//! returns the first combination that clears every hard gate. The order is
//! term -> service fee (descending) -> acquisition bonus (ascending) ->
//! marketing fee (descending): profit-preserving levers are exhausted before
//! subsidizing, and subsidizing before discounting acquisition cost. The
//! result is greedy-first, not a global optimum. When nothing clears, the
//! combination with the smallest |payment delta| is reported with its
//! failing gates.

use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::npv::NpvCache;
use crate::config::{validate_amount, validate_fraction, validate_terms, FeeConfig, DEFAULT_TERMS};
use crate::error::TradeUpError;
use crate::matching::offer::{price_combination, Offer, PricingContext, Quote};
use crate::matching::tiers::TierBands;
use crate::pricing::rates::RateTable;
use crate::subsidy::gates::{failing, Gate, GateCheck, SubsidyGates};
use crate::types::*;
use crate::TradeUpResult;

/// Upper bound on the values a single lever may take.
const MAX_LEVER_STEPS: usize = 1000;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Inclusive range walked from `start` towards `end` in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverRange {
    pub start: Decimal,
    pub end: Decimal,
    pub step: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Descending,
    Ascending,
}

impl LeverRange {
    /// Range holding a single value, for levers the caller does not want searched.
    pub fn fixed(value: Decimal) -> Self {
        LeverRange {
            start: value,
            end: value,
            step: Decimal::ONE,
        }
    }

    fn values(&self, field: &str, direction: Direction) -> TradeUpResult<Vec<Decimal>> {
        if self.step <= Decimal::ZERO {
            return Err(TradeUpError::invalid(field, "Step must be positive."));
        }
        let span = match direction {
            Direction::Descending => self.start - self.end,
            Direction::Ascending => self.end - self.start,
        };
        if span < Decimal::ZERO {
            let expected = match direction {
                Direction::Descending => "start >= end",
                Direction::Ascending => "start <= end",
            };
            return Err(TradeUpError::invalid(field, format!("Range must satisfy {expected}.")));
        }

        let count = (span / self.step).floor();
        if count >= Decimal::from(MAX_LEVER_STEPS) {
            return Err(TradeUpError::invalid(
                field,
                format!("Range yields more than {MAX_LEVER_STEPS} values."),
            ));
        }

        let mut values = Vec::new();
        let mut i = Decimal::ZERO;
        while i <= count {
            let offset = i * self.step;
            values.push(match direction {
                Direction::Descending => self.start - offset,
                Direction::Ascending => self.start + offset,
            });
            i += Decimal::ONE;
        }
        Ok(values)
    }
}

fn default_service_fee_range() -> LeverRange {
    LeverRange {
        start: dec!(0.05),
        end: dec!(0.00),
        step: dec!(0.005),
    }
}

fn default_bonus_range() -> LeverRange {
    LeverRange {
        start: dec!(0),
        end: dec!(30000),
        step: dec!(5000),
    }
}

fn default_marketing_fee_range() -> LeverRange {
    LeverRange {
        start: dec!(0.04),
        end: dec!(0.00),
        step: dec!(0.01),
    }
}

fn default_terms() -> Vec<Months> {
    DEFAULT_TERMS.to_vec()
}

/// Lever ranges, terms and gates for a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsidyPlan {
    #[serde(default = "default_service_fee_range")]
    pub service_fee: LeverRange,
    #[serde(default = "default_bonus_range")]
    pub acquisition_bonus: LeverRange,
    #[serde(default = "default_marketing_fee_range")]
    pub marketing_fee: LeverRange,
    #[serde(default = "default_terms")]
    pub terms: Vec<Months>,
    #[serde(default)]
    pub gates: SubsidyGates,
}

impl Default for SubsidyPlan {
    fn default() -> Self {
        SubsidyPlan {
            service_fee: default_service_fee_range(),
            acquisition_bonus: default_bonus_range(),
            marketing_fee: default_marketing_fee_range(),
            terms: default_terms(),
            gates: SubsidyGates::default(),
        }
    }
}

/// Lever values for every level of the search, in iteration order.
struct LeverGrid {
    service_fees: Vec<Rate>,
    bonuses: Vec<Money>,
    marketing_fees: Vec<Rate>,
}

impl SubsidyPlan {
    fn grid(&self) -> TradeUpResult<LeverGrid> {
        validate_terms("plan.terms", &self.terms)?;
        self.gates.validate()?;

        let service_fees = self
            .service_fee
            .values("plan.service_fee", Direction::Descending)?;
        let bonuses = self
            .acquisition_bonus
            .values("plan.acquisition_bonus", Direction::Ascending)?;
        let marketing_fees = self
            .marketing_fee
            .values("plan.marketing_fee", Direction::Descending)?;

        for v in &service_fees {
            validate_fraction("plan.service_fee", *v)?;
        }
        for v in &bonuses {
            validate_amount("plan.acquisition_bonus", *v)?;
        }
        for v in &marketing_fees {
            validate_fraction("plan.marketing_fee", *v)?;
        }

        Ok(LeverGrid {
            service_fees,
            bonuses,
            marketing_fees,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsidySearchRequest {
    pub customer: Customer,
    pub vehicle: Vehicle,
    /// Base configuration; the three levers are overwritten during search.
    #[serde(default)]
    pub config: FeeConfig,
    #[serde(default)]
    pub rate_table: RateTable,
    #[serde(default)]
    pub plan: SubsidyPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsidyBatchRequest {
    pub customer: Customer,
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub config: FeeConfig,
    #[serde(default)]
    pub rate_table: RateTable,
    #[serde(default)]
    pub plan: SubsidyPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

/// One priced lever combination with its gate results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsidyCandidate {
    pub term: Months,
    pub service_fee_fraction: Rate,
    pub acquisition_bonus: Money,
    pub marketing_fee_fraction: Rate,
    pub gates: Vec<GateCheck>,
    pub offer: Offer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubsidyOutcome {
    Viable {
        candidate: SubsidyCandidate,
    },
    ClosestMiss {
        candidate: SubsidyCandidate,
        failing_gates: Vec<Gate>,
    },
    /// No combination could even be priced (resolver misses or infeasible).
    NoFeasibleCombination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsidySearchResult {
    pub vehicle_id: String,
    pub outcome: SubsidyOutcome,
    pub combinations_evaluated: usize,
    pub combinations_skipped: usize,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Search one vehicle, wrapped in the standard output envelope.
pub fn search_minimum_subsidy(
    request: &SubsidySearchRequest,
) -> TradeUpResult<ComputationOutput<SubsidySearchResult>> {
    let start = Instant::now();
    validate_common(&request.customer, &request.config, &request.rate_table)?;
    request.vehicle.validate()?;
    let grid = request.plan.grid()?;

    let cache = NpvCache::new();
    let result = search_vehicle(
        &request.customer,
        &request.config,
        &request.rate_table,
        &request.plan,
        &grid,
        &request.vehicle,
        &cache,
    )?;

    let mut warnings = Vec::new();
    if let SubsidyOutcome::ClosestMiss { failing_gates, .. } = &result.outcome {
        warnings.push(format!("No combination cleared every gate; failing: {failing_gates:?}"));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Hierarchical minimum-subsidy search \
         (term > service fee > bonus > marketing fee), greedy-first",
        &serde_json::json!({
            "customer_id": request.customer.customer_id,
            "vehicle_id": request.vehicle.id,
            "gates": request.plan.gates,
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Search many vehicles independently, one vehicle per parallel task.
pub fn search_minimum_subsidy_batch(
    request: &SubsidyBatchRequest,
) -> TradeUpResult<ComputationOutput<Vec<SubsidySearchResult>>> {
    let start = Instant::now();
    validate_common(&request.customer, &request.config, &request.rate_table)?;
    for vehicle in &request.vehicles {
        vehicle.validate()?;
    }
    if request.workers == Some(0) {
        return Err(TradeUpError::invalid("workers", "Worker count must be at least 1."));
    }
    let grid = request.plan.grid()?;
    let workers = request.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let cache = NpvCache::new();
    let search = |vehicle: &Vehicle| {
        search_vehicle(
            &request.customer,
            &request.config,
            &request.rate_table,
            &request.plan,
            &grid,
            vehicle,
            &cache,
        )
    };

    // One thread per vehicle at most.
    let threads = workers.min(request.vehicles.len()).max(1);
    let results: Vec<SubsidySearchResult> = if threads == 1 {
        request.vehicles.iter().map(search).collect::<TradeUpResult<_>>()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?;
        pool.install(|| {
            request
                .vehicles
                .par_iter()
                .map(search)
                .collect::<TradeUpResult<_>>()
        })?
    };

    let viable = results
        .iter()
        .filter(|r| matches!(r.outcome, SubsidyOutcome::Viable { .. }))
        .count();
    log::info!(
        "customer={} subsidy search: {viable}/{} vehicles viable",
        request.customer.customer_id,
        results.len()
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Hierarchical minimum-subsidy search per vehicle, parallel across vehicles",
        &serde_json::json!({
            "customer_id": request.customer.customer_id,
            "vehicles": request.vehicles.len(),
            "workers": workers,
            "gates": request.plan.gates,
        }),
        Vec::new(),
        elapsed,
        results,
    ))
}

fn validate_common(
    customer: &Customer,
    config: &FeeConfig,
    rate_table: &RateTable,
) -> TradeUpResult<()> {
    customer.validate()?;
    config.validate()?;
    rate_table.validate()
}

fn search_vehicle(
    customer: &Customer,
    base_config: &FeeConfig,
    rate_table: &RateTable,
    plan: &SubsidyPlan,
    grid: &LeverGrid,
    vehicle: &Vehicle,
    npv_cache: &NpvCache,
) -> TradeUpResult<SubsidySearchResult> {
    let tiers = TierBands::default();
    let mut evaluated = 0usize;
    let mut skipped = 0usize;
    let mut closest: Option<(Decimal, SubsidyCandidate)> = None;

    for &term in &plan.terms {
        for &service_fee in &grid.service_fees {
            for &bonus in &grid.bonuses {
                for &marketing_fee in &grid.marketing_fees {
                    evaluated += 1;

                    let config = FeeConfig {
                        service_fee_fraction: service_fee,
                        acquisition_bonus: bonus,
                        marketing_fee_fraction: marketing_fee,
                        term_override: None,
                        ..base_config.clone()
                    };
                    let ctx = PricingContext {
                        customer,
                        config: &config,
                        rate_table,
                        tiers: &tiers,
                        npv_cache,
                    };

                    let offer = match price_combination(&ctx, vehicle, term)? {
                        Quote::Offered(offer) => *offer,
                        Quote::Skipped(_) => {
                            skipped += 1;
                            continue;
                        }
                    };

                    let checks = plan.gates.check(&offer);
                    let candidate = SubsidyCandidate {
                        term,
                        service_fee_fraction: service_fee,
                        acquisition_bonus: bonus,
                        marketing_fee_fraction: marketing_fee,
                        gates: checks,
                        offer,
                    };

                    if candidate.gates.iter().all(|c| c.passed) {
                        log::debug!(
                            "vehicle={} viable after {evaluated} combinations",
                            vehicle.id
                        );
                        return Ok(SubsidySearchResult {
                            vehicle_id: vehicle.id.clone(),
                            outcome: SubsidyOutcome::Viable { candidate },
                            combinations_evaluated: evaluated,
                            combinations_skipped: skipped,
                        });
                    }

                    let distance = candidate.offer.payment_delta.abs();
                    let closer = match &closest {
                        Some((best, _)) => distance < *best,
                        None => true,
                    };
                    if closer {
                        closest = Some((distance, candidate));
                    }
                }
            }
        }
    }

    let outcome = match closest {
        Some((_, candidate)) => SubsidyOutcome::ClosestMiss {
            failing_gates: failing(&candidate.gates),
            candidate,
        },
        None => SubsidyOutcome::NoFeasibleCombination,
    };

    Ok(SubsidySearchResult {
        vehicle_id: vehicle.id.clone(),
        outcome,
        combinations_evaluated: evaluated,
        combinations_skipped: skipped,
    })
}
