//! Brute-force offer matching over (vehicle x term).
//!
//! The eligible vehicle list is cut into contiguous shards, one per worker.
//! Each worker prices its shard sequentially and returns its own offers and
//! counters; shards are merged in order once all have completed, so the
//! output does not depend on the worker count. The NPV memo is the only
//! state shared between workers.

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;

use crate::amortization::npv::NpvCache;
use crate::config::{validate_terms, FeeConfig, DEFAULT_TERMS};
use crate::error::TradeUpError;
use crate::matching::offer::{price_combination, Offer, PricingContext, Quote, SkipReason};
use crate::matching::tiers::{Tier, TierBands};
use crate::pricing::rates::RateTable;
use crate::types::*;
use crate::TradeUpResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

fn default_terms() -> Vec<Months> {
    DEFAULT_TERMS.to_vec()
}

/// Everything the matcher needs; omitted configuration falls back to engine
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRequest {
    pub customer: Customer,
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub config: FeeConfig,
    #[serde(default)]
    pub rate_table: RateTable,
    #[serde(default)]
    pub tiers: TierBands,
    #[serde(default = "default_terms")]
    pub terms: Vec<Months>,
    /// Worker count; defaults to the available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl OfferRequest {
    pub fn new(customer: Customer, vehicles: Vec<Vehicle>, config: FeeConfig) -> Self {
        OfferRequest {
            customer,
            vehicles,
            config,
            rate_table: RateTable::default(),
            tiers: TierBands::default(),
            terms: default_terms(),
            workers: None,
        }
    }

    pub fn validate(&self) -> TradeUpResult<()> {
        self.customer.validate()?;
        for vehicle in &self.vehicles {
            vehicle.validate()?;
        }
        self.config.validate()?;
        self.rate_table.validate()?;
        self.tiers.validate()?;
        validate_terms("terms", &self.terms)?;
        if self.workers == Some(0) {
            return Err(TradeUpError::invalid("workers", "Worker count must be at least 1."));
        }
        Ok(())
    }

    pub fn pricing_context<'a>(&'a self, npv_cache: &'a NpvCache) -> PricingContext<'a> {
        PricingContext {
            customer: &self.customer,
            config: &self.config,
            rate_table: &self.rate_table,
            tiers: &self.tiers,
            npv_cache,
        }
    }

    fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Counters describing one matcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub vehicles_considered: usize,
    pub vehicles_prefiltered: usize,
    pub combinations_evaluated: usize,
    pub resolver_misses: usize,
    pub infeasible: usize,
    pub dropped_out_of_range: usize,
    pub dropped_nonpositive_npv: usize,
    pub refresh_offers: usize,
    pub upgrade_offers: usize,
    pub max_upgrade_offers: usize,
    pub workers: usize,
}

impl MatchStats {
    fn absorb(&mut self, other: &MatchStats) {
        self.combinations_evaluated += other.combinations_evaluated;
        self.resolver_misses += other.resolver_misses;
        self.infeasible += other.infeasible;
        self.dropped_out_of_range += other.dropped_out_of_range;
        self.dropped_nonpositive_npv += other.dropped_nonpositive_npv;
    }

    pub fn total_offers(&self) -> usize {
        self.refresh_offers + self.upgrade_offers + self.max_upgrade_offers
    }
}

/// Offers per tier, each sorted by NPV descending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TieredOffers {
    pub refresh: Vec<Offer>,
    pub upgrade: Vec<Offer>,
    pub max_upgrade: Vec<Offer>,
}

impl TieredOffers {
    pub fn get(&self, tier: Tier) -> &[Offer] {
        match tier {
            Tier::Refresh => &self.refresh,
            Tier::Upgrade => &self.upgrade,
            Tier::MaxUpgrade => &self.max_upgrade,
            Tier::OutOfRange => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Offer> {
        self.refresh
            .iter()
            .chain(self.upgrade.iter())
            .chain(self.max_upgrade.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferResult {
    pub customer_id: String,
    pub tiers: TieredOffers,
    pub stats: MatchStats,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Generate all tiered offers wrapped in the standard output envelope.
pub fn generate_offers(request: &OfferRequest) -> TradeUpResult<ComputationOutput<OfferResult>> {
    let start = Instant::now();
    let cache = NpvCache::new();
    let result = match_offers(request, &cache)?;

    let mut warnings = Vec::new();
    if result.stats.vehicles_prefiltered == result.stats.vehicles_considered
        && result.stats.vehicles_considered > 0
    {
        warnings.push("No vehicle is priced above the customer's current vehicle".to_string());
    }
    if result.stats.total_offers() == 0 {
        warnings.push("No viable offer was produced".to_string());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Brute-force vehicle x term matching with payment-delta tiering, ranked by interest NPV",
        &serde_json::json!({
            "customer_id": request.customer.customer_id,
            "terms": request.config.candidate_terms(&request.terms),
            "rate_override": request.config.rate_override.map(|r| r.to_string()),
            "marketing_fee_base": "vehicle_price",
            "workers": result.stats.workers,
        }),
        warnings,
        elapsed,
        result,
    ))
}

/// Match offers using a caller-supplied NPV memo. The memo is reusable across
/// runs but never evicts; clear it between unrelated batches.
pub fn match_offers(request: &OfferRequest, npv_cache: &NpvCache) -> TradeUpResult<OfferResult> {
    request.validate()?;

    let terms = request.config.candidate_terms(&request.terms);
    let current_price = request.customer.current_vehicle.price;
    let eligible: Vec<&Vehicle> = request
        .vehicles
        .iter()
        .filter(|v| v.price > current_price)
        .collect();

    let workers = request.worker_count();
    let mut stats = MatchStats {
        vehicles_considered: request.vehicles.len(),
        vehicles_prefiltered: request.vehicles.len() - eligible.len(),
        workers,
        ..MatchStats::default()
    };

    let ctx = request.pricing_context(npv_cache);
    let shard_outcomes = run_sharded(&ctx, &eligible, &terms, workers)?;

    let mut tiers = TieredOffers::default();
    for outcome in shard_outcomes {
        stats.absorb(&outcome.stats);
        for offer in outcome.offers {
            match offer.tier {
                Tier::Refresh => tiers.refresh.push(offer),
                Tier::Upgrade => tiers.upgrade.push(offer),
                Tier::MaxUpgrade => tiers.max_upgrade.push(offer),
                Tier::OutOfRange => {
                    return Err(TradeUpError::internal(
                        "out-of-range offer survived shard filtering",
                    ));
                }
            }
        }
    }

    tiers.refresh.sort_by(rank);
    tiers.upgrade.sort_by(rank);
    tiers.max_upgrade.sort_by(rank);

    stats.refresh_offers = tiers.refresh.len();
    stats.upgrade_offers = tiers.upgrade.len();
    stats.max_upgrade_offers = tiers.max_upgrade.len();

    log::info!(
        "customer={} matched {} offers from {} combinations \
         ({} misses, {} infeasible) on {} workers",
        request.customer.customer_id,
        stats.total_offers(),
        stats.combinations_evaluated,
        stats.resolver_misses,
        stats.infeasible,
        workers
    );

    Ok(OfferResult {
        customer_id: request.customer.customer_id.clone(),
        tiers,
        stats,
    })
}

// ---------------------------------------------------------------------------
// Sharding
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ShardOutcome {
    offers: Vec<Offer>,
    stats: MatchStats,
}

fn run_sharded(
    ctx: &PricingContext<'_>,
    eligible: &[&Vehicle],
    terms: &[Months],
    workers: usize,
) -> TradeUpResult<Vec<ShardOutcome>> {
    if eligible.is_empty() {
        return Ok(Vec::new());
    }

    let shard_size = eligible.len().div_ceil(workers).max(1);
    let shards: Vec<&[&Vehicle]> = eligible.chunks(shard_size).collect();

    if shards.len() == 1 {
        return Ok(vec![price_shard(ctx, shards[0], terms)?]);
    }

    // One thread per shard at most.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.min(shards.len()))
        .build()?;
    pool.install(|| {
        shards
            .par_iter()
            .map(|shard| price_shard(ctx, shard, terms))
            .collect()
    })
}

/// Price every (vehicle, term) in one shard, sequentially.
fn price_shard(
    ctx: &PricingContext<'_>,
    shard: &[&Vehicle],
    terms: &[Months],
) -> TradeUpResult<ShardOutcome> {
    let mut outcome = ShardOutcome::default();

    for vehicle in shard {
        for &term in terms {
            outcome.stats.combinations_evaluated += 1;
            match price_combination(ctx, vehicle, term)? {
                Quote::Offered(offer) => {
                    if offer.tier == Tier::OutOfRange {
                        outcome.stats.dropped_out_of_range += 1;
                    } else if offer.npv <= Decimal::ZERO {
                        outcome.stats.dropped_nonpositive_npv += 1;
                    } else {
                        outcome.offers.push(*offer);
                    }
                }
                Quote::Skipped(SkipReason::ResolverMiss(miss)) => {
                    log::debug!("vehicle={} term={term} resolver miss: {miss:?}", vehicle.id);
                    outcome.stats.resolver_misses += 1;
                }
                Quote::Skipped(SkipReason::Infeasible(why)) => {
                    log::debug!("vehicle={} term={term} infeasible: {why:?}", vehicle.id);
                    outcome.stats.infeasible += 1;
                }
            }
        }
    }

    Ok(outcome)
}

/// NPV descending, then vehicle id and term for a stable total order.
fn rank(a: &Offer, b: &Offer) -> Ordering {
    b.npv
        .cmp(&a.npv)
        .then_with(|| a.vehicle_id.cmp(&b.vehicle_id))
        .then_with(|| a.term.cmp(&b.term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer() -> Customer {
        Customer {
            customer_id: "C-1".into(),
            current_monthly_payment: dec!(9000),
            vehicle_equity: dec!(180000),
            risk_class: "AA".into(),
            risk_ordinal: 1,
            current_vehicle: CurrentVehicle {
                price: dec!(220000),
                age_years: 3,
                mileage: 45000,
            },
        }
    }

    fn vehicle(id: &str, price: Decimal) -> Vehicle {
        Vehicle {
            id: id.into(),
            brand: "Mazda".into(),
            model: "CX-5".into(),
            price,
            mileage: 20000,
            year: 2022,
        }
    }

    #[test]
    fn test_prefilter_excludes_cheaper_vehicles() {
        let request = OfferRequest::new(
            customer(),
            vec![vehicle("cheap", dec!(200000)), vehicle("same", dec!(220000))],
            FeeConfig::default(),
        );
        let result = match_offers(&request, &NpvCache::new()).unwrap();
        assert_eq!(result.stats.vehicles_prefiltered, 2);
        assert_eq!(result.stats.combinations_evaluated, 0);
        assert_eq!(result.stats.total_offers(), 0);
    }

    #[test]
    fn test_every_combination_is_accounted_for() {
        let request = OfferRequest::new(
            customer(),
            vec![vehicle("v1", dec!(260000)), vehicle("v2", dec!(480000))],
            FeeConfig::default(),
        );
        let result = match_offers(&request, &NpvCache::new()).unwrap();
        let s = &result.stats;
        assert_eq!(s.combinations_evaluated, 12);
        assert_eq!(
            s.combinations_evaluated,
            s.resolver_misses
                + s.infeasible
                + s.dropped_out_of_range
                + s.dropped_nonpositive_npv
                + s.total_offers()
        );
    }

    #[test]
    fn test_tiers_sorted_by_npv_descending() {
        let vehicles = (0..8)
            .map(|i| vehicle(&format!("v{i}"), dec!(240000) + Decimal::from(i * 15000)))
            .collect();
        let request = OfferRequest::new(customer(), vehicles, FeeConfig::default());
        let result = match_offers(&request, &NpvCache::new()).unwrap();
        for tier in [Tier::Refresh, Tier::Upgrade, Tier::MaxUpgrade] {
            let offers = result.tiers.get(tier);
            for pair in offers.windows(2) {
                assert!(pair[0].npv >= pair[1].npv);
            }
            for offer in offers {
                assert_eq!(offer.tier, tier);
            }
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut request = OfferRequest::new(customer(), vec![], FeeConfig::default());
        request.workers = Some(0);
        assert!(match_offers(&request, &NpvCache::new()).is_err());
    }

    #[test]
    fn test_invalid_vehicle_price_is_fatal() {
        let request = OfferRequest::new(
            customer(),
            vec![vehicle("bad", dec!(-10))],
            FeeConfig::default(),
        );
        assert!(matches!(
            match_offers(&request, &NpvCache::new()),
            Err(TradeUpError::InvalidInput { .. })
        ));
    }
}
