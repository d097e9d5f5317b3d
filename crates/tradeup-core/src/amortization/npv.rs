//! Net present value of a loan's interest-income stream.
//!
//! The cash flows are the main bucket's tax-inclusive interest in each
//! period, taken from the payment component calculator, discounted at the
//! tax-inclusive monthly rate. NPV ranks and gates offers; it is never the
//! payment itself.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::amortization::payment::{payment_component, ComponentInput};
use crate::config::{validate_amount, validate_rate, validate_term};
use crate::error::TradeUpError;
use crate::time_value::{monthly_rate, present_value};
use crate::types::{Money, Months, Rate};
use crate::TradeUpResult;

/// Present value of the main bucket's tax-inclusive interest stream.
pub fn interest_npv(
    principal: Money,
    annual_rate: Rate,
    term: Months,
    tax_rate: Rate,
) -> TradeUpResult<Money> {
    if principal < Decimal::ZERO {
        return Err(TradeUpError::invalid("principal", "Principal cannot be negative."));
    }
    validate_amount("principal", principal)?;
    validate_rate("annual_rate", annual_rate)?;
    validate_rate("tax_rate", tax_rate)?;
    validate_term("term", term)?;

    let mut flows = Vec::with_capacity(term as usize);
    for period in 1..=term {
        let c = payment_component(&ComponentInput {
            principal,
            cycle_months: term,
            period,
            annual_rate,
            tax_rate,
        })?;
        flows.push(c.interest);
    }

    let discount_rate = monthly_rate(annual_rate) * (Decimal::ONE + tax_rate);
    present_value(discount_rate, &flows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NpvKey {
    principal: Money,
    annual_rate: Rate,
    term: Months,
    tax_rate: Rate,
}

/// Memo of [`interest_npv`] keyed by its value inputs. Safe to share across
/// worker threads.
///
/// There is no eviction: every distinct (principal, rate, term, tax) adds an
/// entry. A long-lived cache shared across runs grows with the number of
/// distinct vehicles priced; call [`NpvCache::clear`] or drop it between
/// batches.
#[derive(Debug, Default)]
pub struct NpvCache {
    entries: RwLock<HashMap<NpvKey, Money>>,
}

impl NpvCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every memoized value.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| {
            log::warn!("NPV cache write lock was poisoned, recovering");
            poisoned.into_inner()
        });
        log::debug!("clearing {} NPV cache entries", entries.len());
        entries.clear();
    }

    /// Return the cached NPV, computing and storing it on a miss.
    pub fn get_or_compute(
        &self,
        principal: Money,
        annual_rate: Rate,
        term: Months,
        tax_rate: Rate,
    ) -> TradeUpResult<Money> {
        let key = NpvKey {
            principal: principal.normalize(),
            annual_rate: annual_rate.normalize(),
            term,
            tax_rate: tax_rate.normalize(),
        };

        {
            let entries = self.entries.read().unwrap_or_else(|poisoned| {
                log::warn!("NPV cache read lock was poisoned, recovering");
                poisoned.into_inner()
            });
            if let Some(value) = entries.get(&key) {
                return Ok(*value);
            }
        }

        let value = interest_npv(principal, annual_rate, term, tax_rate)?;

        let mut entries = self.entries.write().unwrap_or_else(|poisoned| {
            log::warn!("NPV cache write lock was poisoned, recovering");
            poisoned.into_inner()
        });
        entries.entry(key).or_insert(value);
        Ok(value)
    }
}
