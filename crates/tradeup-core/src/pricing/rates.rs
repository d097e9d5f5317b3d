//! Rate & down-payment resolution.
//!
//! A risk class maps to a base annual nominal rate; long terms carry a
//! surcharge; the minimum down-payment fraction comes from a matrix keyed by
//! (risk ordinal, term). A missing table entry is a resolver miss, which is
//! an ordinary outcome the caller skips over, not an error.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{validate_rate, validate_term};
use crate::error::TradeUpError;
use crate::types::{Months, Rate};
use crate::TradeUpResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Resolved pricing for one (risk, term) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub annual_rate: Rate,
    pub min_down_payment_fraction: Rate,
}

/// Why a (risk, term) pair could not be priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolverMiss {
    UnknownRiskClass { risk_class: String },
    NoDownPaymentEntry { risk_ordinal: u32, term: Months },
}

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved(RateQuote),
    Miss(ResolverMiss),
}

/// Base rates, term surcharges and the down-payment matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    /// Risk class -> base annual nominal rate.
    pub base_rates: BTreeMap<String, Rate>,
    /// Term -> additive surcharge on the base rate.
    #[serde(default = "default_term_surcharges")]
    pub term_surcharges: BTreeMap<Months, Rate>,
    /// Risk ordinal -> term -> minimum down-payment fraction of price.
    pub down_payment_matrix: BTreeMap<u32, BTreeMap<Months, Rate>>,
}

fn default_term_surcharges() -> BTreeMap<Months, Rate> {
    BTreeMap::from([(60, dec!(0.010)), (72, dec!(0.015))])
}

impl Default for RateTable {
    fn default() -> Self {
        let base_rates: BTreeMap<String, Rate> = [
            ("AAA", dec!(0.1899)),
            ("AA", dec!(0.1999)),
            ("A", dec!(0.2099)),
            ("B", dec!(0.2299)),
            ("C", dec!(0.2499)),
            ("D", dec!(0.2699)),
            ("E", dec!(0.2999)),
        ]
        .into_iter()
        .map(|(class, rate)| (class.to_string(), rate))
        .collect();

        // Rows follow the ordinal of the classes above; riskier rows lose the
        // longest terms.
        #[rustfmt::skip]
        let rows: [&[(Months, Rate)]; 7] = [
            &[
                (12, dec!(0.10)), (24, dec!(0.10)), (36, dec!(0.10)),
                (48, dec!(0.15)), (60, dec!(0.20)), (72, dec!(0.25)),
            ],
            &[
                (12, dec!(0.10)), (24, dec!(0.15)), (36, dec!(0.15)),
                (48, dec!(0.20)), (60, dec!(0.25)), (72, dec!(0.30)),
            ],
            &[
                (12, dec!(0.15)), (24, dec!(0.15)), (36, dec!(0.20)),
                (48, dec!(0.25)), (60, dec!(0.30)), (72, dec!(0.35)),
            ],
            &[
                (12, dec!(0.20)), (24, dec!(0.20)), (36, dec!(0.25)),
                (48, dec!(0.30)), (60, dec!(0.35)),
            ],
            &[(12, dec!(0.25)), (24, dec!(0.25)), (36, dec!(0.30)), (48, dec!(0.35))],
            &[(12, dec!(0.30)), (24, dec!(0.30)), (36, dec!(0.35)), (48, dec!(0.40))],
            &[(12, dec!(0.35)), (24, dec!(0.40)), (36, dec!(0.45))],
        ];
        let down_payment_matrix: BTreeMap<u32, BTreeMap<Months, Rate>> = rows
            .iter()
            .enumerate()
            .map(|(ordinal, row)| (ordinal as u32, row.iter().copied().collect::<BTreeMap<_, _>>()))
            .collect();

        RateTable {
            base_rates,
            term_surcharges: default_term_surcharges(),
            down_payment_matrix,
        }
    }
}

impl RateTable {
    pub fn validate(&self) -> TradeUpResult<()> {
        if self.base_rates.is_empty() {
            return Err(TradeUpError::invalid(
                "rate_table.base_rates",
                "At least one risk class is required.",
            ));
        }
        for (class, rate) in &self.base_rates {
            validate_rate(&format!("rate_table.base_rates.{class}"), *rate)?;
        }
        for (term, surcharge) in &self.term_surcharges {
            validate_term("rate_table.term_surcharges", *term)?;
            validate_rate(&format!("rate_table.term_surcharges.{term}"), *surcharge)?;
        }
        for (ordinal, row) in &self.down_payment_matrix {
            for (term, fraction) in row {
                validate_term("rate_table.down_payment_matrix", *term)?;
                if *fraction < Decimal::ZERO || *fraction > Decimal::ONE {
                    return Err(TradeUpError::invalid(
                        &format!("rate_table.down_payment_matrix.{ordinal}.{term}"),
                        "Down-payment fraction must be in [0, 1].",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolve the nominal rate and minimum down payment for a risk/term pair.
    ///
    /// `rate_override` replaces the computed rate verbatim, surcharge
    /// included; the down-payment lookup still applies.
    pub fn resolve(
        &self,
        risk_class: &str,
        risk_ordinal: u32,
        term: Months,
        rate_override: Option<Rate>,
    ) -> TradeUpResult<Resolution> {
        validate_term("term", term)?;
        if let Some(rate) = rate_override {
            validate_rate("rate_override", rate)?;
        }

        let annual_rate = match rate_override {
            Some(rate) => rate,
            None => match self.base_rates.get(risk_class) {
                Some(base) => *base + self.surcharge(term),
                None => {
                    return Ok(Resolution::Miss(ResolverMiss::UnknownRiskClass {
                        risk_class: risk_class.to_string(),
                    }))
                }
            },
        };

        let fraction = self
            .down_payment_matrix
            .get(&risk_ordinal)
            .and_then(|row| row.get(&term));

        match fraction {
            Some(fraction) => Ok(Resolution::Resolved(RateQuote {
                annual_rate,
                min_down_payment_fraction: *fraction,
            })),
            None => Ok(Resolution::Miss(ResolverMiss::NoDownPaymentEntry {
                risk_ordinal,
                term,
            })),
        }
    }

    fn surcharge(&self, term: Months) -> Rate {
        self.term_surcharges
            .get(&term)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(r: Resolution) -> RateQuote {
        match r {
            Resolution::Resolved(q) => q,
            Resolution::Miss(m) => panic!("unexpected miss: {m:?}"),
        }
    }

    #[test]
    fn test_base_rate_unaffected_below_sixty() {
        let table = RateTable::default();
        for term in [12, 24, 36, 48] {
            let q = resolved(table.resolve("A", 2, term, None).unwrap());
            assert_eq!(q.annual_rate, dec!(0.2099));
        }
    }

    #[test]
    fn test_long_term_surcharges() {
        let table = RateTable::default();
        let q60 = resolved(table.resolve("AAA", 0, 60, None).unwrap());
        let q72 = resolved(table.resolve("AAA", 0, 72, None).unwrap());
        assert_eq!(q60.annual_rate, dec!(0.1999));
        assert_eq!(q72.annual_rate, dec!(0.2049));
    }

    #[test]
    fn test_override_replaces_rate_verbatim() {
        let table = RateTable::default();
        let q = resolved(table.resolve("AAA", 0, 72, Some(dec!(0.20))).unwrap());
        assert_eq!(q.annual_rate, dec!(0.20));
        assert_eq!(q.min_down_payment_fraction, dec!(0.25));
    }

    #[test]
    fn test_missing_matrix_entry_is_a_miss() {
        let table = RateTable::default();
        let r = table.resolve("E", 6, 72, None).unwrap();
        assert_eq!(
            r,
            Resolution::Miss(ResolverMiss::NoDownPaymentEntry {
                risk_ordinal: 6,
                term: 72
            })
        );
    }

    #[test]
    fn test_unknown_risk_class_is_a_miss() {
        let table = RateTable::default();
        let r = table.resolve("ZZ", 0, 12, None).unwrap();
        assert!(matches!(
            r,
            Resolution::Miss(ResolverMiss::UnknownRiskClass { .. })
        ));
    }

    #[test]
    fn test_out_of_range_override_is_invalid() {
        let table = RateTable::default();
        assert!(table.resolve("A", 2, 12, Some(dec!(1.5))).is_err());
        assert!(table.resolve("A", 2, 0, None).is_err());
    }

    #[test]
    fn test_default_table_validates() {
        assert!(RateTable::default().validate().is_ok());
    }
}
