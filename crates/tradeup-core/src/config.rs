//! Fee and rate configuration supplied by the caller.
//!
//! Every field has an engine default, so a partial JSON/YAML document
//! deserialises into a complete configuration. Values are range-checked by
//! [`FeeConfig::validate`] before any arithmetic; nothing is clamped.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::TradeUpError;
use crate::types::{Money, Months, Rate};
use crate::TradeUpResult;

/// Insurance is written as a recurring 12-month loan under the main loan.
pub const INSURANCE_CYCLE_MONTHS: Months = 12;

/// Candidate terms offered when the caller does not override them.
pub const DEFAULT_TERMS: [Months; 6] = [12, 24, 36, 48, 60, 72];

pub const MIN_TERM_MONTHS: Months = INSURANCE_CYCLE_MONTHS;
pub const MAX_TERM_MONTHS: Months = 120;

/// Largest accepted monetary amount. At the maximum rate, tax and term the
/// level-payment growth factor is about 1e8, so amounts up to this bound keep
/// every intermediate product well inside `Decimal`'s range.
pub const MAX_AMOUNT: Money = dec!(1_000_000_000_000);

fn default_service_fee_fraction() -> Rate {
    dec!(0.04)
}

fn default_marketing_fee_fraction() -> Rate {
    dec!(0.04)
}

fn default_loyalty_program_amount() -> Money {
    dec!(25000)
}

fn default_insurance_amount() -> Money {
    dec!(10999)
}

fn default_gps_monthly_fee() -> Money {
    dec!(350)
}

fn default_gps_install_fee() -> Money {
    dec!(750)
}

fn default_tax_rate() -> Rate {
    dec!(0.16)
}

/// Flat fee/rate configuration for one offer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Service fee as a fraction of vehicle price; financed in its own bucket.
    #[serde(default = "default_service_fee_fraction")]
    pub service_fee_fraction: Rate,
    /// Marketing fee as a fraction of vehicle price; deducted from equity.
    #[serde(default = "default_marketing_fee_fraction")]
    pub marketing_fee_fraction: Rate,
    /// Acquisition bonus added to the customer's equity.
    #[serde(default)]
    pub acquisition_bonus: Money,
    /// Loyalty-program amount; 0 disables the program.
    #[serde(default = "default_loyalty_program_amount")]
    pub loyalty_program_amount: Money,
    #[serde(default = "default_insurance_amount")]
    pub insurance_amount: Money,
    /// Pre-tax GPS monthly fee.
    #[serde(default = "default_gps_monthly_fee")]
    pub gps_monthly_fee: Money,
    /// Pre-tax GPS install fee.
    #[serde(default = "default_gps_install_fee")]
    pub gps_install_fee: Money,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Rate,
    /// Replaces the resolved nominal rate verbatim when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_override: Option<Rate>,
    /// Restricts the candidate terms to this single term when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_override: Option<Months>,
}

impl Default for FeeConfig {
    fn default() -> Self {
        FeeConfig {
            service_fee_fraction: default_service_fee_fraction(),
            marketing_fee_fraction: default_marketing_fee_fraction(),
            acquisition_bonus: Decimal::ZERO,
            loyalty_program_amount: default_loyalty_program_amount(),
            insurance_amount: default_insurance_amount(),
            gps_monthly_fee: default_gps_monthly_fee(),
            gps_install_fee: default_gps_install_fee(),
            tax_rate: default_tax_rate(),
            rate_override: None,
            term_override: None,
        }
    }
}

impl FeeConfig {
    pub fn validate(&self) -> TradeUpResult<()> {
        validate_fraction("service_fee_fraction", self.service_fee_fraction)?;
        validate_fraction("marketing_fee_fraction", self.marketing_fee_fraction)?;
        validate_amount("acquisition_bonus", self.acquisition_bonus)?;
        validate_amount("loyalty_program_amount", self.loyalty_program_amount)?;
        validate_amount("insurance_amount", self.insurance_amount)?;
        validate_amount("gps_monthly_fee", self.gps_monthly_fee)?;
        validate_amount("gps_install_fee", self.gps_install_fee)?;
        validate_rate("tax_rate", self.tax_rate)?;
        if let Some(rate) = self.rate_override {
            validate_rate("rate_override", rate)?;
        }
        if let Some(term) = self.term_override {
            validate_term("term_override", term)?;
        }
        Ok(())
    }

    /// Terms to enumerate: the override alone, or the supplied candidate set.
    pub fn candidate_terms(&self, terms: &[Months]) -> Vec<Months> {
        match self.term_override {
            Some(term) => vec![term],
            None => terms.to_vec(),
        }
    }

    /// GPS install fee including tax, charged once up front.
    pub fn gps_install_with_tax(&self) -> Money {
        self.gps_install_fee * (Decimal::ONE + self.tax_rate)
    }
}

/// Fractions of price: `[0, 1)`.
pub fn validate_fraction(field: &str, value: Rate) -> TradeUpResult<()> {
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(TradeUpError::invalid(
            field,
            format!("Fraction must be in [0, 1), got {value}."),
        ));
    }
    Ok(())
}

/// Annual rates: `[0, 1]`.
pub fn validate_rate(field: &str, value: Rate) -> TradeUpResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(TradeUpError::invalid(
            field,
            format!("Rate must be in [0, 1], got {value}."),
        ));
    }
    Ok(())
}

pub fn validate_amount(field: &str, value: Money) -> TradeUpResult<()> {
    if value < Decimal::ZERO {
        return Err(TradeUpError::invalid(
            field,
            format!("Amount cannot be negative, got {value}."),
        ));
    }
    if value > MAX_AMOUNT {
        return Err(TradeUpError::invalid(
            field,
            format!("Amount cannot exceed {MAX_AMOUNT}, got {value}."),
        ));
    }
    Ok(())
}

pub fn validate_term(field: &str, term: Months) -> TradeUpResult<()> {
    if !(MIN_TERM_MONTHS..=MAX_TERM_MONTHS).contains(&term) {
        return Err(TradeUpError::invalid(
            field,
            format!(
                "Term must be between {MIN_TERM_MONTHS} and {MAX_TERM_MONTHS} months, got {term}."
            ),
        ));
    }
    Ok(())
}

pub fn validate_terms(field: &str, terms: &[Months]) -> TradeUpResult<()> {
    if terms.is_empty() {
        return Err(TradeUpError::invalid(field, "At least one term is required."));
    }
    for &term in terms {
        validate_term(field, term)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_gets_defaults() {
        let cfg: FeeConfig = serde_json::from_str(r#"{"tax_rate": "0.08"}"#).unwrap();
        assert_eq!(cfg.tax_rate, dec!(0.08));
        assert_eq!(cfg.service_fee_fraction, dec!(0.04));
        assert_eq!(cfg.insurance_amount, dec!(10999));
        assert!(cfg.rate_override.is_none());
    }

    #[test]
    fn test_empty_document_equals_default() {
        let cfg: FeeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, FeeConfig::default());
    }

    #[test]
    fn test_negative_fee_rejected() {
        let cfg = FeeConfig {
            gps_monthly_fee: dec!(-1),
            ..FeeConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(TradeUpError::InvalidInput { ref field, .. }) if field == "gps_monthly_fee"
        ));
    }

    #[test]
    fn test_amount_above_ceiling_rejected() {
        let cfg = FeeConfig {
            insurance_amount: MAX_AMOUNT + Decimal::ONE,
            ..FeeConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(TradeUpError::InvalidInput { ref field, .. }) if field == "insurance_amount"
        ));
        assert!(validate_amount("x", MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_fraction_of_one_rejected() {
        let cfg = FeeConfig {
            service_fee_fraction: Decimal::ONE,
            ..FeeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_short_term_override_rejected() {
        let cfg = FeeConfig {
            term_override: Some(6),
            ..FeeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_term_override_replaces_candidates() {
        let cfg = FeeConfig {
            term_override: Some(48),
            ..FeeConfig::default()
        };
        assert_eq!(cfg.candidate_terms(&DEFAULT_TERMS), vec![48]);
        assert_eq!(FeeConfig::default().candidate_terms(&DEFAULT_TERMS).len(), 6);
    }
}
