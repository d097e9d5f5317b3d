use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::validate_amount;
use crate::error::TradeUpError;
use crate::TradeUpResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Loan terms and cycle lengths, in months.
pub type Months = u32;

/// The vehicle the customer is currently financing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentVehicle {
    pub price: Money,
    #[serde(default)]
    pub age_years: u32,
    #[serde(default)]
    pub mileage: u32,
}

/// Snapshot of an existing finance customer at offer time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub current_monthly_payment: Money,
    /// Trade-in equity available in the current vehicle.
    pub vehicle_equity: Money,
    pub risk_class: String,
    /// Row index into the down-payment matrix.
    pub risk_ordinal: u32,
    pub current_vehicle: CurrentVehicle,
}

impl Customer {
    pub fn validate(&self) -> TradeUpResult<()> {
        if self.current_monthly_payment <= Decimal::ZERO {
            return Err(TradeUpError::invalid(
                "customer.current_monthly_payment",
                "Current monthly payment must be positive.",
            ));
        }
        if self.vehicle_equity < Decimal::ZERO {
            return Err(TradeUpError::invalid(
                "customer.vehicle_equity",
                "Vehicle equity cannot be negative.",
            ));
        }
        if self.current_vehicle.price < Decimal::ZERO {
            return Err(TradeUpError::invalid(
                "customer.current_vehicle.price",
                "Current vehicle price cannot be negative.",
            ));
        }
        validate_amount("customer.current_monthly_payment", self.current_monthly_payment)?;
        validate_amount("customer.vehicle_equity", self.vehicle_equity)?;
        validate_amount("customer.current_vehicle.price", self.current_vehicle.price)?;
        if self.risk_class.trim().is_empty() {
            return Err(TradeUpError::invalid(
                "customer.risk_class",
                "Risk class must not be empty.",
            ));
        }
        Ok(())
    }
}

/// A candidate replacement vehicle from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub price: Money,
    #[serde(default)]
    pub mileage: u32,
    pub year: i32,
}

impl Vehicle {
    pub fn validate(&self) -> TradeUpResult<()> {
        if self.price <= Decimal::ZERO {
            return Err(TradeUpError::invalid(
                "vehicle.price",
                format!("Vehicle {} must have a positive price.", self.id),
            ));
        }
        validate_amount("vehicle.price", self.price)
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
