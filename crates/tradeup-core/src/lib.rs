pub mod amortization;
pub mod config;
pub mod error;
pub mod pricing;
pub mod time_value;
pub mod types;

#[cfg(feature = "matching")]
pub mod matching;

#[cfg(feature = "subsidy")]
pub mod subsidy;

pub use error::TradeUpError;
pub use types::*;

/// Standard result type for all trade-up engine operations
pub type TradeUpResult<T> = Result<T, TradeUpError>;
