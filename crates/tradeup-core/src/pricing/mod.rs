pub mod fees;
pub mod rates;
