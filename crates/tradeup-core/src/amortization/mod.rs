pub mod npv;
pub mod payment;
pub mod schedule;
