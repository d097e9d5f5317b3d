pub mod offers;
pub mod schedule;
pub mod subsidy;
