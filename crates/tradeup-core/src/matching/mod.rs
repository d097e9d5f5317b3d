pub mod matcher;
pub mod offer;
pub mod tiers;
