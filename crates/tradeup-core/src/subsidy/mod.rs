pub mod gates;
pub mod search;
