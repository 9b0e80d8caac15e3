// src/market_data/mod.rs
pub mod aggregator;

pub use aggregator::{BarDraws, OhlcAggregator};
