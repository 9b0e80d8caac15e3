// src/lib.rs
// Main library module declarations

pub mod analysis;
pub mod config;
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod market_data;
pub mod simulation;
pub mod trading;

pub use config::Config;
pub use engine::{MarketEngine, MarketOverview, OrderSubmission, TickSummary};
