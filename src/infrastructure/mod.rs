// src/infrastructure/mod.rs
pub mod calendar;
pub mod memory;
pub mod scarcity;

pub use calendar::{AlwaysOpen, TradingHours};
pub use memory::{InMemoryStorage, Retention};
pub use scarcity::{FlatVaultingFee, NoScarcity};
