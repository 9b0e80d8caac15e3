// src/trading/mod.rs
pub mod execution;
pub mod modifiers;
pub mod scheduler;
pub mod settlement;
pub mod validation;

use rust_decimal::Decimal;

use crate::config::MarketConfig;
use crate::domain::orders::OrderSide;

pub use execution::{ExecutionEngine, ExecutionOutcome, ExecutionReport};
pub use modifiers::{ModifierChain, ModifierContext, PriceModifier};
pub use scheduler::PendingOrderScheduler;
pub use validation::{AdmissionContext, OrderValidator};

/// Largest slippage charged on a market order
pub const MAX_SLIPPAGE: f64 = 0.05;

/// Commission on a fill, never below the configured minimum fee
pub fn commission(notional: Decimal, config: &MarketConfig) -> Decimal {
    (notional * config.commission_rate)
        .round_dp(2)
        .max(config.min_fee)
}

/// Fraction of the price lost to market impact for a market order of `quantity`.
pub fn slippage(quantity: f64, price: f64, daily_volume: u64, factor: f64) -> f64 {
    let traded = daily_volume as f64 * price;
    let denominator = if traded > 0.0 { traded } else { 1.0 };
    ((quantity * price) / denominator * factor).min(MAX_SLIPPAGE)
}

/// Apply slippage against the trader.
pub fn apply_slippage(side: OrderSide, price: f64, slippage: f64) -> f64 {
    match side {
        OrderSide::Buy => price * (1.0 + slippage),
        OrderSide::Sell => price * (1.0 - slippage),
    }
}
