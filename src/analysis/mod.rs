// src/analysis/mod.rs
pub mod indicators;

pub use indicators::{
    calculate_bollinger_bands, calculate_ema, calculate_macd, calculate_rsi, calculate_sma,
};
