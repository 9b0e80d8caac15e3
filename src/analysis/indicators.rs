// src/analysis/indicators.rs
// All price slices are ordered most recent first.

use crate::domain::models::{BollingerBands, IndicatorBundle, MacdValue};

/// Fewer samples than this and a bar gets neutral indicators.
pub const MIN_INDICATOR_HISTORY: usize = 14;

/// Simple Moving Average over the `period` most recent prices
pub fn calculate_sma(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return prices.first().copied().unwrap_or(0.0);
    }
    prices.iter().take(period).sum::<f64>() / period as f64
}

/// Exponential Moving Average
///
/// Seeded with the SMA of the `period` oldest prices, then folded forward in
/// time toward the most recent price.
pub fn calculate_ema(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period {
        return prices.first().copied().unwrap_or(0.0);
    }

    let multiplier = 2.0 / (period + 1) as f64;
    let oldest = &prices[prices.len() - period..];
    let mut ema = calculate_sma(oldest, period);

    for price in prices[..prices.len() - period].iter().rev() {
        ema = price * multiplier + ema * (1.0 - multiplier);
    }

    ema
}

/// Relative Strength Index over the `period` most recent deltas
pub fn calculate_rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return 50.0;
    }

    let (gains, losses) = prices
        .windows(2)
        .take(period)
        .map(|pair| pair[0] - pair[1])
        .fold((0.0, 0.0), |(gain, loss), change| {
            if change > 0.0 {
                (gain + change, loss)
            } else {
                (gain, loss - change)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD with a proportional signal line
pub fn calculate_macd(prices: &[f64]) -> MacdValue {
    let macd = calculate_ema(prices, 12) - calculate_ema(prices, 26);
    let signal = macd * 0.2;
    MacdValue {
        macd,
        signal,
        histogram: macd - signal,
    }
}

/// Bollinger Bands using the population standard deviation
pub fn calculate_bollinger_bands(prices: &[f64], period: usize, k: f64) -> BollingerBands {
    let middle = calculate_sma(prices, period);
    if period == 0 || prices.len() < period {
        return BollingerBands {
            upper: middle,
            middle,
            lower: middle,
        };
    }

    let variance = prices
        .iter()
        .take(period)
        .map(|p| (p - middle).powi(2))
        .sum::<f64>()
        / period as f64;
    let std_dev = variance.sqrt();

    BollingerBands {
        upper: middle + k * std_dev,
        middle,
        lower: middle - k * std_dev,
    }
}

impl IndicatorBundle {
    pub fn neutral(price: f64) -> Self {
        Self {
            sma_20: price,
            ema_12: price,
            ema_26: price,
            rsi_14: 50.0,
            macd: MacdValue {
                macd: 0.0,
                signal: 0.0,
                histogram: 0.0,
            },
            bollinger: None,
            volume_sma: 0.0,
        }
    }

    /// Indicators for a bar closing at `close`, given earlier closes and
    /// volumes of the same timeframe (newest first).
    pub fn compute(close: f64, history: &[f64], volumes: &[f64]) -> Self {
        if history.len() < MIN_INDICATOR_HISTORY {
            return Self::neutral(close);
        }

        let prices: Vec<f64> = std::iter::once(close).chain(history.iter().copied()).collect();
        let volumes: Vec<f64> = std::iter::once(0.0).chain(volumes.iter().copied()).collect();

        Self {
            sma_20: calculate_sma(&prices, 20),
            ema_12: calculate_ema(&prices, 12),
            ema_26: calculate_ema(&prices, 26),
            rsi_14: calculate_rsi(&prices, 14),
            macd: calculate_macd(&prices),
            bollinger: Some(calculate_bollinger_bands(&prices, 20, 2.0)),
            volume_sma: calculate_sma(&volumes, 20),
        }
    }
}
