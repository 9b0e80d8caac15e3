// src/market_data/aggregator.rs
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;

use crate::domain::errors::StorageResult;
use crate::domain::models::{
    to_f64, AssetId, IndicatorBundle, MarketSnapshot, OhlcBar, Timeframe,
};
use crate::domain::repository::BarRepository;
use crate::simulation::pricing::validate_price;

/// Bars of the same timeframe read back for indicator calculation
const INDICATOR_LOOKBACK: usize = 50;

/// Intraperiod jitter for a synthesized 1-minute bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarDraws {
    /// Uniform in [0, 1]
    pub high: f64,
    /// Uniform in [0, 1]
    pub low: f64,
    /// Uniform in [-0.5, 0.5]
    pub close: f64,
}

impl BarDraws {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            high: rng.gen_range(0.0..=1.0),
            low: rng.gen_range(0.0..=1.0),
            close: rng.gen_range(-0.5..=0.5),
        }
    }

    pub fn flat() -> Self {
        Self {
            high: 0.0,
            low: 0.0,
            close: 0.0,
        }
    }
}

/// Synthesize the 1-minute bar for one tick.
pub fn base_bar(
    asset_id: AssetId,
    period_start: DateTime<Utc>,
    open_price: Decimal,
    price: Decimal,
    volatility: f64,
    volume: u64,
    draws: &BarDraws,
    indicators: impl FnOnce(f64) -> IndicatorBundle,
) -> OhlcBar {
    let price_f = to_f64(price);
    let open = open_price;
    let variation = price_f * volatility * 0.1;

    let close = validate_price(price_f + draws.close * variation * 0.5, "Bar close");
    let high_raw = validate_price(price_f + draws.high * variation, "Bar high");
    let low_raw = validate_price(price_f - draws.low * variation, "Bar low");

    let high = open.max(close).max(high_raw).max(low_raw);
    let low = open.min(close).min(high_raw).min(low_raw);

    let change = close - open;
    let open_f = to_f64(open);
    let change_percent = if open_f > 0.0 {
        to_f64(change) / open_f * 100.0
    } else {
        0.0
    };

    OhlcBar {
        asset_id,
        timeframe: Timeframe::OneMinute,
        period_start,
        open,
        high,
        low,
        close,
        volume,
        change,
        change_percent,
        indicators: indicators(to_f64(close)),
    }
}

/// Fold chronologically ordered 1-minute bars into one bar of `timeframe`.
pub fn rollup(
    asset_id: AssetId,
    timeframe: Timeframe,
    period_start: DateTime<Utc>,
    minute_bars: &[OhlcBar],
    indicators: impl FnOnce(f64) -> IndicatorBundle,
) -> Option<OhlcBar> {
    let first = minute_bars.first()?;
    let last = minute_bars.last()?;

    let high = minute_bars.iter().map(|b| b.high).max()?;
    let low = minute_bars.iter().map(|b| b.low).min()?;
    let volume = minute_bars.iter().map(|b| b.volume).sum();

    let change = last.close - first.open;
    let open_f = to_f64(first.open);
    let change_percent = if open_f > 0.0 {
        to_f64(change) / open_f * 100.0
    } else {
        0.0
    };

    Some(OhlcBar {
        asset_id,
        timeframe,
        period_start,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
        change,
        change_percent,
        indicators: indicators(to_f64(last.close)),
    })
}

/// Builds base bars every tick and rolls them up on period boundaries.
pub struct OhlcAggregator;

impl OhlcAggregator {
    async fn indicator_history<S: BarRepository + ?Sized>(
        store: &S,
        asset_id: &AssetId,
        timeframe: Timeframe,
    ) -> StorageResult<(Vec<f64>, Vec<f64>)> {
        let recent = store
            .recent_bars(asset_id, timeframe, INDICATOR_LOOKBACK)
            .await?;
        let closes = recent.iter().map(|b| to_f64(b.close)).collect();
        let volumes = recent.iter().map(|b| b.volume as f64).collect();
        Ok((closes, volumes))
    }

    /// Write the 1-minute bar for `now` plus every rollup that closes at `now`.
    ///
    /// Returns the bars actually appended.
    pub async fn record<S: BarRepository + ?Sized>(
        store: &S,
        previous_price: Decimal,
        snapshot: &MarketSnapshot,
        tick_volume: u64,
        draws: &BarDraws,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<OhlcBar>> {
        let asset_id = snapshot.asset_id;
        let minute = Timeframe::OneMinute.period_start(now);
        let mut written = Vec::new();

        let (closes, volumes) =
            Self::indicator_history(store, &asset_id, Timeframe::OneMinute).await?;
        let bar = base_bar(
            asset_id,
            minute,
            previous_price,
            snapshot.current_price,
            snapshot.volatility,
            tick_volume,
            draws,
            |close| IndicatorBundle::compute(close, &closes, &volumes),
        );
        if store.append_bar(&bar).await? {
            written.push(bar);
        } else {
            log::debug!("1m bar for {} at {} already recorded", asset_id, minute);
        }

        for timeframe in Timeframe::ROLLUPS.iter().copied() {
            if !timeframe.closes_at(minute) {
                continue;
            }
            let end = timeframe.period_start(minute);
            let start = end - Duration::minutes(timeframe.minutes());
            let minute_bars = store
                .bars_between(&asset_id, Timeframe::OneMinute, start, end)
                .await?;

            let (closes, volumes) = Self::indicator_history(store, &asset_id, timeframe).await?;
            let Some(bar) = rollup(asset_id, timeframe, start, &minute_bars, |close| {
                IndicatorBundle::compute(close, &closes, &volumes)
            }) else {
                continue;
            };

            if store.append_bar(&bar).await? {
                log::debug!(
                    "Aggregated {} bar for {}: O:{} H:{} L:{} C:{}",
                    timeframe, asset_id, bar.open, bar.high, bar.low, bar.close
                );
                written.push(bar);
            }
        }

        Ok(written)
    }
}
