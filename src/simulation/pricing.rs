// src/simulation/pricing.rs
// Price path generator: one bounded step per asset per tick

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::VecDeque;

use crate::config::MarketConfig;
use crate::domain::errors::{SimulationError, SimulationResult};
use crate::domain::models::{
    to_f64, to_money, Asset, MarketSnapshot, PricePoint, MAX_PRICE, MAX_SINGLE_PRICE_CHANGE,
    MIN_PRICE, SAFE_MAX_PRICE,
};

pub const MIN_VOLATILITY: f64 = 0.005;
pub const MAX_VOLATILITY: f64 = 0.1;

fn tick_size() -> Decimal {
    Decimal::new(1, 2)
}

/// Clamp a computed price into the storable range and round it to cents.
pub fn validate_price(price: f64, context: &str) -> Decimal {
    if !price.is_finite() || price < MIN_PRICE {
        log::warn!(
            "{}: invalid price {}, using minimum {}",
            context, price, MIN_PRICE
        );
        return to_money(MIN_PRICE);
    }
    if price > MAX_PRICE {
        log::warn!(
            "{}: price {} exceeds the storage limit, capping at {}",
            context, price, SAFE_MAX_PRICE
        );
        return to_money(SAFE_MAX_PRICE);
    }
    if price > SAFE_MAX_PRICE {
        log::warn!(
            "{}: price {:.2} exceeds the safe limit, capping at {}",
            context, price, SAFE_MAX_PRICE
        );
        return to_money(SAFE_MAX_PRICE);
    }
    to_money(price)
}

/// Force `bid < ask` when rounding or capping collapsed the spread.
pub fn ordered_quotes(price: f64, bid: Decimal, ask: Decimal, context: &str) -> (Decimal, Decimal) {
    if bid < ask {
        return (bid, ask);
    }
    let bid = validate_price(price * 0.999, context);
    let ask = validate_price(price * 1.001, context);
    if bid < ask {
        return (bid, ask);
    }
    let safe_max = to_money(SAFE_MAX_PRICE);
    let tick = tick_size();
    if bid + tick <= safe_max {
        (bid, bid + tick)
    } else {
        (safe_max - tick, safe_max)
    }
}

/// Random inputs of one step, drawn up front so the step itself is pure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceDraws {
    /// Uniform in [-1, 1]
    pub shock: f64,
    /// Uniform in [0.7, 1.3]
    pub volume_jitter: f64,
}

impl PriceDraws {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            shock: rng.gen_range(-1.0..=1.0),
            volume_jitter: rng.gen_range(0.7..=1.3),
        }
    }

    /// No shock, average volume.
    pub fn neutral() -> Self {
        Self {
            shock: 0.0,
            volume_jitter: 1.0,
        }
    }
}

/// Summed effect of active events on one asset for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventContribution {
    pub price_impact: f64,
    /// Fractional adjustment to volatility, e.g. 0.2 for +20%
    pub volatility_adjustment: f64,
}

/// Outcome of advancing one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceStep {
    pub snapshot: MarketSnapshot,
    pub tick_volume: u64,
    /// Realized fractional change versus the previous price
    pub change: f64,
    pub rescaled: bool,
    pub reset: bool,
}

pub struct PricePathGenerator {
    config: MarketConfig,
}

impl PricePathGenerator {
    /// Create a new generator
    pub fn new(config: MarketConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Raw movement for one step, normalized to an hourly basis.
    pub fn movement(
        &self,
        volatility: f64,
        trend: f64,
        elapsed_minutes: f64,
        event_impact: f64,
        shock: f64,
    ) -> f64 {
        if elapsed_minutes <= 0.0 {
            return 0.0;
        }
        let random_component = shock * volatility * 0.7;
        let trend_component = trend * self.config.trend_strength * volatility * 0.2;
        let reversion_component = -trend * self.config.mean_reversion * volatility * 0.1;
        let total = random_component + trend_component + reversion_component + event_impact;
        total * (elapsed_minutes / 60.0).sqrt()
    }

    pub fn update_trend(trend: f64, price_change: f64) -> f64 {
        (trend * 0.95 + price_change * 10.0 * 0.05).clamp(-1.0, 1.0)
    }

    /// Quoted spread as a fraction of price.
    pub fn spread(&self, volatility: f64) -> f64 {
        let raw = self.config.min_spread + 2.0 * volatility;
        raw.clamp(self.config.min_spread, self.config.max_spread) / self.config.liquidity_factor
    }

    pub fn simulate_volume(&self, momentum: f64, trend: f64, jitter: f64) -> u64 {
        let per_minute = self.config.base_volume_per_day / 1440.0;
        let volume = per_minute * (1.0 + momentum.abs() * 5.0) * (1.0 + trend.abs() * 0.3) * jitter;
        if volume.is_finite() && volume > 0.0 {
            volume.floor() as u64
        } else {
            0
        }
    }

    /// Fails with `NumericOverflow` when the stored price is already corrupt.
    pub fn check_bounds(snapshot: &MarketSnapshot) -> SimulationResult<()> {
        let price = snapshot.price();
        if price > SAFE_MAX_PRICE {
            return Err(SimulationError::NumericOverflow {
                asset_id: snapshot.asset_id,
                price,
            });
        }
        Ok(())
    }

    /// Recover a corrupt snapshot to a tenth of its price.
    pub fn reset(&self, snapshot: &MarketSnapshot, now: DateTime<Utc>) -> MarketSnapshot {
        let safe_price = (snapshot.price() * 0.1).min(SAFE_MAX_PRICE);
        let price = validate_price(safe_price, "Safe price reset");
        let price_f = to_f64(price);
        let (bid, ask) = ordered_quotes(
            price_f,
            validate_price(price_f * 0.999, "Safe price reset bid"),
            validate_price(price_f * 1.001, "Safe price reset ask"),
            "Safe price reset",
        );

        let mut history = VecDeque::with_capacity(1);
        history.push_back(PricePoint {
            timestamp: now,
            price,
            volume: 0,
        });

        MarketSnapshot {
            current_price: price,
            bid,
            ask,
            trend: 0.0,
            momentum: 0.0,
            day_change: Decimal::ZERO,
            day_change_percent: 0.0,
            volume_24h: 0,
            price_history: history,
            last_updated: now,
            ..snapshot.clone()
        }
    }

    /// Advance one snapshot by `elapsed_minutes`.
    pub fn advance(
        &self,
        snapshot: &MarketSnapshot,
        elapsed_minutes: f64,
        contribution: EventContribution,
        draws: &PriceDraws,
        now: DateTime<Utc>,
    ) -> PriceStep {
        if let Err(SimulationError::NumericOverflow { asset_id, price }) = Self::check_bounds(snapshot) {
            log::warn!(
                "Asset {} price {} exceeds the safe limit, resetting",
                asset_id, price
            );
            return PriceStep {
                snapshot: self.reset(snapshot, now),
                tick_volume: 0,
                change: 0.0,
                rescaled: false,
                reset: true,
            };
        }

        let current = snapshot.price();
        let volatility = (snapshot.volatility * (1.0 + contribution.volatility_adjustment))
            .clamp(MIN_VOLATILITY, MAX_VOLATILITY);

        let mut change = self
            .movement(
                volatility,
                snapshot.trend,
                elapsed_minutes,
                contribution.price_impact,
                draws.shock,
            )
            .clamp(-MAX_SINGLE_PRICE_CHANGE, MAX_SINGLE_PRICE_CHANGE);

        let mut new_price = validate_price((current * (1.0 + change)).max(MIN_PRICE), "Price update");
        let mut rescaled = false;

        if to_f64(new_price) >= SAFE_MAX_PRICE && current < SAFE_MAX_PRICE {
            let max_allowed = SAFE_MAX_PRICE / current - 1.0;
            change = change.min(max_allowed * 0.9);
            new_price = validate_price(current * (1.0 + change), "Adjusted price update");
            rescaled = true;
            log::info!(
                "Price change for {} adjusted to {:.2}% to stay under the safe limit",
                snapshot.asset_id,
                change * 100.0
            );
        }

        let new_price = bound_step(snapshot.current_price, new_price);
        let new_f = to_f64(new_price);
        let realized = if current > 0.0 { new_f / current - 1.0 } else { 0.0 };

        let trend = Self::update_trend(snapshot.trend, realized);
        let momentum = realized;

        let spread = self.spread(volatility);
        let (bid, ask) = ordered_quotes(
            new_f,
            validate_price(new_f * (1.0 - spread / 2.0), "Bid price"),
            validate_price(new_f * (1.0 + spread / 2.0), "Ask price"),
            "Quote fallback",
        );

        let tick_volume = self.simulate_volume(momentum, trend, draws.volume_jitter);

        let reference = snapshot
            .price_history
            .front()
            .map(|p| p.price)
            .unwrap_or(snapshot.current_price);
        let reference_f = to_f64(reference);
        let day_change = new_price - reference;
        let day_change_percent = if reference_f > 0.0 {
            ((new_f / reference_f - 1.0) * 100.0).clamp(-99.99, 999.99)
        } else {
            0.0
        };

        let mut next = snapshot.clone();
        next.current_price = new_price;
        next.bid = bid;
        next.ask = ask;
        next.trend = trend;
        next.momentum = momentum;
        next.day_change = day_change;
        next.day_change_percent = (day_change_percent * 100.0).round() / 100.0;
        next.last_updated = now;
        next.push_history(PricePoint {
            timestamp: now,
            price: new_price,
            volume: tick_volume,
        });

        PriceStep {
            snapshot: next,
            tick_volume,
            change: realized,
            rescaled,
            reset: false,
        }
    }

    /// Initial market state for an asset that has never been priced.
    pub fn seed_snapshot<R: Rng + ?Sized>(
        &self,
        asset: &Asset,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> MarketSnapshot {
        let popularity = asset.metadata.popularity.clamp(0.0, 1.0);
        let rarity = asset.metadata.rarity.clamp(0.0, 1.0);

        let raw_price = asset.asset_type.base_price()
            * (0.5 + popularity * 1.5)
            * (0.8 + rarity * 0.4)
            * rng.gen_range(0.8..=1.2);
        let price = validate_price(raw_price, "Initial price");
        let price_f = to_f64(price);

        let volatility = (self.config.base_volatility
            * (1.5 - popularity * 0.5)
            * (0.8 + rarity * 0.4)
            * asset.asset_type.volatility_factor())
        .clamp(MIN_VOLATILITY, MAX_VOLATILITY);

        let (bid, ask) = ordered_quotes(
            price_f,
            validate_price(price_f * 0.999, "Initial bid"),
            validate_price(price_f * 1.001, "Initial ask"),
            "Initial quote",
        );

        let mut history = VecDeque::new();
        history.push_back(PricePoint {
            timestamp: now,
            price,
            volume: 0,
        });

        MarketSnapshot {
            asset_id: asset.id,
            current_price: price,
            bid,
            ask,
            volume_24h: 0,
            trend: rng.gen_range(-1.0..=1.0),
            momentum: 0.0,
            volatility,
            day_change: Decimal::ZERO,
            day_change_percent: 0.0,
            supply: asset.supply(),
            price_history: history,
            last_updated: now,
        }
    }
}

/// Keep a rounded price within half to one and a half times the previous one.
fn bound_step(previous: Decimal, candidate: Decimal) -> Decimal {
    let half = Decimal::new(5, 1);
    let upper = (previous * (Decimal::ONE + half)).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let lower = (previous * half)
        .round_dp_with_strategy(2, RoundingStrategy::AwayFromZero)
        .max(to_money(MIN_PRICE));
    if upper < lower {
        return previous;
    }
    candidate.clamp(lower, upper)
}
