// src/engine.rs
// Process-level facade: drives ticks and sweeps, serves the read operations

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::Config;
use crate::domain::errors::{SimulationResult, StorageResult, TradingResult};
use crate::domain::models::{
    to_f64, Asset, AssetId, EventCategory, MarketEvent, MarketSnapshot, NarrativeImpact, OhlcBar,
    Timeframe,
};
use crate::domain::orders::{Order, OrderRequest};
use crate::domain::repository::{
    AccountRepository, AssetRepository, BarRepository, EventRepository, OrderRepository,
    SnapshotRepository, Storage,
};
use crate::domain::service::{MarketCalendar, ScarcityOracle};
use crate::market_data::aggregator::{BarDraws, OhlcAggregator};
use crate::simulation::events::EventModel;
use crate::simulation::pricing::{PriceDraws, PricePathGenerator};
use crate::trading::execution::{ExecutionEngine, ExecutionOutcome};
use crate::trading::modifiers::ModifierChain;
use crate::trading::scheduler::{PendingOrderScheduler, SweepSummary};
use crate::trading::validation::OrderValidator;

/// Movers listed on each side of the overview
const TOP_MOVERS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub skipped: bool,
    pub assets_updated: usize,
    pub assets_failed: usize,
    pub bars_written: usize,
    pub events_created: usize,
    pub events_expired: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub asset_id: AssetId,
    pub symbol: String,
    pub price: Decimal,
    pub day_change_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub total_assets: usize,
    pub total_market_cap: Decimal,
    pub total_volume_24h: u64,
    pub market_open: bool,
    pub top_gainers: Vec<Mover>,
    pub top_losers: Vec<Mover>,
    pub as_of: DateTime<Utc>,
}

/// Order as stored after its first execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSubmission {
    pub order: Order,
    pub outcome: ExecutionOutcome,
}

pub struct MarketEngine {
    config: Config,
    storage: Arc<dyn Storage>,
    calendar: Arc<dyn MarketCalendar>,
    generator: PricePathGenerator,
    events: RwLock<EventModel>,
    rng: Mutex<StdRng>,
    execution: Arc<ExecutionEngine>,
    scheduler: PendingOrderScheduler,
    snapshot_tx: broadcast::Sender<MarketSnapshot>,
    last_tick: Mutex<Option<DateTime<Utc>>>,
    // One tick at a time keeps a single writer per asset snapshot
    tick_lock: tokio::sync::Mutex<()>,
}

impl MarketEngine {
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        calendar: Arc<dyn MarketCalendar>,
        scarcity: Option<Arc<dyn ScarcityOracle>>,
    ) -> Self {
        let mut rng = match config.engine.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let execution_rng = StdRng::seed_from_u64(rng.gen());

        let validator = OrderValidator::new(calendar.clone(), scarcity, config.market.clone());
        let execution = Arc::new(ExecutionEngine::new(
            storage.clone(),
            validator,
            ModifierChain::standard(),
            config.market.clone(),
            execution_rng,
        ));
        let scheduler = PendingOrderScheduler::new(storage.clone(), execution.clone(), calendar.clone());
        let (snapshot_tx, _) = broadcast::channel(1024);

        Self {
            generator: PricePathGenerator::new(config.market.clone()),
            config,
            storage,
            calendar,
            events: RwLock::new(EventModel::default()),
            rng: Mutex::new(rng),
            execution,
            scheduler,
            snapshot_tx,
            last_tick: Mutex::new(None),
            tick_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Subscribe to snapshot updates published after every asset tick
    pub fn subscribe(&self) -> broadcast::Receiver<MarketSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn execution(&self) -> &Arc<ExecutionEngine> {
        &self.execution
    }

    pub fn active_events(&self) -> Vec<MarketEvent> {
        self.events.read().active().to_vec()
    }

    /// Reload the active event set from storage.
    pub async fn restore_events(&self) -> StorageResult<usize> {
        let events = self.storage.active_events().await?;
        let model = EventModel::new(events);
        let count = model.active().len();
        *self.events.write() = model;
        log::info!("Restored {} active market events", count);
        Ok(count)
    }

    /// Store an asset and seed its market state if it has none yet.
    pub async fn register_asset(&self, asset: &Asset) -> StorageResult<MarketSnapshot> {
        self.storage.save_asset(asset).await?;
        if let Some(existing) = self.storage.get_snapshot(&asset.id).await? {
            return Ok(existing);
        }

        let snapshot = {
            let mut rng = self.rng.lock();
            self.generator.seed_snapshot(asset, &mut *rng, Utc::now())
        };
        self.storage.save_snapshot(&snapshot).await?;
        log::info!(
            "Seeded {} ({}) at {} with volatility {:.4}",
            asset.symbol,
            asset.asset_type.as_str(),
            snapshot.current_price,
            snapshot.volatility
        );
        Ok(snapshot)
    }

    /// Register a story-driven event from the narrative collaborator.
    pub async fn register_narrative_event(
        &self,
        category: EventCategory,
        significance: u8,
        start: DateTime<Utc>,
        duration: ChronoDuration,
        impacts: BTreeMap<AssetId, NarrativeImpact>,
    ) -> StorageResult<MarketEvent> {
        let event = EventModel::narrative_event(
            category,
            significance,
            start,
            duration,
            impacts,
        );
        self.storage.save_event(&event).await?;
        self.events.write().register(event.clone());
        Ok(event)
    }

    /// Advance every asset by one tick.
    ///
    /// Failures on a single asset are logged and counted; only a failure to
    /// list the assets fails the whole tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> SimulationResult<TickSummary> {
        let _tick = self.tick_lock.lock().await;

        if !self.calendar.is_open(now) {
            log::debug!("Market closed at {}, skipping tick", now);
            return Ok(TickSummary {
                skipped: true,
                ..TickSummary::default()
            });
        }

        let previous = self.last_tick.lock().replace(now);
        let elapsed_minutes = match previous {
            Some(last) if last < now => (now - last).num_milliseconds() as f64 / 60_000.0,
            Some(_) => 0.0,
            None => self.config.engine.tick_interval_secs as f64 / 60.0,
        };

        if previous.map(|last| last.date_naive()) != Some(now.date_naive()) {
            self.roll_trading_day(now).await;
        }

        let assets = self.storage.list_assets().await?;
        let mut summary = TickSummary::default();

        let generated = {
            let mut rng = self.rng.lock();
            EventModel::maybe_generate(&mut *rng, &assets, self.config.engine.event_probability, now)
        };
        if let Some(event) = generated {
            if let Err(e) = self.storage.save_event(&event).await {
                log::error!("Failed to persist market event {}: {}", event.id, e);
            }
            self.events.write().register(event);
            summary.events_created += 1;
        }

        let expired = self.events.write().expire(now);
        summary.events_expired = expired.len();
        for id in expired {
            if let Err(e) = self.storage.deactivate_event(&id).await {
                log::error!("Failed to deactivate market event {}: {}", id, e);
            }
        }

        let results: Vec<(String, SimulationResult<usize>)> = stream::iter(assets)
            .map(|asset| async move {
                let result = self.update_asset(&asset, elapsed_minutes, now).await;
                (asset.symbol, result)
            })
            .buffer_unordered(self.config.engine.worker_pool_size.max(1))
            .collect()
            .await;

        for (symbol, result) in results {
            match result {
                Ok(bars) => {
                    summary.assets_updated += 1;
                    summary.bars_written += bars;
                }
                Err(e) => {
                    summary.assets_failed += 1;
                    log::error!("Failed to update {}: {}", symbol, e);
                }
            }
        }

        log::debug!(
            "Tick at {}: {} updated, {} failed, {} bars written",
            now,
            summary.assets_updated,
            summary.assets_failed,
            summary.bars_written
        );
        Ok(summary)
    }

    /// Price one asset, persist it and record its bars. Returns bars written.
    async fn update_asset(
        &self,
        asset: &Asset,
        elapsed_minutes: f64,
        now: DateTime<Utc>,
    ) -> SimulationResult<usize> {
        let Some(snapshot) = self.storage.get_snapshot(&asset.id).await? else {
            // Imported after the last tick
            self.register_asset(asset).await?;
            return Ok(0);
        };

        let contribution = self
            .events
            .read()
            .contribution(asset, to_f64(snapshot.market_cap()), now);
        let (draws, bar_draws) = {
            let mut rng = self.rng.lock();
            (PriceDraws::sample(&mut *rng), BarDraws::sample(&mut *rng))
        };

        let step = self
            .generator
            .advance(&snapshot, elapsed_minutes, contribution, &draws, now);
        if step.reset {
            log::warn!("{} was reset to {}", asset.symbol, step.snapshot.current_price);
        }
        self.storage.save_snapshot(&step.snapshot).await?;

        let bars = OhlcAggregator::record(
            self.storage.as_ref(),
            snapshot.current_price,
            &step.snapshot,
            step.tick_volume,
            &bar_draws,
            now,
        )
        .await?;

        // No subscribers is fine
        let _ = self.snapshot_tx.send(step.snapshot);
        Ok(bars.len())
    }

    async fn roll_trading_day(&self, now: DateTime<Utc>) {
        let today = now.date_naive();
        let accounts = match self.storage.list_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                log::error!("Failed to load accounts for daily reset: {}", e);
                return;
            }
        };

        for mut account in accounts {
            if !account.roll_day(today) {
                continue;
            }
            match self.storage.save_account(&account).await {
                Ok(()) => log::debug!("Reset daily trading usage for {}", account.username),
                Err(e) => log::error!("Failed to reset daily usage for {}: {}", account.id, e),
            }
        }
    }

    /// Try every pending order once.
    pub async fn sweep(&self, now: DateTime<Utc>) -> TradingResult<SweepSummary> {
        self.scheduler.sweep(now).await
    }

    /// Create an order from a request and attempt it immediately.
    ///
    /// Unsupported types and malformed limit/stop requests fail before any
    /// order is stored.
    pub async fn submit_order(
        &self,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> TradingResult<OrderSubmission> {
        let order = Order::from_request(request)?;
        self.storage.save_order(&order).await?;
        log::info!(
            "Order {} submitted: {} {} {} of {}",
            order.id,
            order.side.as_str(),
            order.order_type,
            order.quantity,
            order.asset_id
        );

        let outcome = self.execution.execute(&order.id, now).await?;
        let order = match &outcome {
            ExecutionOutcome::Filled(report) => report.order.clone(),
            _ => self.storage.get_order(&order.id).await?.unwrap_or(order),
        };
        Ok(OrderSubmission { order, outcome })
    }

    pub async fn get_market_snapshot(&self, asset_id: &AssetId) -> StorageResult<Option<MarketSnapshot>> {
        self.storage.get_snapshot(asset_id).await
    }

    /// Aggregate market state and the day's biggest movers.
    pub async fn get_overview(&self, now: DateTime<Utc>) -> StorageResult<MarketOverview> {
        let assets = self.storage.list_assets().await?;
        let snapshots = self.storage.list_snapshots().await?;
        let symbols: BTreeMap<AssetId, String> =
            assets.iter().map(|a| (a.id, a.symbol.clone())).collect();

        let total_market_cap = snapshots.iter().map(|s| s.market_cap()).sum();
        let total_volume_24h = snapshots.iter().map(|s| s.volume_24h).sum();

        let mut movers: Vec<Mover> = snapshots
            .iter()
            .filter_map(|s| {
                symbols.get(&s.asset_id).map(|symbol| Mover {
                    asset_id: s.asset_id,
                    symbol: symbol.clone(),
                    price: s.current_price,
                    day_change_percent: s.day_change_percent,
                })
            })
            .collect();
        movers.sort_by(|a, b| b.day_change_percent.total_cmp(&a.day_change_percent));

        let top_gainers = movers
            .iter()
            .filter(|m| m.day_change_percent > 0.0)
            .take(TOP_MOVERS)
            .cloned()
            .collect();
        let top_losers = movers
            .iter()
            .rev()
            .filter(|m| m.day_change_percent < 0.0)
            .take(TOP_MOVERS)
            .cloned()
            .collect();

        Ok(MarketOverview {
            total_assets: assets.len(),
            total_market_cap,
            total_volume_24h,
            market_open: self.calendar.is_open(now),
            top_gainers,
            top_losers,
            as_of: now,
        })
    }

    /// The `window` most recent bars of `timeframe`, oldest first.
    pub async fn get_ohlc(
        &self,
        asset_id: &AssetId,
        timeframe: Timeframe,
        window: usize,
    ) -> StorageResult<Vec<OhlcBar>> {
        let mut bars = self.storage.recent_bars(asset_id, timeframe, window).await?;
        bars.reverse();
        Ok(bars)
    }

    /// Drive ticks and sweeps until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticks = interval(Duration::from_secs(self.config.engine.tick_interval_secs.max(1)));
        let mut sweeps = interval(Duration::from_secs(self.config.engine.sweep_interval_secs.max(1)));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        sweeps.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        log::info!(
            "Market engine running: tick every {}s, sweep every {}s",
            self.config.engine.tick_interval_secs,
            self.config.engine.sweep_interval_secs
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Market engine shutting down");
                    break;
                }
                _ = ticks.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(summary) if summary.assets_failed > 0 => log::warn!(
                            "Tick finished with {} of {} assets failing",
                            summary.assets_failed,
                            summary.assets_failed + summary.assets_updated
                        ),
                        Ok(_) => {}
                        Err(e) => log::error!("Tick failed: {}", e),
                    }
                }
                _ = sweeps.tick() => {
                    if let Err(e) = self.sweep(Utc::now()).await {
                        log::error!("Pending order sweep failed: {}", e);
                    }
                }
            }
        }
    }
}
