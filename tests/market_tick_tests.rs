//! Simulation ticks driven through the engine facade.

use chrono::{DateTime, Duration, TimeZone, Utc};
use market_engine::config::Config;
use market_engine::domain::behavior::AffinityGroup;
use market_engine::domain::models::{
    to_f64, Asset, AssetMetadata, AssetTheme, AssetType, EventCategory, MarketSnapshot,
    NarrativeImpact, Timeframe, HISTORY_CAPACITY, MAX_SINGLE_PRICE_CHANGE, MIN_PRICE,
    SAFE_MAX_PRICE,
};
use market_engine::domain::orders::Account;
use market_engine::domain::repository::{AccountRepository, SnapshotRepository};
use market_engine::infrastructure::{AlwaysOpen, InMemoryStorage, TradingHours};
use market_engine::MarketEngine;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

const TYPES: [AssetType; 5] = [
    AssetType::Character,
    AssetType::Comic,
    AssetType::Creator,
    AssetType::Publisher,
    AssetType::Other,
];

fn seeded_config() -> Config {
    let mut config = Config::default();
    config.engine.seed = Some(2024);
    // about ten units a minute so volumes are never floored away
    config.market.base_volume_per_day = 14_400.0;
    config.engine.event_probability = 0.0;
    config.calendar.always_open = true;
    config
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
}

async fn market(count: usize) -> (Arc<InMemoryStorage>, MarketEngine, Vec<Asset>) {
    let storage = Arc::new(InMemoryStorage::new());
    let engine = MarketEngine::new(seeded_config(), storage.clone(), Arc::new(AlwaysOpen), None);

    let mut assets = Vec::new();
    for i in 0..count {
        let metadata = AssetMetadata {
            popularity: 0.1 * (i % 10) as f64,
            rarity: 0.5,
            total_supply: None,
            theme: AssetTheme::General,
            affinity_group: None,
        };
        let asset = Asset::new(&format!("T{}", i), &format!("Test {}", i), TYPES[i % TYPES.len()], metadata);
        engine.register_asset(&asset).await.unwrap();
        assets.push(asset);
    }
    (storage, engine, assets)
}

#[tokio::test]
async fn prices_stay_within_bounds_over_many_ticks() {
    let (storage, engine, assets) = market(10).await;
    let mut now = start();

    for _ in 0..240 {
        let before: BTreeMap<_, _> = storage
            .list_snapshots()
            .await
            .unwrap()
            .into_iter()
            .map(|s| (s.asset_id, to_f64(s.current_price)))
            .collect();

        let summary = engine.tick(now).await.unwrap();
        assert!(!summary.skipped);
        assert_eq!(summary.assets_updated, assets.len());
        assert_eq!(summary.assets_failed, 0);

        for snapshot in storage.list_snapshots().await.unwrap() {
            let price = to_f64(snapshot.current_price);
            assert!(price >= MIN_PRICE && price <= SAFE_MAX_PRICE, "price {}", price);
            assert!(snapshot.bid < snapshot.ask);
            assert!(snapshot.price_history.len() <= HISTORY_CAPACITY);
            assert!((0.005..=0.1).contains(&snapshot.volatility));
            assert!((-1.0..=1.0).contains(&snapshot.trend));

            let old = before[&snapshot.asset_id];
            // Cent rounding can push a capped move marginally past the limit
            assert!((price / old - 1.0).abs() <= MAX_SINGLE_PRICE_CHANGE + 0.01 / old);
        }
        now += Duration::minutes(1);
    }
}

#[tokio::test]
async fn minute_bars_roll_up_into_five_minute_bars() {
    let (_storage, engine, assets) = market(2).await;
    let mut now = start();

    let mut written = 0;
    for _ in 0..=5 {
        written += engine.tick(now).await.unwrap().bars_written;
        now += Duration::minutes(1);
    }
    // six 1m bars per asset and one 5m bar each at 10:05
    assert_eq!(written, 2 * 7);

    let asset = &assets[0];
    let minutes = engine.get_ohlc(&asset.id, Timeframe::OneMinute, 100).await.unwrap();
    assert_eq!(minutes.len(), 6);
    assert!(minutes.windows(2).all(|w| w[0].period_start < w[1].period_start));

    let rolled = engine.get_ohlc(&asset.id, Timeframe::FiveMinutes, 10).await.unwrap();
    assert_eq!(rolled.len(), 1);
    let bar = &rolled[0];
    assert_eq!(bar.period_start, start());
    assert_eq!(bar.open, minutes[0].open);
    assert_eq!(bar.close, minutes[4].close);
    assert_eq!(bar.volume, minutes[..5].iter().map(|b| b.volume).sum::<u64>());
    assert!(bar.high >= bar.open.max(bar.close));
    assert!(bar.low <= bar.open.min(bar.close));

    let window = engine.get_ohlc(&asset.id, Timeframe::OneMinute, 3).await.unwrap();
    assert_eq!(window.len(), 3);
    assert_eq!(window[2].period_start, minutes[5].period_start);
}

#[tokio::test]
async fn replayed_tick_does_not_duplicate_bars() {
    let (_storage, engine, assets) = market(1).await;

    engine.tick(start()).await.unwrap();
    let again = engine.tick(start()).await.unwrap();
    assert_eq!(again.bars_written, 0);

    let bars = engine.get_ohlc(&assets[0].id, Timeframe::OneMinute, 10).await.unwrap();
    assert_eq!(bars.len(), 1);
}

#[tokio::test]
async fn closed_market_skips_the_tick() {
    let storage = Arc::new(InMemoryStorage::new());
    let mut config = seeded_config();
    config.calendar.always_open = false;
    let engine = MarketEngine::new(config, storage.clone(), Arc::new(TradingHours::new(9, 16)), None);
    let asset = Asset::new("NITE", "Night", AssetType::Comic, AssetMetadata::default());
    let seeded = engine.register_asset(&asset).await.unwrap();

    let evening = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
    let summary = engine.tick(evening).await.unwrap();
    assert!(summary.skipped);
    assert_eq!(summary.assets_updated, 0);

    let snapshot = engine.get_market_snapshot(&asset.id).await.unwrap().unwrap();
    assert_eq!(snapshot, seeded);
    assert!(!engine.get_overview(evening).await.unwrap().market_open);
}

#[tokio::test]
async fn one_failing_asset_does_not_stop_the_others() {
    let (storage, engine, assets) = market(4).await;
    storage.fail_snapshot_writes(assets[1].id);

    let summary = engine.tick(start()).await.unwrap();
    assert_eq!(summary.assets_failed, 1);
    assert_eq!(summary.assets_updated, 3);

    for (i, asset) in assets.iter().enumerate() {
        let snapshot = storage.get_snapshot(&asset.id).await.unwrap().unwrap();
        assert_eq!(snapshot.last_updated == start(), i != 1);
    }
}

#[tokio::test]
async fn narrative_event_at_its_peak_lifts_the_price() {
    let (storage, engine, assets) = market(1).await;
    let asset = &assets[0];
    let before = storage.get_snapshot(&asset.id).await.unwrap().unwrap();

    let now = start();
    let impacts = BTreeMap::from([(
        asset.id,
        NarrativeImpact {
            price_impact: 0.3,
            volatility_impact: 0.0,
        },
    )]);
    // Peak falls 30% into the window
    engine
        .register_narrative_event(
            EventCategory::MovieRelease,
            8,
            now - Duration::hours(3),
            Duration::hours(10),
            impacts,
        )
        .await
        .unwrap();
    assert_eq!(engine.active_events().len(), 1);

    engine.tick(now).await.unwrap();
    let after = storage.get_snapshot(&asset.id).await.unwrap().unwrap();
    assert!(after.current_price > before.current_price);
}

#[tokio::test]
async fn narrative_response_follows_each_assets_affinity_group() {
    let (storage, engine, _assets) = market(0).await;
    let now = start();

    let mut ids = Vec::new();
    for (symbol, group) in [("PWR", AffinityGroup::Power), ("WIS", AffinityGroup::Wisdom)] {
        let metadata = AssetMetadata {
            affinity_group: Some(group),
            ..AssetMetadata::default()
        };
        let asset = Asset::new(symbol, symbol, AssetType::Character, metadata);
        engine.register_asset(&asset).await.unwrap();
        // Identical calm starting state so the event dominates the move
        storage
            .save_snapshot(&MarketSnapshot {
                asset_id: asset.id,
                current_price: dec!(100.00),
                bid: dec!(99.90),
                ask: dec!(100.10),
                volume_24h: 0,
                trend: 0.0,
                momentum: 0.0,
                volatility: 0.005,
                day_change: dec!(0),
                day_change_percent: 0.0,
                supply: 500_000,
                price_history: VecDeque::new(),
                last_updated: now,
            })
            .await
            .unwrap();
        ids.push(asset.id);
    }

    let impacts = ids
        .iter()
        .map(|id| {
            (
                *id,
                NarrativeImpact {
                    price_impact: 0.3,
                    volatility_impact: 0.0,
                },
            )
        })
        .collect();
    engine
        .register_narrative_event(
            EventCategory::ComicConvention,
            6,
            now - Duration::hours(3),
            Duration::hours(10),
            impacts,
        )
        .await
        .unwrap();
    assert_eq!(storage.event_count(), 1);

    engine.tick(now).await.unwrap();

    let power = storage.get_snapshot(&ids[0]).await.unwrap().unwrap().current_price;
    let wisdom = storage.get_snapshot(&ids[1]).await.unwrap().unwrap().current_price;
    assert!(wisdom > dec!(100.00));
    assert!(power > wisdom, "power {} wisdom {}", power, wisdom);
}

#[tokio::test]
async fn new_trading_day_resets_daily_usage() {
    let (storage, engine, _assets) = market(1).await;
    let mut account = Account::new("erin", dec!(10000), dec!(5000));
    account.daily_trading_used = dec!(1200);
    account.usage_date = (start() - Duration::days(1)).date_naive();
    storage.save_account(&account).await.unwrap();

    engine.tick(start()).await.unwrap();

    let account = storage.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(account.daily_trading_used, dec!(0));
    assert_eq!(account.usage_date, start().date_naive());
}

#[tokio::test]
async fn overview_ranks_movers() {
    let (_storage, engine, assets) = market(12).await;
    let mut now = start();
    for _ in 0..30 {
        engine.tick(now).await.unwrap();
        now += Duration::minutes(1);
    }

    let overview = engine.get_overview(now).await.unwrap();
    assert_eq!(overview.total_assets, assets.len());
    assert!(overview.total_market_cap > dec!(0));
    assert!(overview.total_volume_24h > 0);
    assert!(overview.market_open);
    assert!(overview.top_gainers.len() <= 5);
    assert!(overview.top_losers.len() <= 5);
    assert!(overview.top_gainers.iter().all(|m| m.day_change_percent > 0.0));
    assert!(overview.top_losers.iter().all(|m| m.day_change_percent < 0.0));
    assert!(overview
        .top_gainers
        .windows(2)
        .all(|w| w[0].day_change_percent >= w[1].day_change_percent));
    assert!(overview
        .top_losers
        .windows(2)
        .all(|w| w[0].day_change_percent <= w[1].day_change_percent));
}

#[tokio::test]
async fn subscribers_receive_every_updated_snapshot() {
    let (_storage, engine, assets) = market(3).await;
    let mut updates = engine.subscribe();

    engine.tick(start()).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(snapshot) = updates.try_recv() {
        seen.push(snapshot.asset_id);
    }
    seen.sort();
    let mut expected: Vec<_> = assets.iter().map(|a| a.id).collect();
    expected.sort();
    assert_eq!(seen, expected);
}
