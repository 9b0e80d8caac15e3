// src/main.rs
use market_engine::config::Config;
use market_engine::domain::behavior::AffinityGroup;
use market_engine::domain::errors::AppResult;
use market_engine::domain::models::{Asset, AssetMetadata, AssetTheme, AssetType};
use market_engine::domain::repository::AssetRepository;
use market_engine::domain::service::ScarcityOracle;
use market_engine::engine::MarketEngine;
use market_engine::infrastructure::{calendar, InMemoryStorage, NoScarcity};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::signal::ctrl_c;

const DEMO_TYPES: [AssetType; 5] = [
    AssetType::Character,
    AssetType::Comic,
    AssetType::Creator,
    AssetType::Publisher,
    AssetType::Other,
];

const DEMO_THEMES: [AssetTheme; 8] = [
    AssetTheme::Character,
    AssetTheme::Educational,
    AssetTheme::Temporal,
    AssetTheme::Power,
    AssetTheme::Mystery,
    AssetTheme::Elemental,
    AssetTheme::Social,
    AssetTheme::General,
];

// Unaffiliated slots leave some assets outside every cohort
const DEMO_GROUPS: [Option<AffinityGroup>; 9] = [
    Some(AffinityGroup::Heroes),
    None,
    Some(AffinityGroup::Wisdom),
    Some(AffinityGroup::Power),
    None,
    Some(AffinityGroup::Mystery),
    Some(AffinityGroup::Elements),
    Some(AffinityGroup::Time),
    Some(AffinityGroup::Spirit),
];

/// Synthetic catalog for local runs against the in-memory store
fn demo_catalog(count: usize, seed: Option<u64>) -> Vec<Asset> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    (0..count)
        .map(|i| {
            let asset_type = DEMO_TYPES[i % DEMO_TYPES.len()];
            let metadata = AssetMetadata {
                popularity: rng.gen_range(0.0..=1.0),
                rarity: rng.gen_range(0.0..=1.0),
                total_supply: None,
                theme: DEMO_THEMES[i % DEMO_THEMES.len()],
                affinity_group: DEMO_GROUPS[i % DEMO_GROUPS.len()],
            };
            Asset::new(
                &format!("DEMO{}", i + 1),
                &format!("Demo {} #{}", asset_type.as_str(), i + 1),
                asset_type,
                metadata,
            )
        })
        .collect()
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting market_engine v{}", env!("CARGO_PKG_VERSION"));

    let storage = Arc::new(InMemoryStorage::new());
    let calendar = calendar::from_config(&config.calendar);
    let scarcity: Arc<dyn ScarcityOracle> = Arc::new(NoScarcity);
    let engine = MarketEngine::new(config.clone(), storage.clone(), calendar, Some(scarcity));

    engine.restore_events().await?;

    if storage.list_assets().await?.is_empty() {
        log::info!("Store is empty, registering {} demo assets", config.engine.demo_assets);
        for asset in demo_catalog(config.engine.demo_assets, config.engine.seed) {
            engine.register_asset(&asset).await?;
        }
    }

    let mut updates = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(snapshot) = updates.recv().await {
            log::debug!(
                "{} -> {} (bid {}, ask {}, vol {})",
                snapshot.asset_id,
                snapshot.current_price,
                snapshot.bid,
                snapshot.ask,
                snapshot.volume_24h
            );
        }
    });

    engine
        .run(async {
            if let Err(e) = ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    let overview = engine.get_overview(chrono::Utc::now()).await?;
    log::info!(
        "Final market: {} assets, cap {}, 24h volume {}",
        overview.total_assets,
        overview.total_market_cap,
        overview.total_volume_24h
    );

    Ok(())
}
