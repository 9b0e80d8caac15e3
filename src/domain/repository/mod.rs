// src/domain/repository/mod.rs
// Repository interfaces for domain entities

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::behavior::{ConsequenceRecord, TraderBehaviorState};
use crate::domain::errors::StorageResult;
use crate::domain::models::{
    AccountId, Asset, AssetId, EventId, MarketEvent, MarketSnapshot, OhlcBar, OrderId, Timeframe,
};
use crate::domain::orders::{Account, Execution, MarginAccount, Order, Portfolio};

/// Asset catalog, maintained by the external import pipeline
#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn list_assets(&self) -> StorageResult<Vec<Asset>>;
    async fn get_asset(&self, id: &AssetId) -> StorageResult<Option<Asset>>;
    async fn save_asset(&self, asset: &Asset) -> StorageResult<()>;
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn get_snapshot(&self, asset_id: &AssetId) -> StorageResult<Option<MarketSnapshot>>;
    async fn list_snapshots(&self) -> StorageResult<Vec<MarketSnapshot>>;
    async fn save_snapshot(&self, snapshot: &MarketSnapshot) -> StorageResult<()>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn active_events(&self) -> StorageResult<Vec<MarketEvent>>;
    async fn save_event(&self, event: &MarketEvent) -> StorageResult<()>;
    async fn deactivate_event(&self, id: &EventId) -> StorageResult<()>;
}

/// Append-only bar store
#[async_trait]
pub trait BarRepository: Send + Sync {
    /// Returns false when a bar for the same period already exists.
    async fn append_bar(&self, bar: &OhlcBar) -> StorageResult<bool>;

    /// Bars with `period_start` in `[from, to)`, oldest first.
    async fn bars_between(
        &self,
        asset_id: &AssetId,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<OhlcBar>>;

    /// Up to `limit` most recent bars, newest first.
    async fn recent_bars(
        &self,
        asset_id: &AssetId,
        timeframe: Timeframe,
        limit: usize,
    ) -> StorageResult<Vec<OhlcBar>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_order(&self, id: &OrderId) -> StorageResult<Option<Order>>;
    async fn save_order(&self, order: &Order) -> StorageResult<()>;
    async fn pending_orders(&self) -> StorageResult<Vec<Order>>;
    async fn record_execution(&self, execution: &Execution) -> StorageResult<()>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn list_accounts(&self) -> StorageResult<Vec<Account>>;
    async fn get_account(&self, id: &AccountId) -> StorageResult<Option<Account>>;
    async fn save_account(&self, account: &Account) -> StorageResult<()>;
    async fn get_portfolio(&self, account_id: &AccountId) -> StorageResult<Option<Portfolio>>;
    async fn save_portfolio(&self, portfolio: &Portfolio) -> StorageResult<()>;
    async fn get_margin_account(&self, account_id: &AccountId)
        -> StorageResult<Option<MarginAccount>>;
}

/// Behavior state lookups and the consequence audit sink
#[async_trait]
pub trait BehaviorRepository: Send + Sync {
    async fn get_behavior(&self, account_id: &AccountId)
        -> StorageResult<Option<TraderBehaviorState>>;
    async fn append_consequence(&self, record: &ConsequenceRecord) -> StorageResult<()>;
}

/// Everything the engine reads and writes.
pub trait Storage:
    AssetRepository
    + SnapshotRepository
    + EventRepository
    + BarRepository
    + OrderRepository
    + AccountRepository
    + BehaviorRepository
{
}

impl<T> Storage for T where
    T: AssetRepository
        + SnapshotRepository
        + EventRepository
        + BarRepository
        + OrderRepository
        + AccountRepository
        + BehaviorRepository
{
}
