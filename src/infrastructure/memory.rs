// src/infrastructure/memory.rs
// In-process storage implementing every repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::domain::behavior::{ConsequenceRecord, TraderBehaviorState};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::{
    AccountId, Asset, AssetId, EventId, MarketEvent, MarketSnapshot, OhlcBar, OrderId, Timeframe,
};
use crate::domain::orders::{Account, Execution, MarginAccount, Order, OrderStatus, Portfolio};
use crate::domain::repository::{
    AccountRepository, AssetRepository, BarRepository, BehaviorRepository, EventRepository,
    OrderRepository, SnapshotRepository,
};

type BarSeries = BTreeMap<DateTime<Utc>, OhlcBar>;

/// How much history the store keeps before dropping the oldest entries.
///
/// Bars are capped per (asset, timeframe) series; the daily rollup needs a
/// full day of minute bars, so keep at least 1440. Filled and cancelled
/// orders are dropped oldest first once they exceed `terminal_orders`;
/// pending orders are never pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub bars_per_series: usize,
    pub terminal_orders: usize,
    pub executions: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            bars_per_series: 2 * 1440,
            terminal_orders: 10_000,
            executions: 10_000,
        }
    }
}

/// Injected write failures, keyed by entity id
#[derive(Debug, Default)]
struct FailurePlan {
    snapshots: HashSet<AssetId>,
    orders: HashSet<OrderId>,
    accounts: HashSet<AccountId>,
    portfolios: HashSet<AccountId>,
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    retention: Retention,
    assets: RwLock<BTreeMap<AssetId, Asset>>,
    snapshots: RwLock<HashMap<AssetId, MarketSnapshot>>,
    events: RwLock<Vec<MarketEvent>>,
    bars: RwLock<HashMap<(AssetId, Timeframe), BarSeries>>,
    orders: RwLock<BTreeMap<OrderId, Order>>,
    // Terminal order ids in the order they settled
    terminal: RwLock<VecDeque<OrderId>>,
    executions: RwLock<VecDeque<Execution>>,
    accounts: RwLock<HashMap<AccountId, Account>>,
    portfolios: RwLock<HashMap<AccountId, Portfolio>>,
    margin_accounts: RwLock<HashMap<AccountId, MarginAccount>>,
    behaviors: RwLock<HashMap<AccountId, TraderBehaviorState>>,
    consequences: RwLock<Vec<ConsequenceRecord>>,
    failures: RwLock<FailurePlan>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Retention) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.read().len()
    }

    pub fn bar_count(&self, asset_id: &AssetId, timeframe: Timeframe) -> usize {
        self.bars
            .read()
            .get(&(*asset_id, timeframe))
            .map_or(0, |series| series.len())
    }

    pub fn insert_margin_account(&self, margin: MarginAccount) {
        self.margin_accounts.write().insert(margin.account_id, margin);
    }

    pub fn insert_behavior(&self, state: TraderBehaviorState) {
        self.behaviors.write().insert(state.account_id, state);
    }

    pub fn consequences_for(&self, account_id: &AccountId) -> Vec<ConsequenceRecord> {
        self.consequences
            .read()
            .iter()
            .filter(|r| &r.account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn executions_for(&self, order_id: &OrderId) -> Vec<Execution> {
        self.executions
            .read()
            .iter()
            .filter(|e| &e.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    /// Make every snapshot write for `asset_id` fail.
    #[cfg(any(test, feature = "testkit"))]
    pub fn fail_snapshot_writes(&self, asset_id: AssetId) {
        self.failures.write().snapshots.insert(asset_id);
    }

    /// Make every write of order `order_id` fail.
    #[cfg(any(test, feature = "testkit"))]
    pub fn fail_order_writes(&self, order_id: OrderId) {
        self.failures.write().orders.insert(order_id);
    }

    /// Make every account write for `account_id` fail.
    #[cfg(any(test, feature = "testkit"))]
    pub fn fail_account_writes(&self, account_id: AccountId) {
        self.failures.write().accounts.insert(account_id);
    }

    /// Make every portfolio write for `account_id` fail.
    #[cfg(any(test, feature = "testkit"))]
    pub fn fail_portfolio_writes(&self, account_id: AccountId) {
        self.failures.write().portfolios.insert(account_id);
    }

    #[cfg(any(test, feature = "testkit"))]
    pub fn clear_failures(&self) {
        *self.failures.write() = FailurePlan::default();
    }
}

#[async_trait]
impl AssetRepository for InMemoryStorage {
    async fn list_assets(&self) -> StorageResult<Vec<Asset>> {
        Ok(self.assets.read().values().cloned().collect())
    }

    async fn get_asset(&self, id: &AssetId) -> StorageResult<Option<Asset>> {
        Ok(self.assets.read().get(id).cloned())
    }

    async fn save_asset(&self, asset: &Asset) -> StorageResult<()> {
        self.assets.write().insert(asset.id, asset.clone());
        Ok(())
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryStorage {
    async fn get_snapshot(&self, asset_id: &AssetId) -> StorageResult<Option<MarketSnapshot>> {
        Ok(self.snapshots.read().get(asset_id).cloned())
    }

    async fn list_snapshots(&self) -> StorageResult<Vec<MarketSnapshot>> {
        Ok(self.snapshots.read().values().cloned().collect())
    }

    async fn save_snapshot(&self, snapshot: &MarketSnapshot) -> StorageResult<()> {
        if self.failures.read().snapshots.contains(&snapshot.asset_id) {
            return Err(StorageError::Write(format!(
                "snapshot for asset {}",
                snapshot.asset_id
            )));
        }
        self.snapshots
            .write()
            .insert(snapshot.asset_id, snapshot.clone());
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryStorage {
    async fn active_events(&self) -> StorageResult<Vec<MarketEvent>> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.active)
            .cloned()
            .collect())
    }

    async fn save_event(&self, event: &MarketEvent) -> StorageResult<()> {
        let mut events = self.events.write();
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event.clone(),
            None => events.push(event.clone()),
        }
        Ok(())
    }

    async fn deactivate_event(&self, id: &EventId) -> StorageResult<()> {
        let mut events = self.events.write();
        let event = events
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("event {}", id)))?;
        event.active = false;
        Ok(())
    }
}

#[async_trait]
impl BarRepository for InMemoryStorage {
    async fn append_bar(&self, bar: &OhlcBar) -> StorageResult<bool> {
        let mut bars = self.bars.write();
        let series = bars.entry((bar.asset_id, bar.timeframe)).or_default();
        if series.contains_key(&bar.period_start) {
            return Ok(false);
        }
        series.insert(bar.period_start, bar.clone());
        while series.len() > self.retention.bars_per_series {
            series.pop_first();
        }
        Ok(true)
    }

    async fn bars_between(
        &self,
        asset_id: &AssetId,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StorageResult<Vec<OhlcBar>> {
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(self
            .bars
            .read()
            .get(&(*asset_id, timeframe))
            .map(|series| series.range(from..to).map(|(_, bar)| bar.clone()).collect())
            .unwrap_or_default())
    }

    async fn recent_bars(
        &self,
        asset_id: &AssetId,
        timeframe: Timeframe,
        limit: usize,
    ) -> StorageResult<Vec<OhlcBar>> {
        Ok(self
            .bars
            .read()
            .get(&(*asset_id, timeframe))
            .map(|series| series.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStorage {
    async fn get_order(&self, id: &OrderId) -> StorageResult<Option<Order>> {
        Ok(self.orders.read().get(id).cloned())
    }

    async fn save_order(&self, order: &Order) -> StorageResult<()> {
        if self.failures.read().orders.contains(&order.id) {
            return Err(StorageError::Write(format!("order {}", order.id)));
        }
        let mut orders = self.orders.write();
        let previous = orders.insert(order.id, order.clone());
        let was_terminal = previous.is_some_and(|p| p.status != OrderStatus::Pending);
        if order.status != OrderStatus::Pending && !was_terminal {
            let mut terminal = self.terminal.write();
            terminal.push_back(order.id);
            while terminal.len() > self.retention.terminal_orders {
                if let Some(oldest) = terminal.pop_front() {
                    orders.remove(&oldest);
                }
            }
        }
        Ok(())
    }

    async fn pending_orders(&self) -> StorageResult<Vec<Order>> {
        Ok(self
            .orders
            .read()
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .cloned()
            .collect())
    }

    async fn record_execution(&self, execution: &Execution) -> StorageResult<()> {
        let mut executions = self.executions.write();
        executions.push_back(execution.clone());
        while executions.len() > self.retention.executions {
            executions.pop_front();
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryStorage {
    async fn list_accounts(&self) -> StorageResult<Vec<Account>> {
        Ok(self.accounts.read().values().cloned().collect())
    }

    async fn get_account(&self, id: &AccountId) -> StorageResult<Option<Account>> {
        Ok(self.accounts.read().get(id).cloned())
    }

    async fn save_account(&self, account: &Account) -> StorageResult<()> {
        if self.failures.read().accounts.contains(&account.id) {
            return Err(StorageError::Write(format!("account {}", account.id)));
        }
        self.accounts.write().insert(account.id, account.clone());
        Ok(())
    }

    async fn get_portfolio(&self, account_id: &AccountId) -> StorageResult<Option<Portfolio>> {
        Ok(self.portfolios.read().get(account_id).cloned())
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> StorageResult<()> {
        if self.failures.read().portfolios.contains(&portfolio.account_id) {
            return Err(StorageError::Write(format!(
                "portfolio for account {}",
                portfolio.account_id
            )));
        }
        self.portfolios
            .write()
            .insert(portfolio.account_id, portfolio.clone());
        Ok(())
    }

    async fn get_margin_account(
        &self,
        account_id: &AccountId,
    ) -> StorageResult<Option<MarginAccount>> {
        Ok(self.margin_accounts.read().get(account_id).cloned())
    }
}

#[async_trait]
impl BehaviorRepository for InMemoryStorage {
    async fn get_behavior(
        &self,
        account_id: &AccountId,
    ) -> StorageResult<Option<TraderBehaviorState>> {
        Ok(self.behaviors.read().get(account_id).cloned())
    }

    async fn append_consequence(&self, record: &ConsequenceRecord) -> StorageResult<()> {
        self.consequences.write().push(record.clone());
        Ok(())
    }
}
