// src/trading/execution.rs
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MarketConfig;
use crate::domain::behavior::{BehaviorDelta, ConsequenceRecord, TraderBehaviorState};
use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{to_f64, to_money, OrderId};
use crate::domain::orders::{Account, Execution, Order, OrderSide, OrderType, Portfolio};
use crate::domain::repository::{
    AccountRepository, BehaviorRepository, OrderRepository, SnapshotRepository, Storage,
};
use crate::simulation::pricing::validate_price;
use crate::trading::modifiers::{ChainResult, ModifierChain, ModifierContext};
use crate::trading::settlement::settle;
use crate::trading::validation::{AdmissionContext, OrderValidator};
use crate::trading::{apply_slippage, commission, slippage};

/// A fill, with what the modifier chain did to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub order: Order,
    pub execution: Execution,
    pub records: Vec<ConsequenceRecord>,
    /// Summed delta for the behavior tracker; not applied here
    pub delta: BehaviorDelta,
}

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Filled(Box<ExecutionReport>),
    /// Not executable yet, or another attempt on the same order is in flight
    Pending,
    Rejected(String),
}

impl ExecutionOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, ExecutionOutcome::Filled(_))
    }
}

/// Removes the order from the in-flight set when the attempt ends.
struct InFlight<'a> {
    set: &'a DashSet<OrderId>,
    id: OrderId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<OrderId>, id: OrderId) -> Option<Self> {
        set.insert(id).then(|| Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Order state machine: pending -> filled | cancelled.
pub struct ExecutionEngine {
    storage: Arc<dyn Storage>,
    validator: OrderValidator,
    chain: ModifierChain,
    config: MarketConfig,
    rng: Mutex<StdRng>,
    in_flight: DashSet<OrderId>,
}

impl ExecutionEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        validator: OrderValidator,
        chain: ModifierChain,
        config: MarketConfig,
        rng: StdRng,
    ) -> Self {
        log::info!("Execution modifiers: {}", chain.names().join(", "));
        Self {
            storage,
            validator,
            chain,
            config,
            rng: Mutex::new(rng),
            in_flight: DashSet::new(),
        }
    }

    /// Attempt to execute a stored order.
    ///
    /// Validation failures cancel the order and come back as `Rejected`.
    /// Storage failures are returned as errors and leave the order pending.
    pub async fn execute(&self, order_id: &OrderId, now: DateTime<Utc>) -> TradingResult<ExecutionOutcome> {
        let Some(_guard) = InFlight::acquire(&self.in_flight, *order_id) else {
            log::debug!("Order {} already executing, leaving it pending", order_id);
            return Ok(ExecutionOutcome::Pending);
        };

        let mut order = self
            .storage
            .get_order(order_id)
            .await?
            .ok_or(TradingError::OrderNotFound(*order_id))?;

        if order.status.is_terminal() {
            return Err(TradingError::OrderFinalized {
                id: order.id,
                status: order.status,
            });
        }

        let ctx = match self.validator.validate(self.storage.as_ref(), &order, now).await {
            Ok(ctx) => ctx,
            Err(TradingError::Validation(e)) => return self.reject(&mut order, &e.reason).await,
            Err(e) => return Err(e),
        };

        let Some((candidate, slippage)) = self.candidate_price(&order, &ctx) else {
            log::debug!("Order {} ({}) not executable yet", order.id, order.order_type);
            return Ok(ExecutionOutcome::Pending);
        };

        let trader = self
            .storage
            .get_behavior(&order.account_id)
            .await?
            .unwrap_or_else(|| TraderBehaviorState::neutral(order.account_id))
            .clamped();

        let chained = self.apply_modifiers(&trader, &order, &ctx, candidate);
        let price = validate_price(chained.price, "Execution price");
        let notional = (order.quantity * price).round_dp(2);
        let fees = commission(notional, &self.config) + self.scarcity_fee(&order, &ctx, price).await;

        if order.side == OrderSide::Buy {
            if let Err(e) = ctx.check_buying_power(notional + fees) {
                return self.reject(&mut order, &e.reason).await;
            }
        }

        self.fill(order, ctx, price, fees, slippage, chained, now).await
    }

    /// Execution price before modifiers, with the slippage charged on it.
    /// `None` while a limit order's condition is unmet.
    fn candidate_price(&self, order: &Order, ctx: &AdmissionContext) -> Option<(f64, f64)> {
        let snapshot = &ctx.snapshot;
        match order.order_type {
            // Stop orders fill as market orders; the trigger is not tracked
            OrderType::Market | OrderType::Stop(_) => {
                let quote = match order.side {
                    OrderSide::Buy => to_f64(snapshot.ask),
                    OrderSide::Sell => to_f64(snapshot.bid),
                };
                let slip = slippage(
                    to_f64(order.quantity),
                    quote,
                    snapshot.volume_24h,
                    self.config.slippage_factor,
                );
                Some((apply_slippage(order.side, quote, slip), slip))
            }
            OrderType::Limit(limit) => {
                let market = snapshot.current_price;
                let price = match order.side {
                    OrderSide::Buy if market <= limit => market.min(limit),
                    OrderSide::Sell if market >= limit => market.max(limit),
                    _ => return None,
                };
                Some((to_f64(price), 0.0))
            }
        }
    }

    fn apply_modifiers(
        &self,
        trader: &TraderBehaviorState,
        order: &Order,
        ctx: &AdmissionContext,
        candidate: f64,
    ) -> ChainResult {
        let modifier_ctx = ModifierContext {
            trader,
            order,
            asset: &ctx.asset,
            snapshot: &ctx.snapshot,
            market_price: candidate,
        };
        let mut rng = self.rng.lock();
        self.chain.apply(&modifier_ctx, &mut *rng)
    }

    async fn scarcity_fee(&self, order: &Order, ctx: &AdmissionContext, price: Decimal) -> Decimal {
        if order.side != OrderSide::Buy {
            return Decimal::ZERO;
        }
        let Some(oracle) = self.validator.scarcity() else {
            return Decimal::ZERO;
        };
        match oracle.fee_for(&ctx.asset, order.quantity, price).await {
            Ok(fee) => fee.max(Decimal::ZERO).round_dp(2),
            Err(e) => {
                log::warn!("Scarcity fee unavailable for {}: {}", ctx.asset.symbol, e);
                Decimal::ZERO
            }
        }
    }

    async fn reject(&self, order: &mut Order, reason: &str) -> TradingResult<ExecutionOutcome> {
        order.mark_cancelled(reason);
        self.storage.save_order(order).await?;
        log::info!("Order {} rejected: {}", order.id, reason);
        Ok(ExecutionOutcome::Rejected(reason.to_string()))
    }

    async fn restore(&self, portfolio: &Portfolio, account: &Account, order_id: OrderId) {
        if let Err(e) = self.storage.save_portfolio(portfolio).await {
            log::error!("Failed to restore portfolio after order {}: {}", order_id, e);
        }
        if let Err(e) = self.storage.save_account(account).await {
            log::error!("Failed to restore account after order {}: {}", order_id, e);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn fill(
        &self,
        order: Order,
        ctx: AdmissionContext,
        price: Decimal,
        fees: Decimal,
        slippage: f64,
        chained: ChainResult,
        now: DateTime<Utc>,
    ) -> TradingResult<ExecutionOutcome> {
        let AdmissionContext {
            mut account,
            mut portfolio,
            ..
        } = ctx;

        let original_portfolio = portfolio.clone();
        let original_account = account.clone();

        let settlement = settle(
            &mut portfolio,
            &mut account,
            order.asset_id,
            order.side,
            order.quantity,
            price,
            fees,
        );

        // Settlement lands before the order turns Filled; any failure puts the balances back
        let committed = async {
            self.storage.save_portfolio(&portfolio).await?;
            self.storage.save_account(&account).await?;
            let mut filled = order.clone();
            filled.mark_filled(price, filled.quantity, fees);
            self.storage.save_order(&filled).await?;
            Ok::<Order, TradingError>(filled)
        }
        .await;
        let order = match committed {
            Ok(filled) => filled,
            Err(e) => {
                self.restore(&original_portfolio, &original_account, order.id).await;
                return Err(e);
            }
        };

        let execution = Execution {
            id: Uuid::new_v4(),
            order_id: order.id,
            account_id: order.account_id,
            asset_id: order.asset_id,
            side: order.side,
            quantity: order.quantity,
            price,
            fees,
            slippage_percent: slippage * 100.0,
            executed_at: now,
        };
        if let Err(e) = self.storage.record_execution(&execution).await {
            log::error!("Failed to record execution for order {}: {}", order.id, e);
        }

        // Traded quantity feeds the rolling volume; re-read so a concurrent tick isn't clobbered
        match self.storage.get_snapshot(&order.asset_id).await {
            Ok(Some(mut snapshot)) => {
                snapshot.record_trade_volume(order.quantity.ceil().to_u64().unwrap_or(0));
                if let Err(e) = self.storage.save_snapshot(&snapshot).await {
                    log::warn!("Failed to record traded volume for order {}: {}", order.id, e);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to record traded volume for order {}: {}", order.id, e),
        }

        let records: Vec<ConsequenceRecord> = chained
            .applied
            .iter()
            .map(|applied| ConsequenceRecord {
                id: Uuid::new_v4(),
                account_id: order.account_id,
                order_id: order.id,
                asset_id: order.asset_id,
                modifier: applied.name.to_string(),
                description: applied.description.clone(),
                price_before: to_money(applied.price_before),
                price_after: to_money(applied.price_after),
                rate: applied.rate,
                delta: applied.delta,
                created_at: now,
            })
            .collect();

        for record in &records {
            if let Err(e) = self.storage.append_consequence(record).await {
                log::error!("Failed to record consequence {} for order {}: {}", record.modifier, order.id, e);
            }
        }

        log::info!(
            "Order {} filled: {} {} @ {} (fees {}, notional {}, {} modifiers)",
            order.id,
            order.side.as_str(),
            order.quantity,
            price,
            fees,
            settlement.notional,
            records.len()
        );

        Ok(ExecutionOutcome::Filled(Box::new(ExecutionReport {
            order,
            execution,
            records,
            delta: chained.delta,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Asset, AssetMetadata, AssetType, MarketSnapshot};
    use crate::domain::orders::{Account, OrderStatus, Portfolio};
    use crate::domain::repository::AssetRepository;
    use crate::infrastructure::calendar::AlwaysOpen;
    use crate::infrastructure::memory::InMemoryStorage;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;

    struct Harness {
        storage: Arc<InMemoryStorage>,
        engine: ExecutionEngine,
        account: Account,
        asset: Asset,
    }

    async fn harness(price: Decimal) -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let account = Account::new("carol", dec!(100000), dec!(100000));
        let asset = Asset::new("BAT", "Bat", AssetType::Character, AssetMetadata::default());
        storage.save_account(&account).await.unwrap();
        storage
            .save_portfolio(&Portfolio::new(account.id, dec!(10000)))
            .await
            .unwrap();
        storage.save_asset(&asset).await.unwrap();
        storage
            .save_snapshot(&MarketSnapshot {
                asset_id: asset.id,
                current_price: price,
                bid: price - dec!(0.01),
                ask: price + dec!(0.01),
                volume_24h: 1000,
                trend: 0.0,
                momentum: 0.0,
                volatility: 0.02,
                day_change: Decimal::ZERO,
                day_change_percent: 0.0,
                supply: 500_000,
                price_history: VecDeque::new(),
                last_updated: Utc::now(),
            })
            .await
            .unwrap();

        let config = MarketConfig::default();
        let validator = OrderValidator::new(Arc::new(AlwaysOpen), None, config.clone());
        let engine = ExecutionEngine::new(
            storage.clone(),
            validator,
            ModifierChain::standard(),
            config,
            StdRng::seed_from_u64(7),
        );
        Harness {
            storage,
            engine,
            account,
            asset,
        }
    }

    async fn place(h: &Harness, side: OrderSide, order_type: OrderType, qty: Decimal) -> Order {
        let order = Order::new(h.account.id, h.asset.id, side, order_type, qty);
        h.storage.save_order(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn market_buy_fills_at_ask_plus_slippage() {
        let h = harness(dec!(10.00)).await;
        let order = place(&h, OrderSide::Buy, OrderType::Market, dec!(10)).await;

        let outcome = h.engine.execute(&order.id, Utc::now()).await.unwrap();
        let ExecutionOutcome::Filled(report) = outcome else {
            panic!("expected a fill");
        };
        // slippage = 10 / 1000 * 0.001, far below a cent
        assert_eq!(report.execution.price, dec!(10.01));
        assert_eq!(report.execution.fees, dec!(1));
        assert!(report.records.is_empty());

        let stored = h.storage.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Filled);
        let portfolio = h.storage.get_portfolio(&h.account.id).await.unwrap().unwrap();
        assert_eq!(portfolio.held_quantity(&h.asset.id), dec!(10));
        assert_eq!(portfolio.cash_balance, dec!(10000) - dec!(100.10) - dec!(1));
        let snapshot = h.storage.get_snapshot(&h.asset.id).await.unwrap().unwrap();
        assert_eq!(snapshot.volume_24h, 10);
    }

    #[tokio::test]
    async fn unmet_limit_stays_pending() {
        let h = harness(dec!(10.01)).await;
        let order = place(&h, OrderSide::Buy, OrderType::Limit(dec!(10.00)), dec!(5)).await;

        let outcome = h.engine.execute(&order.id, Utc::now()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Pending);
        let stored = h.storage.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_orders_cannot_execute_again() {
        let h = harness(dec!(10.00)).await;
        let order = place(&h, OrderSide::Buy, OrderType::Market, dec!(1)).await;
        assert!(h.engine.execute(&order.id, Utc::now()).await.unwrap().is_filled());

        let err = h.engine.execute(&order.id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, TradingError::OrderFinalized { status: OrderStatus::Filled, .. }));
    }

    #[tokio::test]
    async fn rejection_cancels_with_reason() {
        let h = harness(dec!(10.00)).await;
        let order = place(&h, OrderSide::Sell, OrderType::Market, dec!(3)).await;

        let outcome = h.engine.execute(&order.id, Utc::now()).await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Rejected("Insufficient holdings for sell order".to_string())
        );
        let stored = h.storage.get_order(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(
            stored.rejection_reason.as_deref(),
            Some("Insufficient holdings for sell order")
        );
    }

    #[tokio::test]
    async fn in_flight_order_reports_pending() {
        let h = harness(dec!(10.00)).await;
        let order = place(&h, OrderSide::Buy, OrderType::Market, dec!(1)).await;

        let guard = InFlight::acquire(&h.engine.in_flight, order.id);
        assert!(guard.is_some());
        let outcome = h.engine.execute(&order.id, Utc::now()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Pending);

        drop(guard);
        assert!(h.engine.execute(&order.id, Utc::now()).await.unwrap().is_filled());
    }

    #[tokio::test]
    async fn modifier_records_are_reported_and_stored() {
        let h = harness(dec!(10.00)).await;
        let mut trader = TraderBehaviorState::neutral(h.account.id);
        trader.reputation = 1000.0;
        h.storage.insert_behavior(trader);

        let order = place(&h, OrderSide::Buy, OrderType::Limit(dec!(10.00)), dec!(10)).await;
        let ExecutionOutcome::Filled(report) = h.engine.execute(&order.id, Utc::now()).await.unwrap() else {
            panic!("expected a fill");
        };
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].modifier, "karmic_standing");
        assert!(report.execution.price < dec!(10.00));
        assert_eq!(h.storage.consequences_for(&h.account.id).len(), 1);
    }
}
