// src/trading/scheduler.rs
// Periodic sweep over pending orders
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::domain::errors::TradingResult;
use crate::domain::orders::{Order, OrderSide, OrderType};
use crate::domain::repository::{OrderRepository, Storage};
use crate::domain::service::MarketCalendar;
use crate::trading::execution::{ExecutionEngine, ExecutionOutcome};

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Market closed; no order was touched
    pub skipped: bool,
    pub examined: usize,
    pub filled: usize,
    pub rejected: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Price priority within one side: market orders first, then the most
/// aggressive price, then the oldest order.
fn price_priority(a: &Order, b: &Order) -> Ordering {
    let by_price = match (a.order_type, b.order_type) {
        (OrderType::Limit(pa), OrderType::Limit(pb)) => match a.side {
            OrderSide::Buy => pb.cmp(&pa),
            OrderSide::Sell => pa.cmp(&pb),
        },
        (OrderType::Limit(_), _) => Ordering::Greater,
        (_, OrderType::Limit(_)) => Ordering::Less,
        _ => Ordering::Equal,
    };
    by_price.then(a.created_at.cmp(&b.created_at))
}

/// Arrange pending orders for execution.
///
/// Orders are laid out by creation time. The slots held by buys are then
/// refilled with the buys in price priority, and likewise for sells, so
/// mixed sides keep their FIFO interleaving.
pub fn execution_order(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut buys: Vec<Order> = orders.iter().filter(|o| o.side == OrderSide::Buy).cloned().collect();
    let mut sells: Vec<Order> = orders.iter().filter(|o| o.side == OrderSide::Sell).cloned().collect();
    buys.sort_by(price_priority);
    sells.sort_by(price_priority);

    let mut buys = buys.into_iter();
    let mut sells = sells.into_iter();
    orders
        .iter()
        .filter_map(|slot| match slot.side {
            OrderSide::Buy => buys.next(),
            OrderSide::Sell => sells.next(),
        })
        .collect()
}

pub struct PendingOrderScheduler {
    storage: Arc<dyn Storage>,
    engine: Arc<ExecutionEngine>,
    calendar: Arc<dyn MarketCalendar>,
}

impl PendingOrderScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: Arc<ExecutionEngine>,
        calendar: Arc<dyn MarketCalendar>,
    ) -> Self {
        Self {
            storage,
            engine,
            calendar,
        }
    }

    /// Try every pending order once. A failure on one order is logged and the
    /// sweep moves on.
    ///
    /// Outside trading hours resting orders are left alone; admission would
    /// otherwise cancel them as "Market is closed".
    pub async fn sweep(&self, now: DateTime<Utc>) -> TradingResult<SweepSummary> {
        if !self.calendar.is_open(now) {
            log::debug!("Market closed at {}, skipping pending sweep", now);
            return Ok(SweepSummary {
                skipped: true,
                ..SweepSummary::default()
            });
        }

        let pending = self.storage.pending_orders().await?;
        let mut summary = SweepSummary {
            examined: pending.len(),
            ..SweepSummary::default()
        };

        for order in execution_order(pending) {
            match self.engine.execute(&order.id, now).await {
                Ok(ExecutionOutcome::Filled(_)) => summary.filled += 1,
                Ok(ExecutionOutcome::Rejected(_)) => summary.rejected += 1,
                Ok(ExecutionOutcome::Pending) => summary.pending += 1,
                Err(e) => {
                    summary.failed += 1;
                    log::error!("Failed to process pending order {}: {}", order.id, e);
                }
            }
        }

        if summary.examined > 0 {
            log::info!(
                "Pending sweep: {} examined, {} filled, {} rejected, {} still pending, {} failed",
                summary.examined,
                summary.filled,
                summary.rejected,
                summary.pending,
                summary.failed
            );
        }

        Ok(summary)
    }
}
