// src/trading/validation.rs
// Admission control for orders
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::MarketConfig;
use crate::domain::errors::{TradingResult, ValidationError};
use crate::domain::models::{Asset, MarketSnapshot};
use crate::domain::orders::{Account, MarginAccount, Order, OrderSide, OrderType, Portfolio};
use crate::domain::repository::{AccountRepository, AssetRepository, SnapshotRepository, Storage};
use crate::domain::service::{MarketCalendar, ScarcityOracle};
use crate::trading::commission;

/// Scarcity multipliers above this are called out in the log
const HIGH_SCARCITY: f64 = 1.5;

/// Everything the validator loaded, handed on to execution.
#[derive(Debug, Clone)]
pub struct AdmissionContext {
    pub account: Account,
    pub portfolio: Portfolio,
    pub asset: Asset,
    pub snapshot: MarketSnapshot,
    pub margin: Option<MarginAccount>,
    /// Quote the order would trade at right now
    pub estimated_price: Decimal,
}

impl AdmissionContext {
    /// Cash, or the margin account's buying power when one exists
    pub fn buying_power(&self) -> Decimal {
        self.margin
            .as_ref()
            .map(|m| m.buying_power)
            .unwrap_or(self.portfolio.cash_balance)
    }

    /// Reject a buy whose total cost exceeds the available buying power.
    pub fn check_buying_power(&self, cost: Decimal) -> Result<(), ValidationError> {
        let available = self.buying_power();
        if cost > available {
            return Err(ValidationError::new(format!(
                "Insufficient buying power: ${} available",
                available.round_dp(2)
            )));
        }
        Ok(())
    }
}

/// Sequential admission checks; the first failure wins.
pub struct OrderValidator {
    calendar: Arc<dyn MarketCalendar>,
    scarcity: Option<Arc<dyn ScarcityOracle>>,
    config: MarketConfig,
}

fn reject<T>(reason: impl Into<String>) -> TradingResult<T> {
    Err(ValidationError::new(reason).into())
}

impl OrderValidator {
    pub fn new(
        calendar: Arc<dyn MarketCalendar>,
        scarcity: Option<Arc<dyn ScarcityOracle>>,
        config: MarketConfig,
    ) -> Self {
        Self {
            calendar,
            scarcity,
            config,
        }
    }

    pub fn scarcity(&self) -> Option<&Arc<dyn ScarcityOracle>> {
        self.scarcity.as_ref()
    }

    /// Price the order would execute at before slippage and modifiers.
    pub fn estimate_price(order: &Order, snapshot: &MarketSnapshot) -> Decimal {
        let quote = match order.side {
            OrderSide::Buy => snapshot.ask,
            OrderSide::Sell => snapshot.bid,
        };
        // Limit orders trigger off the last traded price, not the quote
        match (order.order_type, order.side) {
            (OrderType::Limit(limit), OrderSide::Buy) => snapshot.current_price.min(limit),
            (OrderType::Limit(limit), OrderSide::Sell) => snapshot.current_price.max(limit),
            _ => quote,
        }
    }

    /// Validate an order against account state and market conditions.
    ///
    /// Returns `TradingError::Validation` with the rejection reason on the first
    /// failing check, or `TradingError::Storage` when a lookup fails.
    pub async fn validate(
        &self,
        storage: &dyn Storage,
        order: &Order,
        now: DateTime<Utc>,
    ) -> TradingResult<AdmissionContext> {
        let Some(account) = storage.get_account(&order.account_id).await? else {
            return reject("Account not found");
        };
        let Some(portfolio) = storage.get_portfolio(&order.account_id).await? else {
            return reject("Portfolio not found");
        };

        if !self.calendar.is_open(now) {
            return reject("Market is closed");
        }

        if order.quantity <= Decimal::ZERO {
            return reject("Quantity must be positive");
        }

        let Some(asset) = storage.get_asset(&order.asset_id).await? else {
            return reject("Asset not found");
        };
        let Some(snapshot) = storage.get_snapshot(&order.asset_id).await? else {
            return reject("No market data for asset");
        };

        let estimated_price = Self::estimate_price(order, &snapshot);
        let notional = (order.quantity * estimated_price).round_dp(2);

        self.scarcity_advisory(order, &asset, estimated_price).await;

        let margin = storage.get_margin_account(&order.account_id).await?;
        let ctx = AdmissionContext {
            account,
            portfolio,
            asset,
            snapshot,
            margin,
            estimated_price,
        };

        // Margin maintenance applies to both sides
        if let Some(margin) = &ctx.margin {
            if margin.equity < margin.maintenance_requirement {
                return reject("Account below maintenance margin requirement");
            }
        }

        if order.side == OrderSide::Buy {
            let cost = notional + commission(notional, &self.config);
            ctx.check_buying_power(cost)?;
        }

        if notional > ctx.account.max_position_size {
            return reject(format!(
                "Order exceeds maximum position size of ${}",
                ctx.account.max_position_size
            ));
        }

        if ctx.account.daily_trading_used + notional > ctx.account.daily_trading_limit {
            return reject("Order exceeds daily trading limit");
        }

        if order.side == OrderSide::Sell {
            let held = ctx.portfolio.held_quantity(&order.asset_id);
            if held < order.quantity {
                if !order.is_short_sale {
                    return reject("Insufficient holdings for sell order");
                }
                let uncovered = order.quantity - held;
                let existing = ctx.portfolio.short_quantity(&order.asset_id);
                let ceiling = ctx.account.max_position_size * self.config.short_exposure_ratio;
                if (existing + uncovered) * estimated_price > ceiling {
                    return reject("Short position would exceed maximum short limit");
                }
            }
        }

        Ok(ctx)
    }

    /// Log scarcity fees and multipliers. Never rejects.
    async fn scarcity_advisory(&self, order: &Order, asset: &Asset, price: Decimal) {
        let Some(oracle) = &self.scarcity else {
            return;
        };

        if order.side == OrderSide::Buy {
            match oracle.fee_for(asset, order.quantity, price).await {
                Ok(fee) if fee > Decimal::ZERO => {
                    log::info!("Scarcity fee for {} on {}: {}", order.id, asset.symbol, fee);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to check scarcity fee for {}: {}", asset.symbol, e),
            }
        }

        match oracle.scarcity_multiplier(asset).await {
            Ok(multiplier) if multiplier > HIGH_SCARCITY => {
                log::info!("High scarcity detected for {}: {:.2}x", asset.symbol, multiplier);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Failed to check scarcity multiplier for {}: {}", asset.symbol, e),
        }
    }
}
