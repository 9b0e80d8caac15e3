// src/domain/orders.rs
use crate::domain::errors::{TradingError, TradingResult, ValidationError};
use crate::domain::models::{AccountId, AssetId, OrderId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit(Decimal),
    /// Fills as a market order; the trigger price is carried but not tracked.
    Stop(Decimal),
}

impl OrderType {
    /// Parse the textual type used by the submission path.
    pub fn parse(kind: &str, price: Option<Decimal>) -> TradingResult<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => price.map(OrderType::Limit).ok_or_else(|| {
                ValidationError::new("Limit orders require a limit price").into()
            }),
            "stop" => price.map(OrderType::Stop).ok_or_else(|| {
                ValidationError::new("Stop orders require a stop price").into()
            }),
            other => Err(TradingError::UnsupportedOrderType(other.to_string())),
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self, OrderType::Market | OrderType::Stop(_))
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit(price) => write!(f, "LIMIT {}", price),
            OrderType::Stop(price) => write!(f, "STOP {}", price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Order as it arrives from the submission path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub side: OrderSide,
    pub order_type: String,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub is_short_sale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub is_short_sale: bool,
    pub status: OrderStatus,
    pub rejection_reason: Option<String>,
    pub fill_price: Option<Decimal>,
    pub fill_quantity: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order
    pub fn new(
        account_id: AccountId,
        asset_id: AssetId,
        side: OrderSide,
        order_type: OrderType,
        quantity: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account_id,
            asset_id,
            side,
            order_type,
            quantity,
            is_short_sale: false,
            status: OrderStatus::Pending,
            rejection_reason: None,
            fill_price: None,
            fill_quantity: None,
            fees: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_request(request: &OrderRequest) -> TradingResult<Self> {
        let order_type = OrderType::parse(&request.order_type, request.limit_price)?;
        let mut order = Order::new(
            request.account_id,
            request.asset_id,
            request.side,
            order_type,
            request.quantity,
        );
        order.is_short_sale = request.is_short_sale;
        Ok(order)
    }

    pub fn with_short_sale(mut self) -> Self {
        self.is_short_sale = true;
        self
    }

    pub fn mark_filled(&mut self, price: Decimal, quantity: Decimal, fees: Decimal) {
        self.status = OrderStatus::Filled;
        self.fill_price = Some(price);
        self.fill_quantity = Some(quantity);
        self.fees = Some(fees);
        self.updated_at = Utc::now();
    }

    pub fn mark_cancelled(&mut self, reason: &str) {
        self.status = OrderStatus::Cancelled;
        self.rejection_reason = Some(reason.to_string());
        self.updated_at = Utc::now();
    }
}

/// A completed fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub slippage_percent: f64,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub asset_id: AssetId,
    pub quantity: Decimal,
    pub average_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub account_id: AccountId,
    pub cash_balance: Decimal,
    pub holdings: BTreeMap<AssetId, Holding>,
    /// Uncovered quantity sold short, per asset.
    pub short_positions: BTreeMap<AssetId, Decimal>,
}

impl Portfolio {
    pub fn new(account_id: AccountId, cash_balance: Decimal) -> Self {
        Self {
            account_id,
            cash_balance,
            holdings: BTreeMap::new(),
            short_positions: BTreeMap::new(),
        }
    }

    pub fn held_quantity(&self, asset_id: &AssetId) -> Decimal {
        self.holdings
            .get(asset_id)
            .map(|h| h.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn short_quantity(&self, asset_id: &AssetId) -> Decimal {
        self.short_positions
            .get(asset_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Per-account trading ceilings and usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub max_position_size: Decimal,
    pub daily_trading_limit: Decimal,
    pub daily_trading_used: Decimal,
    pub usage_date: NaiveDate,
}

impl Account {
    pub fn new(username: &str, max_position_size: Decimal, daily_trading_limit: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            max_position_size,
            daily_trading_limit,
            daily_trading_used: Decimal::ZERO,
            usage_date: Utc::now().date_naive(),
        }
    }

    /// Zero the daily usage when the trading day rolls over. Returns true if reset.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if self.usage_date == today {
            return false;
        }
        self.usage_date = today;
        self.daily_trading_used = Decimal::ZERO;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginAccount {
    pub account_id: AccountId,
    pub buying_power: Decimal,
    pub equity: Decimal,
    pub maintenance_requirement: Decimal,
}
