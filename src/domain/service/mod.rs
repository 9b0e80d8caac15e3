// src/domain/service/mod.rs
// Collaborator interfaces the engine consumes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::errors::StorageResult;
use crate::domain::models::Asset;

/// Trading-hours gate, independent of the asset
pub trait MarketCalendar: Send + Sync {
    fn is_open(&self, now: DateTime<Utc>) -> bool;
}

/// Scarcity and vaulting fees
#[async_trait]
pub trait ScarcityOracle: Send + Sync {
    /// Additional fee for acquiring `quantity` at `price`
    async fn fee_for(&self, asset: &Asset, quantity: Decimal, price: Decimal) -> StorageResult<Decimal>;

    /// Current scarcity multiplier, 1.0 when supply is unconstrained
    async fn scarcity_multiplier(&self, asset: &Asset) -> StorageResult<f64>;
}
