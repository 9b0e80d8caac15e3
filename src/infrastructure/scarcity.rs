// src/infrastructure/scarcity.rs
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::errors::StorageResult;
use crate::domain::models::Asset;
use crate::domain::service::ScarcityOracle;

/// Oracle for deployments without a vaulting service: no fee, no scarcity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScarcity;

#[async_trait]
impl ScarcityOracle for NoScarcity {
    async fn fee_for(&self, _asset: &Asset, _quantity: Decimal, _price: Decimal) -> StorageResult<Decimal> {
        Ok(Decimal::ZERO)
    }

    async fn scarcity_multiplier(&self, _asset: &Asset) -> StorageResult<f64> {
        Ok(1.0)
    }
}

/// Flat vaulting fee as a fraction of notional, charged on every buy.
#[derive(Debug, Clone, Copy)]
pub struct FlatVaultingFee {
    pub rate: Decimal,
    pub multiplier: f64,
}

#[async_trait]
impl ScarcityOracle for FlatVaultingFee {
    async fn fee_for(&self, _asset: &Asset, quantity: Decimal, price: Decimal) -> StorageResult<Decimal> {
        Ok((quantity * price * self.rate).round_dp(2))
    }

    async fn scarcity_multiplier(&self, _asset: &Asset) -> StorageResult<f64> {
        Ok(self.multiplier)
    }
}
