// src/domain/errors.rs
use crate::domain::models::{AssetId, OrderId};
use crate::domain::orders::OrderStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single read or write against the persistence collaborator.
///
/// These are transient from the engine's point of view: the unit of work that
/// hit one is logged and skipped, the surrounding tick or sweep carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// An order that failed admission control. The reason ends up on the
/// cancelled order.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct ValidationError {
    pub reason: String,
}

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingError {
    #[error("Order rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unsupported order type: {0}")]
    UnsupportedOrderType(String),

    #[error("Order {id} is already {status}")]
    OrderFinalized { id: OrderId, status: OrderStatus },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Price {price} for asset {asset_id} exceeds the safe bound")]
    NumericOverflow { asset_id: AssetId, price: f64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type AppResult<T> = Result<T, AppError>;
pub type StorageResult<T> = Result<T, StorageError>;
pub type TradingResult<T> = Result<T, TradingError>;
pub type SimulationResult<T> = Result<T, SimulationError>;
