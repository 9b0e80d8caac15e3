// src/domain/mod.rs
pub mod behavior;
pub mod errors;
pub mod models;
pub mod orders;
pub mod repository;
pub mod service;

// Re-export common types for convenience
pub use behavior::{AffinityGroup, BehaviorDelta, ConsequenceRecord, TraderBehaviorState};
pub use errors::{
    AppError, AppResult, SimulationError, SimulationResult, StorageError, StorageResult,
    TradingError, TradingResult, ValidationError,
};
pub use models::{
    Asset, AssetId, AssetMetadata, AssetTheme, AssetType, EventCategory, ImpactSign,
    MarketEvent, MarketSnapshot, OhlcBar, Timeframe,
};
pub use orders::{
    Account, Execution, Holding, MarginAccount, Order, OrderRequest, OrderSide, OrderStatus,
    OrderType, Portfolio,
};
