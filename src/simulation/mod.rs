// src/simulation/mod.rs
pub mod events;
pub mod pricing;

pub use events::EventModel;
pub use pricing::{
    validate_price, EventContribution, PriceDraws, PricePathGenerator, PriceStep,
};
