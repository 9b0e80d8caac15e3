// src/infrastructure/calendar.rs
use chrono::{DateTime, Timelike, Utc};
use std::sync::Arc;

use crate::config::CalendarConfig;
use crate::domain::service::MarketCalendar;

/// Open between `open_hour` and `close_hour` UTC, every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingHours {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl TradingHours {
    pub fn new(open_hour: u32, close_hour: u32) -> Self {
        Self {
            open_hour,
            close_hour,
        }
    }
}

impl MarketCalendar for TradingHours {
    fn is_open(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour();
        if self.open_hour <= self.close_hour {
            hour >= self.open_hour && hour < self.close_hour
        } else {
            // session wraps past midnight
            hour >= self.open_hour || hour < self.close_hour
        }
    }
}

/// Round-the-clock market, for demos and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl MarketCalendar for AlwaysOpen {
    fn is_open(&self, _now: DateTime<Utc>) -> bool {
        true
    }
}

/// Build the calendar described by the configuration.
pub fn from_config(config: &CalendarConfig) -> Arc<dyn MarketCalendar> {
    if config.always_open {
        Arc::new(AlwaysOpen)
    } else {
        Arc::new(TradingHours::new(config.open_hour, config.close_hour))
    }
}
