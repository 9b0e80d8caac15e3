// src/domain/models.rs
use chrono::{DateTime, Duration, DurationRound, Timelike, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use uuid::Uuid;

use crate::domain::behavior::AffinityGroup;

pub type AssetId = Uuid;
pub type AccountId = Uuid;
pub type OrderId = Uuid;
pub type EventId = Uuid;

/// Lowest price an asset can trade at.
pub const MIN_PRICE: f64 = 0.01;
/// Hard ceiling of the persisted price column.
pub const MAX_PRICE: f64 = 99_999_999.99;
/// Ceiling the simulation keeps prices under.
pub const SAFE_MAX_PRICE: f64 = 99_999.99;
/// Largest fractional move allowed in a single tick.
pub const MAX_SINGLE_PRICE_CHANGE: f64 = 0.50;
/// One day of minute samples.
pub const HISTORY_CAPACITY: usize = 1440;

/// Round an f64 amount to cents. Non-finite input maps to zero.
pub fn to_money(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .unwrap_or(Decimal::ZERO)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Character,
    Comic,
    Creator,
    Publisher,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Character => "character",
            AssetType::Comic => "comic",
            AssetType::Creator => "creator",
            AssetType::Publisher => "publisher",
            AssetType::Other => "other",
        }
    }

    /// Reference price before popularity and rarity adjustments.
    pub fn base_price(&self) -> f64 {
        match self {
            AssetType::Character => 25.0,
            AssetType::Comic => 15.0,
            AssetType::Creator => 30.0,
            AssetType::Publisher => 50.0,
            AssetType::Other => 10.0,
        }
    }

    pub fn volatility_factor(&self) -> f64 {
        match self {
            AssetType::Character => 1.2,
            AssetType::Comic => 1.0,
            AssetType::Creator => 0.9,
            AssetType::Publisher => 0.7,
            AssetType::Other => 1.0,
        }
    }

    pub fn estimated_supply(&self) -> u64 {
        match self {
            AssetType::Character => 500_000,
            AssetType::Comic => 750_000,
            AssetType::Creator => 300_000,
            AssetType::Publisher => 2_000_000,
            AssetType::Other => 1_000_000,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thematic category used by affinity-group specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetTheme {
    Character,
    Educational,
    Temporal,
    Power,
    Mystery,
    Elemental,
    Social,
    General,
}

impl Default for AssetTheme {
    fn default() -> Self {
        AssetTheme::General
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// 0.0 to 1.0
    pub popularity: f64,
    /// 0.0 to 1.0
    pub rarity: f64,
    pub total_supply: Option<u64>,
    #[serde(default)]
    pub theme: AssetTheme,
    /// Cohort whose response multiplier scales narrative shocks on this asset
    #[serde(default)]
    pub affinity_group: Option<AffinityGroup>,
}

impl Default for AssetMetadata {
    fn default() -> Self {
        Self {
            popularity: 0.5,
            rarity: 0.5,
            total_supply: None,
            theme: AssetTheme::General,
            affinity_group: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    pub metadata: AssetMetadata,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Create a new asset with a fresh id
    pub fn new(symbol: &str, name: &str, asset_type: AssetType, metadata: AssetMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            asset_type,
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn supply(&self) -> u64 {
        self.metadata
            .total_supply
            .unwrap_or_else(|| self.asset_type.estimated_supply())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub volume: u64,
}

/// Mutable market state of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub asset_id: AssetId,
    pub current_price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume_24h: u64,
    /// -1.0 to 1.0
    pub trend: f64,
    pub momentum: f64,
    /// 0.005 to 0.1
    pub volatility: f64,
    pub day_change: Decimal,
    pub day_change_percent: f64,
    pub supply: u64,
    pub price_history: VecDeque<PricePoint>,
    pub last_updated: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn price(&self) -> f64 {
        to_f64(self.current_price)
    }

    pub fn market_cap(&self) -> Decimal {
        self.current_price * Decimal::from(self.supply)
    }

    /// Append a sample, evicting the oldest one past a day's worth.
    pub fn push_history(&mut self, point: PricePoint) {
        self.price_history.push_back(point);
        while self.price_history.len() > HISTORY_CAPACITY {
            self.price_history.pop_front();
        }
        self.refresh_volume();
    }

    /// Add traded quantity to the rolling volume.
    pub fn record_trade_volume(&mut self, quantity: u64) {
        match self.price_history.back_mut() {
            Some(point) => point.volume = point.volume.saturating_add(quantity),
            None => self.price_history.push_back(PricePoint {
                timestamp: Utc::now(),
                price: self.current_price,
                volume: quantity,
            }),
        }
        self.refresh_volume();
    }

    fn refresh_volume(&mut self) {
        self.volume_24h = self.price_history.iter().map(|p| p.volume).sum();
    }

    /// Most-recent-first closing prices, as the indicator functions expect.
    pub fn recent_prices(&self) -> Vec<f64> {
        self.price_history.iter().rev().map(|p| to_f64(p.price)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub const ROLLUPS: [Timeframe; 5] = [
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::FourHours,
        Timeframe::OneDay,
    ];

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::OneMinute => 1,
            Timeframe::FiveMinutes => 5,
            Timeframe::FifteenMinutes => 15,
            Timeframe::OneHour => 60,
            Timeframe::FourHours => 240,
            Timeframe::OneDay => 1440,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1m" => Some(Timeframe::OneMinute),
            "5m" => Some(Timeframe::FiveMinutes),
            "15m" => Some(Timeframe::FifteenMinutes),
            "1h" => Some(Timeframe::OneHour),
            "4h" => Some(Timeframe::FourHours),
            "1d" => Some(Timeframe::OneDay),
            _ => None,
        }
    }

    /// Start of the period containing `at`.
    pub fn period_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.duration_trunc(Duration::minutes(self.minutes()))
            .unwrap_or(at)
    }

    /// Whether a period of this timeframe closes at the minute `at`.
    pub fn closes_at(&self, at: DateTime<Utc>) -> bool {
        let minute = at.minute();
        let hour = at.hour();
        match self {
            Timeframe::OneMinute => true,
            Timeframe::FiveMinutes => minute % 5 == 0,
            Timeframe::FifteenMinutes => minute % 15 == 0,
            Timeframe::OneHour => minute == 0,
            Timeframe::FourHours => minute == 0 && hour % 4 == 0,
            Timeframe::OneDay => minute == 0 && hour == 0,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Technical indicators attached to every bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    pub sma_20: f64,
    pub ema_12: f64,
    pub ema_26: f64,
    pub rsi_14: f64,
    pub macd: MacdValue,
    pub bollinger: Option<BollingerBands>,
    pub volume_sma: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcBar {
    pub asset_id: AssetId,
    pub timeframe: Timeframe,
    pub period_start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub change: Decimal,
    pub change_percent: f64,
    pub indicators: IndicatorBundle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    IndustryNews,
    ComicConvention,
    CreatorNews,
    PublisherAnnouncement,
    MovieRelease,
    TvSeries,
    AwardCeremony,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::IndustryNews,
        EventCategory::ComicConvention,
        EventCategory::CreatorNews,
        EventCategory::PublisherAnnouncement,
        EventCategory::MovieRelease,
        EventCategory::TvSeries,
        EventCategory::AwardCeremony,
    ];

    /// Relative likelihood in the random draw.
    pub fn weight(&self) -> u32 {
        match self {
            EventCategory::IndustryNews => 3,
            EventCategory::ComicConvention
            | EventCategory::CreatorNews
            | EventCategory::PublisherAnnouncement => 2,
            EventCategory::MovieRelease
            | EventCategory::TvSeries
            | EventCategory::AwardCeremony => 1,
        }
    }

    pub fn half_life_days(&self) -> f64 {
        match self {
            EventCategory::MovieRelease => 30.0,
            EventCategory::TvSeries => 60.0,
            EventCategory::ComicConvention => 7.0,
            EventCategory::CreatorNews => 14.0,
            EventCategory::PublisherAnnouncement => 21.0,
            EventCategory::IndustryNews => 10.0,
            EventCategory::AwardCeremony => 14.0,
        }
    }

    pub fn multiplier(&self, asset_type: AssetType) -> f64 {
        match (self, asset_type) {
            (EventCategory::MovieRelease, AssetType::Character) => 2.5,
            (EventCategory::MovieRelease, _) => 1.2,
            (EventCategory::ComicConvention, _) => 1.8,
            (EventCategory::CreatorNews, AssetType::Creator) => 3.0,
            (EventCategory::CreatorNews, _) => 1.5,
            (EventCategory::PublisherAnnouncement, AssetType::Publisher) => 2.2,
            (EventCategory::PublisherAnnouncement, _) => 1.0,
            (EventCategory::IndustryNews, _) => 1.3,
            (EventCategory::AwardCeremony, _) => 2.0,
            (EventCategory::TvSeries, AssetType::Character) => 2.0,
            (EventCategory::TvSeries, _) => 1.1,
        }
    }

    /// Whether rarer assets are dampened for this category.
    pub fn dampens_rarity(&self) -> bool {
        !matches!(
            self,
            EventCategory::CreatorNews | EventCategory::AwardCeremony
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::IndustryNews => "industry_news",
            EventCategory::ComicConvention => "comic_convention",
            EventCategory::CreatorNews => "creator_news",
            EventCategory::PublisherAnnouncement => "publisher_announcement",
            EventCategory::MovieRelease => "movie_release",
            EventCategory::TvSeries => "tv_series",
            EventCategory::AwardCeremony => "award_ceremony",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactSign {
    Positive,
    Negative,
    Neutral,
}

impl ImpactSign {
    pub fn base_impact(&self) -> f64 {
        match self {
            ImpactSign::Positive => 0.05,
            ImpactSign::Negative => -0.05,
            ImpactSign::Neutral => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NarrativeImpact {
    pub price_impact: f64,
    pub volatility_impact: f64,
}

/// Time box and per-asset impacts of a story-driven event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSchedule {
    pub start: DateTime<Utc>,
    pub peak: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub impacts: BTreeMap<AssetId, NarrativeImpact>,
}

impl NarrativeSchedule {
    /// Peak sits 30% into the window.
    pub fn new(
        start: DateTime<Utc>,
        duration: Duration,
        impacts: BTreeMap<AssetId, NarrativeImpact>,
    ) -> Self {
        let peak_offset = Duration::milliseconds((duration.num_milliseconds() as f64 * 0.3) as i64);
        Self {
            start,
            peak: start + peak_offset,
            end: start + duration,
            impacts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: EventId,
    pub category: EventCategory,
    pub impact: ImpactSign,
    /// 1 to 10
    pub significance: u8,
    pub affected_assets: Vec<AssetId>,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub narrative: Option<NarrativeSchedule>,
}

impl MarketEvent {
    pub fn affects(&self, asset_id: &AssetId) -> bool {
        match &self.narrative {
            Some(schedule) => schedule.impacts.contains_key(asset_id),
            None => self.affected_assets.contains(asset_id),
        }
    }

    pub fn is_narrative(&self) -> bool {
        self.narrative.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            asset_id: Uuid::new_v4(),
            current_price: Decimal::new(10000, 2),
            bid: Decimal::new(9990, 2),
            ask: Decimal::new(10010, 2),
            volume_24h: 0,
            trend: 0.0,
            momentum: 0.0,
            volatility: 0.02,
            day_change: Decimal::ZERO,
            day_change_percent: 0.0,
            supply: 1_000,
            price_history: VecDeque::new(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let mut snap = snapshot();
        for i in 0..(HISTORY_CAPACITY + 25) {
            snap.push_history(PricePoint {
                timestamp: Utc::now(),
                price: Decimal::from(i as u64 + 1),
                volume: 1,
            });
        }
        assert_eq!(snap.price_history.len(), HISTORY_CAPACITY);
        assert_eq!(snap.volume_24h, HISTORY_CAPACITY as u64);
        // oldest 25 evicted
        assert_eq!(snap.price_history.front().map(|p| p.price), Some(Decimal::from(26)));
    }

    #[test]
    fn trade_volume_joins_rolling_volume() {
        let mut snap = snapshot();
        snap.push_history(PricePoint {
            timestamp: Utc::now(),
            price: snap.current_price,
            volume: 10,
        });
        snap.record_trade_volume(5);
        assert_eq!(snap.volume_24h, 15);
    }

    #[test]
    fn rollups_close_on_boundaries() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap();
        assert!(Timeframe::ROLLUPS.iter().filter(|t| t.closes_at(at)).count() == 4);
        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(Timeframe::OneDay.closes_at(midnight));
        let odd = Utc.with_ymd_and_hms(2024, 3, 1, 4, 7, 0).unwrap();
        assert!(!Timeframe::FiveMinutes.closes_at(odd));
    }

    #[test]
    fn period_start_truncates() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 5, 37, 42).unwrap();
        assert_eq!(
            Timeframe::FifteenMinutes.period_start(at),
            Utc.with_ymd_and_hms(2024, 3, 1, 5, 30, 0).unwrap()
        );
        assert_eq!(
            Timeframe::FourHours.period_start(at),
            Utc.with_ymd_and_hms(2024, 3, 1, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn category_table_lookups() {
        assert_eq!(EventCategory::MovieRelease.multiplier(AssetType::Character), 2.5);
        assert_eq!(EventCategory::MovieRelease.multiplier(AssetType::Comic), 1.2);
        assert_eq!(EventCategory::TvSeries.half_life_days(), 60.0);
        let total: u32 = EventCategory::ALL.iter().map(|c| c.weight()).sum();
        assert_eq!(total, 12);
    }
}
