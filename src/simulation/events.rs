// src/simulation/events.rs
// Exogenous shocks: random market events and time-boxed narrative events

use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::models::{
    Asset, AssetId, EventCategory, EventId, ImpactSign, MarketEvent, NarrativeImpact,
    NarrativeSchedule,
};
use crate::simulation::pricing::EventContribution;

/// Random events whose remaining weight drops below this are retired.
pub const EXPIRY_THRESHOLD: f64 = 1e-3;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn decay_factor(category: EventCategory, age_days: f64) -> f64 {
    (-age_days.max(0.0) / category.half_life_days()).exp()
}

pub fn significance_multiplier(significance: u8) -> f64 {
    0.5 + (significance as f64 / 10.0) * 2.5
}

/// Sensitivity of an asset to an event of `category`.
pub fn asset_multiplier(asset: &Asset, category: EventCategory, market_cap: f64) -> f64 {
    let popularity = asset.metadata.popularity.clamp(0.0, 1.0);
    let rarity = asset.metadata.rarity.clamp(0.0, 1.0);

    let mut multiplier = 0.8 + popularity * 0.4;
    if category.dampens_rarity() {
        multiplier *= 1.2 - rarity * 0.4;
    }

    let cap_factor = if market_cap > 0.0 {
        (1e8 / market_cap).clamp(0.5, 1.5)
    } else {
        1.5
    };
    multiplier * cap_factor
}

/// Undecayed impact of a random event on one asset.
pub fn event_impact(event: &MarketEvent, asset: &Asset, market_cap: f64) -> f64 {
    event.impact.base_impact()
        * event.category.multiplier(asset.asset_type)
        * significance_multiplier(event.significance)
        * asset_multiplier(asset, event.category, market_cap)
}

/// Triangular curve: 0 to 1 over the first 30%, then down to 0.3.
pub fn narrative_curve(progress: f64) -> f64 {
    let progress = progress.clamp(0.0, 1.0);
    if progress < 0.3 {
        progress / 0.3
    } else {
        1.0 - ((progress - 0.3) / 0.7) * 0.7
    }
}

fn narrative_progress(schedule: &NarrativeSchedule, now: DateTime<Utc>) -> Option<f64> {
    if now < schedule.start || now > schedule.end {
        return None;
    }
    let total = (schedule.end - schedule.start).num_milliseconds() as f64;
    if total <= 0.0 {
        return Some(1.0);
    }
    Some((now - schedule.start).num_milliseconds() as f64 / total)
}

/// Owns the collection of active events.
#[derive(Debug, Default)]
pub struct EventModel {
    events: Vec<MarketEvent>,
}

impl EventModel {
    /// Create a new model from previously persisted events
    pub fn new(events: Vec<MarketEvent>) -> Self {
        Self {
            events: events.into_iter().filter(|e| e.active).collect(),
        }
    }

    pub fn active(&self) -> &[MarketEvent] {
        &self.events
    }

    pub fn register(&mut self, event: MarketEvent) {
        log::info!(
            "{} event {} registered: {} {:?} significance {} affecting {} assets",
            if event.is_narrative() { "Narrative" } else { "Market" },
            event.id,
            event.category.as_str(),
            event.impact,
            event.significance,
            event.affected_assets.len()
        );
        self.events.push(event);
    }

    /// Draw a random event with the given probability.
    pub fn maybe_generate<R: Rng + ?Sized>(
        rng: &mut R,
        assets: &[Asset],
        probability: f64,
        now: DateTime<Utc>,
    ) -> Option<MarketEvent> {
        if assets.is_empty() || !rng.gen_bool(probability.clamp(0.0, 1.0)) {
            return None;
        }
        Self::generate(rng, assets, now)
    }

    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        assets: &[Asset],
        now: DateTime<Utc>,
    ) -> Option<MarketEvent> {
        if assets.is_empty() {
            return None;
        }

        let weights = EventCategory::ALL.iter().map(|c| c.weight());
        let index = WeightedIndex::new(weights).ok()?;
        let category = EventCategory::ALL[index.sample(rng)];

        let impact = match rng.gen_range(0..3) {
            0 => ImpactSign::Positive,
            1 => ImpactSign::Negative,
            _ => ImpactSign::Neutral,
        };
        let significance = rng.gen_range(1..=10u8);

        let count = rng.gen_range(1..=3usize).min(assets.len());
        let affected_assets = assets
            .choose_multiple(rng, count)
            .map(|a| a.id)
            .collect();

        Some(MarketEvent {
            id: Uuid::new_v4(),
            category,
            impact,
            significance,
            affected_assets,
            created_at: now,
            active: true,
            narrative: None,
        })
    }

    /// Build a story-driven event for the narrative collaborator.
    pub fn narrative_event(
        category: EventCategory,
        significance: u8,
        start: DateTime<Utc>,
        duration: Duration,
        impacts: BTreeMap<AssetId, NarrativeImpact>,
    ) -> MarketEvent {
        let net: f64 = impacts.values().map(|i| i.price_impact).sum();
        let impact = if net > 0.0 {
            ImpactSign::Positive
        } else if net < 0.0 {
            ImpactSign::Negative
        } else {
            ImpactSign::Neutral
        };

        MarketEvent {
            id: Uuid::new_v4(),
            category,
            impact,
            significance: significance.clamp(1, 10),
            affected_assets: impacts.keys().copied().collect(),
            created_at: start,
            active: true,
            narrative: Some(NarrativeSchedule::new(start, duration, impacts)),
        }
    }

    /// Summed contribution of all active events to one asset.
    pub fn contribution(&self, asset: &Asset, market_cap: f64, now: DateTime<Utc>) -> EventContribution {
        let mut total = EventContribution::default();

        for event in self.events.iter().filter(|e| e.active && e.affects(&asset.id)) {
            match &event.narrative {
                Some(schedule) => {
                    let Some(progress) = narrative_progress(schedule, now) else {
                        continue;
                    };
                    let Some(impact) = schedule.impacts.get(&asset.id) else {
                        continue;
                    };
                    let response = asset
                        .metadata
                        .affinity_group
                        .map(|g| g.response_multiplier())
                        .unwrap_or(1.0);
                    let curve = narrative_curve(progress) * response;
                    total.price_impact += impact.price_impact * curve;
                    total.volatility_adjustment += impact.volatility_impact * curve;
                }
                None => {
                    let age_days =
                        (now - event.created_at).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
                    total.price_impact += event_impact(event, asset, market_cap)
                        * decay_factor(event.category, age_days);
                }
            }
        }

        total
    }

    /// Drop finished events and return their ids for deactivation in storage.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<EventId> {
        let mut expired = Vec::new();
        self.events.retain(|event| {
            let finished = match &event.narrative {
                Some(schedule) => now > schedule.end,
                None => {
                    let age_days =
                        (now - event.created_at).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
                    decay_factor(event.category, age_days) < EXPIRY_THRESHOLD
                }
            };
            if finished {
                log::info!("Market event {} ({}) expired", event.id, event.category.as_str());
                expired.push(event.id);
            }
            !finished
        });
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::behavior::AffinityGroup;
    use crate::domain::models::{AssetMetadata, AssetType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn asset(asset_type: AssetType) -> Asset {
        Asset::new(
            "TEST",
            "Test Asset",
            asset_type,
            AssetMetadata {
                popularity: 0.5,
                rarity: 0.5,
                ..AssetMetadata::default()
            },
        )
    }

    fn random_event(asset: &Asset, category: EventCategory, created_at: DateTime<Utc>) -> MarketEvent {
        MarketEvent {
            id: Uuid::new_v4(),
            category,
            impact: ImpactSign::Positive,
            significance: 10,
            affected_assets: vec![asset.id],
            created_at,
            active: true,
            narrative: None,
        }
    }

    #[test]
    fn fresh_significant_event_impact() {
        let character = asset(AssetType::Character);
        let now = Utc::now();
        let event = random_event(&character, EventCategory::MovieRelease, now);
        let cap = 1e8;
        let model = EventModel::new(vec![event]);
        let expected = 0.05 * 2.5 * (0.5 + 1.0 * 2.5) * asset_multiplier(&character, EventCategory::MovieRelease, cap);
        let got = model.contribution(&character, cap, now).price_impact;
        assert!((got - expected).abs() < 1e-12);
        // 0.8 + 0.2, 1.2 - 0.2, cap factor 1.0
        assert!((asset_multiplier(&character, EventCategory::MovieRelease, cap) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn impact_decays_with_half_life() {
        let character = asset(AssetType::Character);
        let now = Utc::now();
        let event = random_event(&character, EventCategory::MovieRelease, now - Duration::days(30));
        let model = EventModel::new(vec![event.clone()]);
        let fresh = event_impact(&event, &character, 1e8);
        let got = model.contribution(&character, 1e8, now).price_impact;
        assert!((got - fresh * (-1.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn unaffected_assets_get_nothing() {
        let character = asset(AssetType::Character);
        let other = asset(AssetType::Comic);
        let now = Utc::now();
        let model = EventModel::new(vec![random_event(&character, EventCategory::IndustryNews, now)]);
        assert_eq!(model.contribution(&other, 1e8, now), EventContribution::default());
    }

    #[test]
    fn creator_news_ignores_rarity() {
        let mut rare = asset(AssetType::Creator);
        rare.metadata.rarity = 1.0;
        let with = asset_multiplier(&rare, EventCategory::IndustryNews, 1e8);
        let without = asset_multiplier(&rare, EventCategory::CreatorNews, 1e8);
        assert!((with - 1.0 * 0.8).abs() < 1e-12);
        assert!((without - 1.0).abs() < 1e-12);
        // small caps are amplified, large caps dampened
        assert_eq!(asset_multiplier(&rare, EventCategory::CreatorNews, 1e6), 1.5);
        assert_eq!(asset_multiplier(&rare, EventCategory::CreatorNews, 1e10), 0.5);
    }

    #[test]
    fn narrative_curve_is_triangular() {
        assert_eq!(narrative_curve(0.0), 0.0);
        assert!((narrative_curve(0.15) - 0.5).abs() < 1e-12);
        assert!((narrative_curve(0.3) - 1.0).abs() < 1e-12);
        assert!((narrative_curve(0.65) - 0.65).abs() < 1e-12);
        assert!((narrative_curve(1.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn narrative_event_scales_by_curve_and_asset_group() {
        let mut power = asset(AssetType::Character);
        power.metadata.affinity_group = Some(AffinityGroup::Power);
        let mut wisdom = asset(AssetType::Character);
        wisdom.metadata.affinity_group = Some(AffinityGroup::Wisdom);
        let unaligned = asset(AssetType::Character);

        let start = Utc::now() - Duration::hours(3);
        let impact = NarrativeImpact {
            price_impact: 0.1,
            volatility_impact: 0.5,
        };
        let impacts: BTreeMap<_, _> = [power.id, wisdom.id, unaligned.id]
            .into_iter()
            .map(|id| (id, impact))
            .collect();
        let event = EventModel::narrative_event(
            EventCategory::ComicConvention,
            7,
            start,
            Duration::hours(10),
            impacts,
        );
        assert!(event.is_narrative());
        assert_eq!(event.impact, ImpactSign::Positive);
        let schedule = event.narrative.clone().unwrap();
        assert_eq!(schedule.peak, start + Duration::hours(3));

        let model = EventModel::new(vec![event]);
        let peak = start + Duration::hours(3);
        let boosted = model.contribution(&power, 1e8, peak);
        assert!((boosted.price_impact - 0.1 * 2.2).abs() < 1e-9);
        assert!((boosted.volatility_adjustment - 0.5 * 2.2).abs() < 1e-9);
        let muted = model.contribution(&wisdom, 1e8, peak);
        assert!((muted.price_impact - 0.1 * 0.8).abs() < 1e-9);
        let plain = model.contribution(&unaligned, 1e8, peak);
        assert!((plain.price_impact - 0.1).abs() < 1e-9);

        let before = model.contribution(&power, 1e8, start - Duration::minutes(1));
        assert_eq!(before, EventContribution::default());
    }

    #[test]
    fn expire_retires_finished_events() {
        let character = asset(AssetType::Character);
        let now = Utc::now();
        let stale = random_event(&character, EventCategory::ComicConvention, now - Duration::days(60));
        let fresh = random_event(&character, EventCategory::ComicConvention, now);
        let mut impacts = BTreeMap::new();
        impacts.insert(
            character.id,
            NarrativeImpact {
                price_impact: 0.1,
                volatility_impact: 0.0,
            },
        );
        let story = EventModel::narrative_event(
            EventCategory::TvSeries,
            5,
            now - Duration::days(2),
            Duration::days(1),
            impacts,
        );
        let stale_id = stale.id;
        let story_id = story.id;
        let mut model = EventModel::new(vec![stale, fresh, story]);
        let mut expired = model.expire(now);
        expired.sort();
        let mut want = vec![stale_id, story_id];
        want.sort();
        assert_eq!(expired, want);
        assert_eq!(model.active().len(), 1);
    }

    #[test]
    fn generated_events_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(99);
        let assets: Vec<Asset> = (0..5).map(|_| asset(AssetType::Comic)).collect();
        for _ in 0..200 {
            let event = EventModel::generate(&mut rng, &assets, Utc::now()).unwrap();
            assert!((1..=10).contains(&event.significance));
            assert!((1..=3).contains(&event.affected_assets.len()));
            let mut ids = event.affected_assets.clone();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), event.affected_assets.len());
        }
        assert!(EventModel::generate(&mut rng, &[], Utc::now()).is_none());
        assert!(EventModel::maybe_generate(&mut rng, &assets, 0.0, Utc::now()).is_none());
    }
}
