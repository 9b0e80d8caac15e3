// src/trading/modifiers.rs
// Behavior-driven price modifiers, applied in a fixed order

use rand::{Rng, RngCore};

use crate::domain::behavior::{BehaviorDelta, TraderBehaviorState};
use crate::domain::models::{to_f64, Asset, MarketSnapshot};
use crate::domain::orders::{Order, OrderSide, OrderType};

/// Axis magnitude past which an alignment counts.
pub const AXIS_THRESHOLD: f64 = 25.0;

/// Everything a modifier may look at. The trader state is read-only.
pub struct ModifierContext<'a> {
    pub trader: &'a TraderBehaviorState,
    pub order: &'a Order,
    pub asset: &'a Asset,
    pub snapshot: &'a MarketSnapshot,
    /// Candidate execution price before any modifier ran
    pub market_price: f64,
}

impl ModifierContext<'_> {
    pub fn lawful(&self) -> bool {
        self.trader.order_axis > AXIS_THRESHOLD
    }

    pub fn chaotic(&self) -> bool {
        self.trader.order_axis < -AXIS_THRESHOLD
    }

    pub fn benevolent(&self) -> bool {
        self.trader.benevolence_axis > AXIS_THRESHOLD
    }

    pub fn malevolent(&self) -> bool {
        self.trader.benevolence_axis < -AXIS_THRESHOLD
    }

    /// 0.0 bearish to 1.0 bullish, from the asset trend.
    pub fn sentiment(&self) -> f64 {
        ((self.snapshot.trend + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}

/// Move `price` in the trader's favour by `rate` (negative rates move it against them).
pub fn favor(side: OrderSide, price: f64, rate: f64) -> f64 {
    match side {
        OrderSide::Buy => price * (1.0 - rate),
        OrderSide::Sell => price * (1.0 + rate),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierOutcome {
    pub price: f64,
    /// Signed rate, positive favours the trader
    pub rate: f64,
    pub description: String,
    pub delta: BehaviorDelta,
}

/// One named transformer in the chain.
pub trait PriceModifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool;

    /// `None` when the modifier decides not to act after all.
    fn apply(
        &self,
        ctx: &ModifierContext<'_>,
        price: f64,
        rng: &mut dyn RngCore,
    ) -> Option<ModifierOutcome>;
}

/// Lawful traders: pull the price toward the quoted mid.
pub struct Stability {
    pub fraction: f64,
}

impl PriceModifier for Stability {
    fn name(&self) -> &'static str {
        "price_stability"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.lawful()
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        let fair = ctx.snapshot.price();
        let stabilized = price - (price - fair) * self.fraction;
        if (stabilized - price).abs() <= 0.01 {
            return None;
        }
        let rate = match ctx.order.side {
            OrderSide::Buy => (price - stabilized) / price,
            OrderSide::Sell => (stabilized - price) / price,
        };
        Some(ModifierOutcome {
            price: stabilized,
            rate,
            description: format!(
                "Lawful alignment pulls price {:.1}% toward fair value",
                self.fraction * 100.0
            ),
            delta: BehaviorDelta::reputation(2.0),
        })
    }
}

/// Lawful limit orders: better fill quality, recorded only.
pub struct FillQuality {
    pub bonus: f64,
}

impl PriceModifier for FillQuality {
    fn name(&self) -> &'static str {
        "execution_enhancement"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.lawful() && matches!(ctx.order.order_type, OrderType::Limit(_))
    }

    fn apply(&self, _ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        Some(ModifierOutcome {
            price,
            rate: 0.0,
            description: format!(
                "Lawful discipline improves order execution by {:.1}%",
                self.bonus * 100.0
            ),
            delta: BehaviorDelta::reputation(1.0),
        })
    }
}

/// Chaotic traders: random swing of up to +/-5% times the multiplier.
pub struct VolatilityAmplifier {
    pub multiplier: f64,
}

impl PriceModifier for VolatilityAmplifier {
    fn name(&self) -> &'static str {
        "volatility_amplification"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.chaotic()
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        let movement = rng.gen_range(-0.5..=0.5) * 0.1 * self.multiplier;
        let amplified = price * (1.0 + movement);
        let rate = match ctx.order.side {
            OrderSide::Buy => -movement,
            OrderSide::Sell => movement,
        };
        // Big upward swings earn reputation whichever side the trader is on
        let reputation = if movement.abs() > 0.02 {
            if movement > 0.0 {
                3.0
            } else {
                -2.0
            }
        } else {
            0.0
        };
        Some(ModifierOutcome {
            price: amplified,
            rate,
            description: format!("Chaotic forces move the price by {:+.2}%", movement * 100.0),
            delta: BehaviorDelta::reputation(reputation),
        })
    }
}

/// Chaotic traders: occasional opportunity event, recorded only.
pub struct ChaoticOpportunity {
    pub probability: f64,
    pub bonus: f64,
}

impl PriceModifier for ChaoticOpportunity {
    fn name(&self) -> &'static str {
        "chaotic_opportunity"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.chaotic()
    }

    fn apply(&self, _ctx: &ModifierContext<'_>, price: f64, rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        if !rng.gen_bool(self.probability) {
            return None;
        }
        Some(ModifierOutcome {
            price,
            rate: 0.0,
            description: format!(
                "Chaos reveals a hidden trading opportunity (+{:.1}%)",
                self.bonus * 100.0
            ),
            delta: BehaviorDelta::reputation(2.0),
        })
    }
}

/// Benevolent traders: share in positive sentiment.
pub struct CommunitySentiment {
    pub bonus: f64,
    pub threshold: f64,
}

impl PriceModifier for CommunitySentiment {
    fn name(&self) -> &'static str {
        "community_blessing"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.benevolent() && ctx.sentiment() > self.threshold
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        let rate = self.bonus * ctx.sentiment();
        Some(ModifierOutcome {
            price: favor(ctx.order.side, price, rate),
            rate,
            description: format!("Community goodwill improves the trade by {:.1}%", rate * 100.0),
            delta: BehaviorDelta::reputation(2.0),
        })
    }
}

/// Benevolent traders on market orders: cap the adverse move versus the
/// pre-modifier price.
pub struct LossProtection {
    pub max_adverse: f64,
}

impl PriceModifier for LossProtection {
    fn name(&self) -> &'static str {
        "loss_protection"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.benevolent() && ctx.order.order_type.is_market()
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        let reference = ctx.market_price;
        let protected = match ctx.order.side {
            OrderSide::Buy => price.min(reference * (1.0 + self.max_adverse)),
            OrderSide::Sell => price.max(reference * (1.0 - self.max_adverse)),
        };
        if protected == price {
            return None;
        }
        Some(ModifierOutcome {
            price: protected,
            rate: (protected - price).abs() / price,
            description: format!(
                "Protection caps the adverse move at {:.1}%",
                self.max_adverse * 100.0
            ),
            delta: BehaviorDelta::reputation(1.0),
        })
    }
}

/// Malevolent traders: reward trading against the prevailing sentiment.
pub struct Contrarian {
    pub bonus: f64,
    pub trend_band: f64,
}

impl Contrarian {
    fn is_contrarian(&self, ctx: &ModifierContext<'_>) -> bool {
        let trend = ctx.snapshot.trend;
        match ctx.order.side {
            OrderSide::Buy => trend < -self.trend_band,
            OrderSide::Sell => trend > self.trend_band,
        }
    }
}

impl PriceModifier for Contrarian {
    fn name(&self) -> &'static str {
        "contrarian_power"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.malevolent() && self.is_contrarian(ctx)
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        Some(ModifierOutcome {
            price: favor(ctx.order.side, price, self.bonus),
            rate: self.bonus,
            description: format!(
                "Contrarian stance rewarded with a {:.1}% bonus",
                self.bonus * 100.0
            ),
            delta: BehaviorDelta::reputation(-3.0),
        })
    }
}

/// Malevolent traders: large market orders get a dominance bonus.
pub struct Aggressiveness {
    pub bonus: f64,
    pub min_quantity: f64,
}

impl PriceModifier for Aggressiveness {
    fn name(&self) -> &'static str {
        "aggressive_dominance"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.malevolent()
            && matches!(ctx.order.order_type, OrderType::Market)
            && to_f64(ctx.order.quantity) > self.min_quantity
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        Some(ModifierOutcome {
            price: favor(ctx.order.side, price, self.bonus),
            rate: self.bonus,
            description: format!("Aggressive trading yields a {:.1}% bonus", self.bonus * 100.0),
            delta: BehaviorDelta::reputation(-2.0),
        })
    }
}

/// Affinity-group specialization keyed by asset theme.
pub struct Specialization;

impl PriceModifier for Specialization {
    fn name(&self) -> &'static str {
        "house_specialization"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        ctx.trader.affinity_group.is_some()
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        let group = ctx.trader.affinity_group?;
        let theme = ctx.asset.metadata.theme;
        let rate = group.specialization(theme);
        if rate == 0.0 {
            return None;
        }
        Some(ModifierOutcome {
            price: favor(ctx.order.side, price, rate),
            rate,
            description: format!(
                "House {} specialization: {:+.1}% on {:?} assets",
                group.as_str(),
                rate * 100.0,
                theme
            ),
            delta: BehaviorDelta::reputation(if rate > 0.0 { 3.0 } else { 1.0 }),
        })
    }
}

/// Long-run reputation: log-scaled bonus above 100, penalty below -50.
pub struct Reputation {
    pub bonus_floor: f64,
    pub penalty_floor: f64,
    pub max_bonus: f64,
    pub max_penalty: f64,
}

impl Reputation {
    pub fn rate(&self, reputation: f64) -> f64 {
        if reputation > self.bonus_floor {
            (0.02 * (reputation / 10.0).ln()).min(self.max_bonus)
        } else if reputation < self.penalty_floor {
            (-0.02 * (reputation.abs() / 10.0).ln()).max(-self.max_penalty)
        } else {
            0.0
        }
    }
}

impl PriceModifier for Reputation {
    fn name(&self) -> &'static str {
        "karmic_standing"
    }

    fn applies(&self, ctx: &ModifierContext<'_>) -> bool {
        let rep = ctx.trader.reputation;
        rep > self.bonus_floor || rep < self.penalty_floor
    }

    fn apply(&self, ctx: &ModifierContext<'_>, price: f64, _rng: &mut dyn RngCore) -> Option<ModifierOutcome> {
        let rate = self.rate(ctx.trader.reputation);
        if rate == 0.0 {
            return None;
        }
        Some(ModifierOutcome {
            price: favor(ctx.order.side, price, rate),
            rate,
            description: format!(
                "Reputation {:.0} adjusts the trade by {:+.1}%",
                ctx.trader.reputation,
                rate * 100.0
            ),
            delta: BehaviorDelta::default(),
        })
    }
}

/// A modifier that ran, as seen by the audit sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedModifier {
    pub name: &'static str,
    pub description: String,
    pub price_before: f64,
    pub price_after: f64,
    pub rate: f64,
    pub delta: BehaviorDelta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainResult {
    pub price: f64,
    pub applied: Vec<AppliedModifier>,
    pub delta: BehaviorDelta,
}

/// Ordered list of price modifiers.
pub struct ModifierChain {
    modifiers: Vec<Box<dyn PriceModifier>>,
}

impl ModifierChain {
    pub fn new(modifiers: Vec<Box<dyn PriceModifier>>) -> Self {
        Self { modifiers }
    }

    /// The standard chain, alignment checks first and reputation last.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(Stability { fraction: 0.15 }),
            Box::new(FillQuality { bonus: 0.10 }),
            Box::new(VolatilityAmplifier { multiplier: 1.3 }),
            Box::new(ChaoticOpportunity {
                probability: 0.15,
                bonus: 0.15,
            }),
            Box::new(CommunitySentiment {
                bonus: 0.18,
                threshold: 0.5,
            }),
            Box::new(LossProtection { max_adverse: 0.05 }),
            Box::new(Contrarian {
                bonus: 0.20,
                trend_band: 0.2,
            }),
            Box::new(Aggressiveness {
                bonus: 0.16,
                min_quantity: 100.0,
            }),
            Box::new(Specialization),
            Box::new(Reputation {
                bonus_floor: 100.0,
                penalty_floor: -50.0,
                max_bonus: 0.10,
                max_penalty: 0.08,
            }),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modifiers.iter().map(|m| m.name()).collect()
    }

    /// Fold the candidate price through every applicable modifier in order.
    pub fn apply(&self, ctx: &ModifierContext<'_>, rng: &mut dyn RngCore) -> ChainResult {
        let mut result = ChainResult {
            price: ctx.market_price,
            applied: Vec::new(),
            delta: BehaviorDelta::default(),
        };

        for modifier in &self.modifiers {
            if !modifier.applies(ctx) {
                continue;
            }
            let before = result.price;
            let Some(outcome) = modifier.apply(ctx, before, rng) else {
                continue;
            };
            result.price = outcome.price;
            result.delta += outcome.delta;
            result.applied.push(AppliedModifier {
                name: modifier.name(),
                description: outcome.description,
                price_before: before,
                price_after: outcome.price,
                rate: outcome.rate,
                delta: outcome.delta,
            });
        }

        result
    }
}

impl Default for ModifierChain {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::behavior::AffinityGroup;
    use crate::domain::models::{AssetMetadata, AssetTheme, AssetType};
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use uuid::Uuid;

    struct Fixture {
        trader: TraderBehaviorState,
        order: Order,
        asset: Asset,
        snapshot: MarketSnapshot,
    }

    impl Fixture {
        fn new(side: OrderSide, order_type: OrderType, quantity: Decimal) -> Self {
            let asset = Asset::new(
                "HERO",
                "Hero",
                AssetType::Character,
                AssetMetadata {
                    theme: AssetTheme::Character,
                    ..AssetMetadata::default()
                },
            );
            let snapshot = MarketSnapshot {
                asset_id: asset.id,
                current_price: dec!(100.00),
                bid: dec!(99.90),
                ask: dec!(100.10),
                volume_24h: 1000,
                trend: 0.0,
                momentum: 0.0,
                volatility: 0.02,
                day_change: Decimal::ZERO,
                day_change_percent: 0.0,
                supply: 1000,
                price_history: VecDeque::new(),
                last_updated: Utc::now(),
            };
            let account = Uuid::new_v4();
            Self {
                trader: TraderBehaviorState::neutral(account),
                order: Order::new(account, asset.id, side, order_type, quantity),
                asset,
                snapshot,
            }
        }

        fn ctx(&self, market_price: f64) -> ModifierContext<'_> {
            ModifierContext {
                trader: &self.trader,
                order: &self.order,
                asset: &self.asset,
                snapshot: &self.snapshot,
                market_price,
            }
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn neutral_trader_is_untouched() {
        let fx = Fixture::new(OrderSide::Buy, OrderType::Market, dec!(5));
        let mut rng = StdRng::seed_from_u64(1);
        let result = ModifierChain::standard().apply(&fx.ctx(101.0), &mut rng);
        assert_eq!(result.price, 101.0);
        assert!(result.applied.is_empty());
        assert!(result.delta.is_zero());
    }

    #[test]
    fn stability_shrinks_distance_to_fair_price() {
        let mut fx = Fixture::new(OrderSide::Buy, OrderType::Market, dec!(5));
        fx.trader.order_axis = 40.0;
        let mut rng = StdRng::seed_from_u64(1);
        let result = ModifierChain::standard().apply(&fx.ctx(110.0), &mut rng);
        assert!(approx(result.price, 110.0 - 10.0 * 0.15));
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.applied[0].name, "price_stability");
        assert_eq!(result.delta.reputation, 2.0);
    }

    #[test]
    fn lawful_limit_order_records_fill_quality() {
        let mut fx = Fixture::new(OrderSide::Sell, OrderType::Limit(dec!(100)), dec!(5));
        fx.trader.order_axis = 40.0;
        let mut rng = StdRng::seed_from_u64(1);
        let result = ModifierChain::standard().apply(&fx.ctx(100.005), &mut rng);
        // too close to fair value to stabilize, fill quality still recorded
        let names: Vec<_> = result.applied.iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["execution_enhancement"]);
        assert_eq!(result.price, 100.005);
    }

    #[test]
    fn chaotic_swing_is_bounded() {
        let mut fx = Fixture::new(OrderSide::Buy, OrderType::Market, dec!(5));
        fx.trader.order_axis = -80.0;
        let chain = ModifierChain::standard();
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = chain.apply(&fx.ctx(100.0), &mut rng);
            assert!(result.price >= 100.0 * (1.0 - 0.065) - 1e-9);
            assert!(result.price <= 100.0 * (1.0 + 0.065) + 1e-9);
            assert_eq!(result.applied[0].name, "volatility_amplification");
        }
    }

    #[test]
    fn chaotic_reputation_follows_the_price_direction() {
        let amplifier = VolatilityAmplifier { multiplier: 1.3 };
        for side in [OrderSide::Buy, OrderSide::Sell] {
            let mut fx = Fixture::new(side, OrderType::Market, dec!(5));
            fx.trader.order_axis = -80.0;
            let (mut ups, mut downs) = (0, 0);
            for seed in 0..200 {
                let mut rng = StdRng::seed_from_u64(seed);
                let outcome = amplifier.apply(&fx.ctx(100.0), 100.0, &mut rng).unwrap();
                let movement = outcome.price / 100.0 - 1.0;
                let expected = if movement.abs() <= 0.02 + 1e-12 {
                    0.0
                } else if movement > 0.0 {
                    ups += 1;
                    3.0
                } else {
                    downs += 1;
                    -2.0
                };
                assert_eq!(outcome.delta.reputation, expected, "{:?} seed {}", side, seed);
            }
            assert!(ups > 0 && downs > 0);
        }
    }

    #[test]
    fn community_bonus_needs_positive_sentiment() {
        let mut fx = Fixture::new(OrderSide::Buy, OrderType::Limit(dec!(100)), dec!(5));
        fx.trader.benevolence_axis = 50.0;
        let mut rng = StdRng::seed_from_u64(1);
        let flat = ModifierChain::standard().apply(&fx.ctx(100.0), &mut rng);
        assert!(flat.applied.is_empty());

        fx.snapshot.trend = 0.6;
        let result = ModifierChain::standard().apply(&fx.ctx(100.0), &mut rng);
        let rate = 0.18 * 0.8;
        assert!(approx(result.price, 100.0 * (1.0 - rate)));
    }

    #[test]
    fn loss_protection_caps_adverse_chaotic_moves() {
        let mut fx = Fixture::new(OrderSide::Buy, OrderType::Market, dec!(5));
        fx.trader.order_axis = -80.0;
        fx.trader.benevolence_axis = 80.0;
        let chain = ModifierChain::new(vec![
            Box::new(VolatilityAmplifier { multiplier: 2.0 }),
            Box::new(LossProtection { max_adverse: 0.05 }),
        ]);
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = chain.apply(&fx.ctx(100.0), &mut rng);
            assert!(result.price <= 105.0 + 1e-9);
        }
    }

    #[test]
    fn contrarian_and_aggressive_bonuses_stack() {
        let mut fx = Fixture::new(OrderSide::Sell, OrderType::Market, dec!(150));
        fx.trader.benevolence_axis = -60.0;
        fx.snapshot.trend = 0.5;
        let mut rng = StdRng::seed_from_u64(1);
        let result = ModifierChain::standard().apply(&fx.ctx(100.0), &mut rng);
        assert!(approx(result.price, 100.0 * 1.20 * 1.16));
        assert_eq!(result.delta.reputation, -5.0);
    }

    #[test]
    fn specialization_builds_on_adjusted_price() {
        let mut fx = Fixture::new(OrderSide::Buy, OrderType::Market, dec!(5));
        fx.trader.order_axis = 40.0;
        fx.trader.affinity_group = Some(AffinityGroup::Heroes);
        let mut rng = StdRng::seed_from_u64(1);
        let result = ModifierChain::standard().apply(&fx.ctx(110.0), &mut rng);
        let stabilized = 110.0 - 10.0 * 0.15;
        assert!(approx(result.price, stabilized * (1.0 - 0.25)));
        let house = &result.applied[1];
        assert_eq!(house.name, "house_specialization");
        assert!(approx(house.price_before, stabilized));
    }

    #[test]
    fn reputation_rate_is_log_scaled_and_clamped() {
        let rep = Reputation {
            bonus_floor: 100.0,
            penalty_floor: -50.0,
            max_bonus: 0.10,
            max_penalty: 0.08,
        };
        assert_eq!(rep.rate(50.0), 0.0);
        assert!(approx(rep.rate(1000.0), 0.02 * 100.0f64.ln()));
        assert_eq!(rep.rate(1e9), 0.10);
        assert!(approx(rep.rate(-100.0), -0.02 * 10.0f64.ln()));
        assert_eq!(rep.rate(-1e9), -0.08);
    }

    #[test]
    fn deterministic_terms_repeat_across_seeds() {
        let mut fx = Fixture::new(OrderSide::Sell, OrderType::Market, dec!(5));
        fx.trader.order_axis = -60.0;
        fx.trader.reputation = 500.0;
        fx.trader.affinity_group = Some(AffinityGroup::Spirit);
        let chain = ModifierChain::standard();
        let rate_of = |seed: u64, name: &str| {
            let mut rng = StdRng::seed_from_u64(seed);
            chain
                .apply(&fx.ctx(100.0), &mut rng)
                .applied
                .into_iter()
                .find(|a| a.name == name)
                .map(|a| a.rate)
        };
        for name in ["house_specialization", "karmic_standing"] {
            assert_eq!(rate_of(3, name), rate_of(11, name));
            assert!(rate_of(3, name).is_some());
        }

        fx.trader.order_axis = 60.0;
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(11);
        let first = chain.apply(&fx.ctx(104.0), &mut a);
        let second = chain.apply(&fx.ctx(104.0), &mut b);
        assert_eq!(first, second);
    }
}
