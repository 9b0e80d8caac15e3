// src/domain/behavior.rs
// Trader behavioral state and the audit records produced by price modifiers

use crate::domain::models::{AccountId, AssetId, AssetTheme, OrderId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use uuid::Uuid;

/// Cohort a trader may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffinityGroup {
    Heroes,
    Wisdom,
    Power,
    Mystery,
    Elements,
    Time,
    Spirit,
}

impl AffinityGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffinityGroup::Heroes => "heroes",
            AffinityGroup::Wisdom => "wisdom",
            AffinityGroup::Power => "power",
            AffinityGroup::Mystery => "mystery",
            AffinityGroup::Elements => "elements",
            AffinityGroup::Time => "time",
            AffinityGroup::Spirit => "spirit",
        }
    }

    /// How strongly a narrative event aimed at this group moves prices.
    pub fn response_multiplier(&self) -> f64 {
        match self {
            AffinityGroup::Heroes => 1.2,
            AffinityGroup::Wisdom => 0.8,
            AffinityGroup::Power => 2.2,
            AffinityGroup::Mystery => 1.8,
            AffinityGroup::Elements => 1.1,
            AffinityGroup::Time => 1.6,
            AffinityGroup::Spirit => 1.4,
        }
    }

    /// Signed specialization rate for trading an asset of `theme`.
    pub fn specialization(&self, theme: AssetTheme) -> f64 {
        use AffinityGroup as G;
        use AssetTheme as T;
        match (self, theme) {
            (G::Heroes, T::Character) => 0.25,
            (G::Heroes, T::Power) => -0.05,
            (G::Heroes, _) => 0.05,
            (G::Wisdom, T::Educational) => 0.20,
            (G::Wisdom, T::Temporal) => 0.15,
            (G::Wisdom, T::Power) => -0.03,
            (G::Wisdom, _) => 0.03,
            (G::Power, T::Power) => 0.16,
            (G::Power, T::Educational) => -0.04,
            (G::Power, _) => 0.04,
            (G::Mystery, T::Mystery) => 0.22,
            (G::Mystery, _) => 0.05,
            (G::Elements, T::Elemental) => 0.20,
            (G::Elements, _) => 0.08,
            (G::Time, T::Temporal) => 0.28,
            (G::Time, T::Educational) => 0.12,
            (G::Time, _) => 0.06,
            (G::Spirit, T::Social) => 0.24,
            (G::Spirit, T::Character) => 0.10,
            (G::Spirit, _) => 0.07,
        }
    }
}

/// Behavioral state of one trader. Owned by the behavior tracker; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderBehaviorState {
    pub account_id: AccountId,
    /// Lawful (+) to chaotic (-), -100 to 100.
    pub order_axis: f64,
    /// Benevolent (+) to malevolent (-), -100 to 100.
    pub benevolence_axis: f64,
    pub reputation: f64,
    pub affinity_group: Option<AffinityGroup>,
}

impl TraderBehaviorState {
    pub fn neutral(account_id: AccountId) -> Self {
        Self {
            account_id,
            order_axis: 0.0,
            benevolence_axis: 0.0,
            reputation: 0.0,
            affinity_group: None,
        }
    }

    pub fn clamped(mut self) -> Self {
        self.order_axis = self.order_axis.clamp(-100.0, 100.0);
        self.benevolence_axis = self.benevolence_axis.clamp(-100.0, 100.0);
        self
    }
}

/// Suggested change to a trader's behavioral state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorDelta {
    pub order_axis: f64,
    pub benevolence_axis: f64,
    pub reputation: f64,
}

impl BehaviorDelta {
    pub fn reputation(amount: f64) -> Self {
        Self {
            reputation: amount,
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.order_axis == 0.0 && self.benevolence_axis == 0.0 && self.reputation == 0.0
    }
}

impl Add for BehaviorDelta {
    type Output = BehaviorDelta;

    fn add(self, rhs: BehaviorDelta) -> BehaviorDelta {
        BehaviorDelta {
            order_axis: self.order_axis + rhs.order_axis,
            benevolence_axis: self.benevolence_axis + rhs.benevolence_axis,
            reputation: self.reputation + rhs.reputation,
        }
    }
}

impl AddAssign for BehaviorDelta {
    fn add_assign(&mut self, rhs: BehaviorDelta) {
        *self = *self + rhs;
    }
}

/// Immutable audit entry emitted by one applied price modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsequenceRecord {
    pub id: Uuid,
    pub account_id: AccountId,
    pub order_id: OrderId,
    pub asset_id: AssetId,
    pub modifier: String,
    pub description: String,
    pub price_before: Decimal,
    pub price_after: Decimal,
    /// Signed rate relative to the input price, positive favours the trader.
    pub rate: f64,
    pub delta: BehaviorDelta,
    pub created_at: DateTime<Utc>,
}
