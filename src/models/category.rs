//! Spending categories and reward schedules
//!
//! Cards reward spend per merchant category. A schedule without an entry
//! for the transaction's category falls back to its `other` rate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::money::Money;

/// Merchant spending sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendingCategory {
    Grocery,
    Travel,
    Hotel,
    OnlineShopping,
    FuelTransport,
    Dining,
    Entertainment,
    Utilities,
    Rent,
    Other,
}

impl SpendingCategory {
    pub fn all() -> &'static [SpendingCategory] {
        &[
            Self::Grocery,
            Self::Travel,
            Self::Hotel,
            Self::OnlineShopping,
            Self::FuelTransport,
            Self::Dining,
            Self::Entertainment,
            Self::Utilities,
            Self::Rent,
            Self::Other,
        ]
    }

    /// Parse a category from user input, accepting common aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(|c: char| c == '-' || c == ' ', "_").as_str() {
            "grocery" | "groceries" => Some(Self::Grocery),
            "travel" | "flights" => Some(Self::Travel),
            "hotel" | "hotels" => Some(Self::Hotel),
            "online_shopping" | "shopping" => Some(Self::OnlineShopping),
            "fuel_transport" | "fuel" | "transport" => Some(Self::FuelTransport),
            "dining" | "restaurants" | "coffee" => Some(Self::Dining),
            "entertainment" => Some(Self::Entertainment),
            "utilities" | "bills" => Some(Self::Utilities),
            "rent" | "mortgage" => Some(Self::Rent),
            "other" | "general" => Some(Self::Other),
            _ => None,
        }
    }
}

impl Default for SpendingCategory {
    fn default() -> Self {
        Self::Other
    }
}

impl fmt::Display for SpendingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Grocery => "groceries",
            Self::Travel => "travel",
            Self::Hotel => "hotels",
            Self::OnlineShopping => "online shopping",
            Self::FuelTransport => "fuel & transport",
            Self::Dining => "dining",
            Self::Entertainment => "entertainment",
            Self::Utilities => "utilities",
            Self::Rent => "rent",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// How a card expresses its rewards
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardKind {
    /// Rates are cashback fractions (0.01 = 1%)
    Cashback,
    /// Rates are points per unit spent; each point is worth `point_value`
    /// units of the transaction currency
    Points { point_value: f64 },
}

impl Default for RewardKind {
    fn default() -> Self {
        Self::Cashback
    }
}

/// Category-scoped reward rates for a funding source
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RewardSchedule {
    #[serde(default)]
    pub kind: RewardKind,

    #[serde(default)]
    pub rates: BTreeMap<SpendingCategory, f64>,
}

impl RewardSchedule {
    /// Cashback schedule from (category, rate) pairs
    pub fn cashback(rates: impl IntoIterator<Item = (SpendingCategory, f64)>) -> Self {
        Self {
            kind: RewardKind::Cashback,
            rates: rates.into_iter().collect(),
        }
    }

    /// Points schedule from (category, points-per-unit) pairs
    pub fn points(
        point_value: f64,
        rates: impl IntoIterator<Item = (SpendingCategory, f64)>,
    ) -> Self {
        Self {
            kind: RewardKind::Points { point_value },
            rates: rates.into_iter().collect(),
        }
    }

    /// Raw rate for a category, falling back to the `other` rate
    pub fn rate_for(&self, category: SpendingCategory) -> f64 {
        self.rates
            .get(&category)
            .or_else(|| self.rates.get(&SpendingCategory::Other))
            .copied()
            .unwrap_or(0.0)
    }

    /// Reward value per unit spent, as a fraction of the amount
    pub fn effective_rate(&self, category: SpendingCategory) -> f64 {
        match self.kind {
            RewardKind::Cashback => self.rate_for(category),
            RewardKind::Points { point_value } => self.rate_for(category) * point_value,
        }
    }

    /// Whole points earned on an amount (zero for cashback schedules)
    pub fn points_for(&self, category: SpendingCategory, amount: Money) -> u64 {
        match self.kind {
            RewardKind::Cashback => 0,
            RewardKind::Points { .. } => {
                (amount.as_major_f64() * self.rate_for(category)).floor().max(0.0) as u64
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (category, rate) in &self.rates {
            if !rate.is_finite() || *rate < 0.0 {
                return Err(format!("Reward rate for {} must be non-negative", category));
            }
        }
        if let RewardKind::Points { point_value } = self.kind {
            if !point_value.is_finite() || point_value < 0.0 {
                return Err("Point value must be non-negative".into());
            }
        }
        Ok(())
    }
}
