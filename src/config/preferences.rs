//! User preference set consumed by the optimizer

use serde::{Deserialize, Serialize};

use crate::models::{Money, SourceId};

fn default_true() -> bool {
    true
}

fn default_look_ahead_hours() -> u32 {
    28
}

/// Routing preferences supplied by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Designated default source (usually the primary current account)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source_id: Option<SourceId>,

    /// Opt-in to routing spend onto reward-bearing cards
    #[serde(default = "default_true")]
    pub reward_routing: bool,

    /// User confirmed they clear card balances in full each month
    #[serde(default = "default_true")]
    pub pay_in_full_confirmed: bool,

    /// Guard the default source against scheduled debits
    #[serde(default = "default_true")]
    pub overdraft_protection: bool,

    /// Minimum projected balance to keep on the default source
    #[serde(default)]
    pub safety_buffer: Money,

    /// Horizon for scheduled obligations
    #[serde(default = "default_look_ahead_hours")]
    pub look_ahead_hours: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_source_id: None,
            reward_routing: true,
            pay_in_full_confirmed: true,
            overdraft_protection: true,
            safety_buffer: Money::zero(),
            look_ahead_hours: default_look_ahead_hours(),
        }
    }
}

impl Preferences {
    pub fn with_default_source(mut self, source_id: impl Into<SourceId>) -> Self {
        self.default_source_id = Some(source_id.into());
        self
    }

    /// Whether reward arbitrage may be attempted at all
    pub fn allows_reward_routing(&self) -> bool {
        self.reward_routing && self.pay_in_full_confirmed
    }

    pub fn is_default(&self, source_id: &SourceId) -> bool {
        self.default_source_id.as_ref() == Some(source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs: Preferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.look_ahead_hours, 28);
        assert!(prefs.allows_reward_routing());
    }

    #[test]
    fn test_reward_routing_needs_pay_in_full() {
        let prefs = Preferences {
            pay_in_full_confirmed: false,
            ..Preferences::default()
        };
        assert!(!prefs.allows_reward_routing());
    }

    #[test]
    fn test_is_default() {
        let prefs = Preferences::default().with_default_source("santander");
        assert!(prefs.is_default(&SourceId::new("santander")));
        assert!(!prefs.is_default(&SourceId::new("monzo")));
    }
}
