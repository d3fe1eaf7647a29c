//! Engine settings for OptiVault
//!
//! Static rate tables, the interest day-count policy, freshness and retry
//! bounds, and the user's routing preferences.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::paths::VaultPaths;
use super::preferences::Preferences;
use crate::error::VaultError;
use crate::models::{Currency, FxTable, SpendingCategory};

/// Day-count convention used to pro-rate annual rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePolicy {
    /// Days per year the annual rate is spread over
    #[serde(default = "default_day_count_basis")]
    pub day_count_basis: u32,

    /// Days the spent funds would otherwise have stayed put
    #[serde(default = "default_holding_period_days")]
    pub holding_period_days: u32,
}

fn default_day_count_basis() -> u32 {
    365
}

fn default_holding_period_days() -> u32 {
    30
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            day_count_basis: default_day_count_basis(),
            holding_period_days: default_holding_period_days(),
        }
    }
}

impl RatePolicy {
    /// Fraction of an annual rate charged for one holding period
    pub fn pro_rate(&self, annual_rate: f64) -> f64 {
        annual_rate / f64::from(self.day_count_basis) * f64::from(self.holding_period_days)
    }
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Currency the FX table is quoted against
    #[serde(default)]
    pub home_currency: Currency,

    #[serde(default)]
    pub fx_rates: FxTable,

    #[serde(default)]
    pub rate_policy: RatePolicy,

    /// Snapshots older than this force manual confirmation
    #[serde(default = "default_freshness_minutes")]
    pub freshness_minutes: i64,

    /// Recompute attempts after a commit conflict
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,

    /// Costs closer than this are considered equal
    #[serde(default = "default_cost_epsilon")]
    pub cost_epsilon: f64,

    /// Purchases per year by category, for annual projections
    #[serde(default = "default_annual_frequency")]
    pub annual_frequency: BTreeMap<SpendingCategory, u32>,

    #[serde(default)]
    pub preferences: Preferences,

    /// Whether `init` has been run
    #[serde(default)]
    pub setup_completed: bool,
}

fn default_schema_version() -> u32 {
    1
}

fn default_freshness_minutes() -> i64 {
    60
}

fn default_max_commit_retries() -> u32 {
    3
}

fn default_cost_epsilon() -> f64 {
    1e-6
}

fn default_annual_frequency() -> BTreeMap<SpendingCategory, u32> {
    use SpendingCategory::*;
    [
        (Grocery, 52),
        (Dining, 104),
        (FuelTransport, 52),
        (OnlineShopping, 24),
        (Entertainment, 24),
        (Utilities, 12),
        (Rent, 12),
        (Travel, 4),
        (Hotel, 4),
        (Other, 12),
    ]
    .into_iter()
    .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            home_currency: Currency::default(),
            fx_rates: FxTable::default(),
            rate_policy: RatePolicy::default(),
            freshness_minutes: default_freshness_minutes(),
            max_commit_retries: default_max_commit_retries(),
            cost_epsilon: default_cost_epsilon(),
            annual_frequency: default_annual_frequency(),
            preferences: Preferences::default(),
            setup_completed: false,
        }
    }
}

impl Settings {
    /// Purchases per year for a category, falling back to `other`
    pub fn frequency_for(&self, category: SpendingCategory) -> u32 {
        self.annual_frequency
            .get(&category)
            .or_else(|| self.annual_frequency.get(&SpendingCategory::Other))
            .copied()
            .unwrap_or(1)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.rate_policy.day_count_basis == 0 {
            return Err(VaultError::Config("day_count_basis must be positive".into()));
        }
        if self.freshness_minutes <= 0 {
            return Err(VaultError::Config("freshness_minutes must be positive".into()));
        }
        if !self.cost_epsilon.is_finite() || self.cost_epsilon < 0.0 {
            return Err(VaultError::Config("cost_epsilon must be non-negative".into()));
        }
        if self.preferences.safety_buffer.is_negative() {
            return Err(VaultError::Config("safety_buffer cannot be negative".into()));
        }
        self.fx_rates.validate().map_err(VaultError::Config)?;
        self.fx_rates.rate(self.home_currency)?;
        Ok(())
    }

    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &VaultPaths) -> Result<Self, VaultError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path)
                .map_err(|e| VaultError::Io(format!("Failed to read settings file: {}", e)))?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                VaultError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            settings.validate()?;
            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &VaultPaths) -> Result<(), VaultError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| VaultError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| VaultError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
