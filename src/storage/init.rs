//! Storage initialization
//!
//! Handles first-run setup: default settings and a demo snapshot so the
//! CLI has funding sources to work with straight away.

use chrono::{DateTime, Duration, Utc};

use crate::config::paths::VaultPaths;
use crate::config::{Preferences, Settings};
use crate::error::VaultResult;
use crate::models::{
    Constraint, CreditCap, Currency, FundingSource, Money, RewardSchedule, ScheduledObligation,
    SourceKind, SpendingCategory, VrpCap,
};

use super::snapshot::Snapshot;

/// Source the demo settings route pass-through spend to
pub const DEMO_DEFAULT_SOURCE: &str = "santander";

/// Initialize storage for a fresh installation
///
/// Writes default settings and a demo snapshot unless they already exist.
/// Returns true if anything was created.
pub fn initialize_storage(paths: &VaultPaths, now: DateTime<Utc>) -> VaultResult<bool> {
    paths.ensure_directories()?;
    let mut created = false;

    if !paths.settings_file().exists() {
        let settings = Settings {
            preferences: Preferences::default().with_default_source(DEMO_DEFAULT_SOURCE),
            setup_completed: true,
            ..Settings::default()
        };
        settings.save(paths)?;
        created = true;
    }

    if !paths.snapshot_file().exists() {
        demo_snapshot(now).save(&paths.snapshot_file())?;
        created = true;
    }

    Ok(created)
}

/// Check if storage needs initialization
pub fn needs_initialization(paths: &VaultPaths) -> bool {
    !paths.settings_file().exists() || !paths.snapshot_file().exists()
}

fn gbp(major: i64, minor: i64) -> Money {
    Money::from_major_minor(major, minor)
}

/// A household with current accounts, savers, reward cards and an
/// overseas account
pub fn demo_snapshot(taken_at: DateTime<Utc>) -> Snapshot {
    use SpendingCategory::*;

    let sources = vec![
        FundingSource::current_account(DEMO_DEFAULT_SOURCE, "Santander", gbp(3820, 15))
            .with_fx_markup(0.0299),
        FundingSource::current_account("monzo", "Monzo", gbp(1240, 50))
            .with_constraint(Constraint::default().with_floor(gbp(200, 0))),
        FundingSource::savings_account(
            "marcus-saver",
            "Marcus Saver",
            gbp(4200, 0),
            0.04,
            VrpCap::new(gbp(1000, 0), gbp(3000, 0)).with_used(gbp(780, 0)),
        ),
        FundingSource::savings_account(
            "lloyds-isa",
            "Lloyds Cash ISA",
            gbp(8500, 0),
            0.038,
            VrpCap::new(gbp(1000, 0), gbp(2000, 0)),
        )
        .with_constraint(
            Constraint::vrp(VrpCap::new(gbp(1000, 0), gbp(2000, 0))).with_vrp_enabled(false),
        ),
        FundingSource::credit_card(
            "amex-gold",
            "Amex Gold",
            CreditCap::new(gbp(8000, 0), gbp(2400, 0), 90.0),
        )
        .with_interest_rate(0.249)
        .with_fx_markup(0.0299)
        .with_rewards(RewardSchedule::cashback([
            (Travel, 0.05),
            (Hotel, 0.03),
            (Grocery, 0.01),
            (OnlineShopping, 0.01),
        ])),
        FundingSource::credit_card(
            "chase",
            "Chase UK",
            CreditCap::new(gbp(5000, 0), gbp(500, 0), 80.0),
        )
        .with_interest_rate(0.229)
        .with_rewards(RewardSchedule::cashback([
            (OnlineShopping, 0.04),
            (Hotel, 0.02),
            (FuelTransport, 0.02),
            (Other, 0.01),
        ])),
        FundingSource::credit_card(
            "capital-one",
            "Capital One",
            CreditCap::new(gbp(3000, 0), gbp(500, 0), 50.0),
        )
        .with_interest_rate(0.299)
        .with_rewards(RewardSchedule::points(0.01, [(Travel, 2.0), (Other, 1.0)]))
        .with_constraint(
            Constraint::credit(CreditCap::new(gbp(3000, 0), gbp(500, 0), 50.0))
                .with_pay_in_full_only(true),
        ),
        FundingSource::new("sbi", "State Bank of India", SourceKind::InternationalAccount)
            .with_currency(Currency::Inr)
            .with_balance(Money::from_major_minor(100_000, 0))
            .with_fx_markup(0.06)
            .with_transfer_fee(Money::from_major_minor(250, 0)),
    ];

    let obligations = vec![
        ScheduledObligation::new(
            DEMO_DEFAULT_SOURCE,
            gbp(149, 0),
            taken_at + Duration::hours(20),
            "Council tax",
        ),
        ScheduledObligation::new(
            DEMO_DEFAULT_SOURCE,
            gbp(80, 0),
            taken_at + Duration::hours(22),
            "Energy",
        ),
    ];

    Snapshot::new(taken_at, sources).with_obligations(obligations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_demo_snapshot_is_valid() {
        let snapshot = demo_snapshot(Utc::now());
        snapshot.validate().unwrap();
        assert!(snapshot.source(&DEMO_DEFAULT_SOURCE.into()).is_some());
    }

    #[test]
    fn test_initialize_storage_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert!(needs_initialization(&paths));
        assert!(initialize_storage(&paths, Utc::now()).unwrap());
        assert!(!needs_initialization(&paths));
        assert!(!initialize_storage(&paths, Utc::now()).unwrap());

        let settings = Settings::load_or_create(&paths).unwrap();
        assert!(settings.setup_completed);
        assert_eq!(
            settings.preferences.default_source_id,
            Some(DEMO_DEFAULT_SOURCE.into())
        );
    }
}
