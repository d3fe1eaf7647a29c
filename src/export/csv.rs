//! CSV Export functionality
//!
//! Exports reservation history and stored plans to CSV format.

use crate::error::{VaultError, VaultResult};
use crate::storage::Storage;
use std::io::Write;

/// Export every reservation, one row per source touched by a commit
pub fn export_reservations_csv<W: Write>(storage: &Storage, writer: &mut W) -> VaultResult<()> {
    writeln!(
        writer,
        "Set,Plan,Transaction,Committed,Released,Source,Amount,Balance Delta,Credit Delta,VRP Delta,Month"
    )
    .map_err(|e| VaultError::Export(e.to_string()))?;

    for set in storage.ledger.history()? {
        let released = set
            .released_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default();

        for r in &set.reservations {
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{},{}",
                set.id.as_uuid(),
                set.plan_id.as_uuid(),
                set.transaction_id.as_uuid(),
                set.committed_at.to_rfc3339(),
                released,
                escape_csv(r.source_id.as_str()),
                r.amount,
                r.balance_delta,
                r.credit_delta,
                r.vrp_delta,
                r.month
            )
            .map_err(|e| VaultError::Export(e.to_string()))?;
        }
    }

    Ok(())
}

/// Export stored plans, one row per plan entry
pub fn export_plans_csv<W: Write>(storage: &Storage, writer: &mut W) -> VaultResult<()> {
    writeln!(
        writer,
        "Plan,Status,Step,Merchant,Category,Currency,Amount,Source,Covered,Interest,FX,Reward,Net"
    )
    .map_err(|e| VaultError::Export(e.to_string()))?;

    for record in storage.plans.get_all()? {
        let plan = &record.plan;
        for entry in &plan.entries {
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{}",
                plan.id.as_uuid(),
                record.status,
                plan.step.number(),
                escape_csv(&record.transaction.merchant),
                escape_csv(&record.transaction.category.to_string()),
                plan.currency.code(),
                plan.amount,
                escape_csv(entry.source_id.as_str()),
                entry.covered,
                entry.interest_cost,
                entry.fx_cost,
                entry.reward,
                entry.net()
            )
            .map_err(|e| VaultError::Export(e.to_string()))?;
        }
    }

    Ok(())
}

fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::paths::VaultPaths;
    use crate::config::{Preferences, Settings};
    use crate::models::{Currency, Money, SpendingCategory, Transaction};
    use crate::services::PaymentEngine;
    use crate::storage::demo_snapshot;
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();
        (temp_dir, storage)
    }

    fn pay(storage: &Storage, merchant: &str) {
        let settings = Settings {
            preferences: Preferences::default().with_default_source("santander"),
            ..Settings::default()
        };
        let engine = PaymentEngine::with_storage(
            demo_snapshot(Utc::now()),
            settings,
            storage.ledger.clone(),
            storage.plans.clone(),
        );
        let txn = Transaction::new(
            Money::from_minor(2500),
            Currency::Gbp,
            SpendingCategory::Dining,
            merchant,
        );
        engine.pay(&txn).unwrap();
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_export_reservations_csv() {
        let (_temp_dir, storage) = create_test_storage();
        pay(&storage, "Dishoom");

        let mut csv_output = Vec::new();
        export_reservations_csv(&storage, &mut csv_output).unwrap();

        let csv_string = String::from_utf8(csv_output).unwrap();
        assert!(csv_string.starts_with("Set,Plan,Transaction"));
        assert!(csv_string.lines().count() >= 2);
        assert!(csv_string.contains("25.00"));
    }

    #[test]
    fn test_export_plans_csv() {
        let (_temp_dir, storage) = create_test_storage();
        pay(&storage, "Dishoom, Shoreditch");

        let mut csv_output = Vec::new();
        export_plans_csv(&storage, &mut csv_output).unwrap();

        let csv_string = String::from_utf8(csv_output).unwrap();
        assert!(csv_string.contains("committed"));
        assert!(csv_string.contains("\"Dishoom, Shoreditch\""));
    }
}
