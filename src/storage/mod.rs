//! Storage layer for OptiVault
//!
//! Provides JSON file storage with atomic writes for the reservation
//! ledger and plan records, plus snapshot providers and first-run setup.

pub mod file_io;
pub mod import;
pub mod init;
pub mod ledger;
pub mod plans;
pub mod snapshot;

pub use file_io::{read_json, write_json_atomic};
pub use import::{import_transactions_csv, parse_transactions};
pub use init::{demo_snapshot, initialize_storage, needs_initialization};
pub use ledger::{LedgerState, ReservationLedger, SourceCounters, UsageFigures};
pub use plans::PlanRepository;
pub use snapshot::{
    import_obligations_csv, FileSnapshotProvider, Snapshot, SourceProvider,
};

use std::path::PathBuf;
use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::config::paths::VaultPaths;
use crate::error::VaultResult;

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    paths: VaultPaths,
    snapshot_file: PathBuf,
    pub ledger: Arc<ReservationLedger>,
    pub plans: Arc<PlanRepository>,
}

impl Storage {
    /// Open storage, loading the ledger and plan records from disk
    pub fn open(paths: VaultPaths) -> VaultResult<Self> {
        paths.ensure_directories()?;

        let ledger = ReservationLedger::load(&paths.ledger_file())?;
        let plans = PlanRepository::new(paths.plans_file());
        plans.load()?;

        Ok(Self {
            ledger: Arc::new(ledger),
            plans: Arc::new(plans),
            snapshot_file: paths.snapshot_file(),
            paths,
        })
    }

    /// Read funding sources from another snapshot file
    pub fn with_snapshot_file(mut self, path: PathBuf) -> Self {
        self.snapshot_file = path;
        self
    }

    /// Get the paths configuration
    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }

    /// Audit logger writing to the configured audit log
    pub fn audit_logger(&self) -> AuditLogger {
        AuditLogger::new(self.paths.audit_log())
    }

    /// Provider reading the configured snapshot file
    pub fn snapshot_provider(&self) -> FileSnapshotProvider {
        FileSnapshotProvider::new(self.snapshot_file.clone())
    }

    /// Save all data to disk
    pub fn save_all(&self) -> VaultResult<()> {
        self.ledger.save(&self.paths.ledger_file())?;
        self.plans.save()?;
        Ok(())
    }

    /// Check if storage has been initialized
    pub fn is_initialized(&self) -> bool {
        self.paths.is_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Preferences, Settings};
    use crate::error::VaultError;
    use crate::models::{Currency, FundingSource, Money, SpendingCategory, Transaction};
    use crate::services::PaymentEngine;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_storage_creation() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();

        assert!(temp_dir.path().join("data").exists());
        assert!(!storage.is_initialized());
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let snapshot = demo_snapshot(Utc::now());

        let storage = Storage::open(paths.clone()).unwrap();
        storage.ledger.sync(&snapshot).unwrap();
        storage.save_all().unwrap();

        let reopened = Storage::open(paths).unwrap();
        let counters = reopened
            .ledger
            .counters(&"santander".into())
            .unwrap()
            .unwrap();
        assert_eq!(counters.available_balance, snapshot.sources[0].balance);
    }

    #[test]
    fn test_overlapping_sessions_cannot_double_spend() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let snapshot = Snapshot::new(
            Utc::now() - Duration::minutes(1),
            vec![FundingSource::current_account(
                "santander",
                "Santander",
                Money::from_minor(50000),
            )],
        );
        let settings = Settings {
            preferences: Preferences::default().with_default_source("santander"),
            ..Settings::default()
        };

        let seed = Storage::open(paths.clone()).unwrap();
        seed.ledger.sync(&snapshot).unwrap();
        seed.save_all().unwrap();

        // Two sessions open the same data before either saves
        let sessions = [
            Storage::open(paths.clone()).unwrap(),
            Storage::open(paths.clone()).unwrap(),
        ];
        for storage in &sessions {
            let engine = PaymentEngine::with_storage(
                snapshot.clone(),
                settings.clone(),
                Arc::clone(&storage.ledger),
                Arc::clone(&storage.plans),
            );
            let purchase = Transaction::new(
                Money::from_minor(40000),
                Currency::Gbp,
                SpendingCategory::Other,
                "Currys",
            );
            engine.pay(&purchase).unwrap();
        }

        sessions[0].save_all().unwrap();
        assert!(matches!(sessions[1].save_all(), Err(VaultError::Storage(_))));

        let reopened = Storage::open(paths).unwrap();
        let counters = reopened
            .ledger
            .counters(&"santander".into())
            .unwrap()
            .unwrap();
        assert_eq!(counters.available_balance, Money::from_minor(10000));
        assert_eq!(reopened.ledger.history().unwrap().len(), 1);
    }
}
