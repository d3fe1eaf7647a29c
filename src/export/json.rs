//! JSON Export functionality
//!
//! Exports the reservation ledger and stored plans to JSON format with
//! schema versioning.

use crate::error::{VaultError, VaultResult};
use crate::models::PlanRecord;
use crate::storage::{LedgerState, Storage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Full ledger export structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullExport {
    /// Schema version for compatibility checking
    pub schema_version: String,

    /// Export timestamp
    pub exported_at: DateTime<Utc>,

    /// Application version that created the export
    pub app_version: String,

    /// Source counters and every reservation set
    pub ledger: LedgerState,

    /// All stored plans
    pub plans: Vec<PlanRecord>,

    /// Export metadata
    pub metadata: ExportMetadata,
}

/// Export metadata for reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub source_count: usize,
    pub reservation_set_count: usize,
    pub active_set_count: usize,
    pub plan_count: usize,
}

impl FullExport {
    /// Create a new full export from storage
    pub fn from_storage(storage: &Storage) -> VaultResult<Self> {
        let ledger = storage.ledger.to_state()?;
        let plans = storage.plans.get_all()?;

        let metadata = ExportMetadata {
            source_count: ledger.sources.len(),
            reservation_set_count: ledger.reservation_sets.len(),
            active_set_count: ledger
                .reservation_sets
                .iter()
                .filter(|s| !s.is_released())
                .count(),
            plan_count: plans.len(),
        };

        Ok(Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger,
            plans,
            metadata,
        })
    }

    /// Validate the export structure
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                EXPORT_SCHEMA_VERSION, self.schema_version
            ));
        }

        let plan_ids: HashSet<_> = self.plans.iter().map(|p| p.id()).collect();

        for set in &self.ledger.reservation_sets {
            if !plan_ids.contains(&set.plan_id) {
                return Err(format!(
                    "Reservation set {} references unknown plan {}",
                    set.id, set.plan_id
                ));
            }
            for r in &set.reservations {
                if !self.ledger.sources.contains_key(&r.source_id) {
                    return Err(format!(
                        "Reservation set {} references unknown source {}",
                        set.id, r.source_id
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Export the ledger and plans to JSON
pub fn export_full_json<W: Write>(
    storage: &Storage,
    writer: &mut W,
    pretty: bool,
) -> VaultResult<()> {
    let export = FullExport::from_storage(storage)?;

    if pretty {
        serde_json::to_writer_pretty(writer, &export)
    } else {
        serde_json::to_writer(writer, &export)
    }
    .map_err(|e| VaultError::Export(e.to_string()))?;

    Ok(())
}

/// Import from a JSON export (for verification/restore)
pub fn import_from_json(json_str: &str) -> VaultResult<FullExport> {
    let export: FullExport =
        serde_json::from_str(json_str).map_err(|e| VaultError::Import(e.to_string()))?;

    export.validate().map_err(VaultError::Import)?;

    Ok(export)
}
