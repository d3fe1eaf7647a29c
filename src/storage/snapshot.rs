//! Funding-source snapshots and providers
//!
//! The engine never talks to banks. A [`SourceProvider`] hands it a
//! [`Snapshot`] of every funding source plus the scheduled obligations it
//! knows about. The CLI reads snapshots from JSON or YAML files, and can
//! merge direct debits from a bank-statement style CSV.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{Reader, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{VaultError, VaultResult};
use crate::models::{FundingSource, Money, ScheduledObligation, SourceId};

use super::file_io::{is_yaml, read_document, write_json_atomic};

/// Point-in-time view of the user's funding sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the provider last refreshed the data
    pub taken_at: DateTime<Utc>,

    #[serde(default)]
    pub sources: Vec<FundingSource>,

    #[serde(default)]
    pub obligations: Vec<ScheduledObligation>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>, sources: Vec<FundingSource>) -> Self {
        Self {
            taken_at,
            sources,
            obligations: Vec::new(),
        }
    }

    pub fn with_obligations(mut self, obligations: Vec<ScheduledObligation>) -> Self {
        self.obligations = obligations;
        self
    }

    /// Look up a source by id
    pub fn source(&self, id: &SourceId) -> Option<&FundingSource> {
        self.sources.iter().find(|s| &s.id == id)
    }

    /// Minutes between the snapshot and `at`
    pub fn age_minutes(&self, at: DateTime<Utc>) -> i64 {
        (at - self.taken_at).num_minutes()
    }

    /// Validate every source, rejecting duplicate ids
    pub fn validate(&self) -> VaultResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.clone()) {
                return Err(VaultError::Validation(format!(
                    "Duplicate funding source id: {}",
                    source.id
                )));
            }
            source
                .validate()
                .map_err(|e| VaultError::Validation(format!("{}: {}", source.id, e)))?;
        }
        for obligation in &self.obligations {
            if !obligation.amount.is_positive() {
                return Err(VaultError::Validation(format!(
                    "Obligation '{}' must have a positive amount",
                    obligation.name
                )));
            }
        }
        Ok(())
    }

    /// Save the snapshot as JSON, or YAML for `.yaml`/`.yml` paths
    pub fn save(&self, path: &Path) -> VaultResult<()> {
        if is_yaml(path) {
            let contents = serde_yaml::to_string(self)
                .map_err(|e| VaultError::Storage(format!("Failed to serialize snapshot: {}", e)))?;
            std::fs::write(path, contents)
                .map_err(|e| VaultError::Io(format!("Failed to write {}: {}", path.display(), e)))
        } else {
            write_json_atomic(path, self)
        }
    }
}

/// Source of funding-source snapshots (an Open Banking aggregator, a file,
/// a fixture in tests)
pub trait SourceProvider: Send + Sync {
    /// Fetch the latest snapshot
    fn snapshot(&self) -> VaultResult<Snapshot>;
}

impl SourceProvider for Snapshot {
    fn snapshot(&self) -> VaultResult<Snapshot> {
        Ok(self.clone())
    }
}

/// Provider reading a JSON or YAML snapshot file on every call
#[derive(Debug, Clone)]
pub struct FileSnapshotProvider {
    path: PathBuf,
    obligations_csv: Option<PathBuf>,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            obligations_csv: None,
        }
    }

    /// Also merge obligations from a CSV file
    pub fn with_obligations_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.obligations_csv = Some(path.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceProvider for FileSnapshotProvider {
    fn snapshot(&self) -> VaultResult<Snapshot> {
        let mut snapshot: Snapshot = read_document(&self.path)?;
        if let Some(csv_path) = &self.obligations_csv {
            snapshot.obligations.extend(import_obligations_csv(csv_path)?);
        }
        snapshot.validate()?;
        debug!(
            path = %self.path.display(),
            sources = snapshot.sources.len(),
            obligations = snapshot.obligations.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }
}

/// Read scheduled obligations from a CSV file
///
/// Expected header: `source_id,amount,due_at,name`. `due_at` may be RFC 3339,
/// `YYYY-MM-DD HH:MM` (UTC) or a bare date (midnight UTC).
pub fn import_obligations_csv(path: &Path) -> VaultResult<Vec<ScheduledObligation>> {
    let mut reader = Reader::from_path(path)
        .map_err(|e| VaultError::Import(format!("Failed to open {}: {}", path.display(), e)))?;
    parse_obligations(&mut reader)
}

/// Parse obligations from any CSV reader
pub fn parse_obligations<R: std::io::Read>(
    reader: &mut Reader<R>,
) -> VaultResult<Vec<ScheduledObligation>> {
    let mut obligations = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| VaultError::Import(format!("Error reading CSV record: {}", e)))?;
        // Row 1 is the header
        let obligation = parse_obligation(&record)
            .map_err(|e| VaultError::Import(format!("Row {}: {}", idx + 2, e)))?;
        obligations.push(obligation);
    }
    Ok(obligations)
}

fn parse_obligation(record: &StringRecord) -> Result<ScheduledObligation, String> {
    let field = |i: usize, name: &str| {
        record
            .get(i)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing {} column", name))
    };

    let source_id = field(0, "source_id")?;
    let amount = Money::parse(field(1, "amount")?).map_err(|e| e.to_string())?;
    if !amount.is_positive() {
        return Err(format!("Amount must be positive, got {}", amount));
    }
    let due_at = parse_due_at(field(2, "due_at")?)?;
    let name = record.get(3).map(str::trim).unwrap_or_default();

    Ok(ScheduledObligation::new(source_id, amount, due_at, name))
}

pub(crate) fn parse_due_at(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Ok(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Could not parse due date: '{}'", s))
}
