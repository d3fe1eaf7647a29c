//! Append-only JSONL audit log
//!
//! One JSON object per line, flushed on every append.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{VaultError, VaultResult};

use super::entry::AuditEntry;

/// Writes and reads the audit log
///
/// Engines committing from several threads share one logger; appends go
/// through `append_lock` so lines never interleave.
pub struct AuditLogger {
    log_path: PathBuf,
    append_lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            append_lock: Mutex::new(()),
        }
    }

    /// Append one entry
    pub fn log(&self, entry: &AuditEntry) -> VaultResult<()> {
        let line = serde_json::to_string(entry)
            .map_err(|e| VaultError::Json(format!("Failed to serialize audit entry: {}", e)))?;

        let _guard = self
            .append_lock
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to lock audit log: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;
        writeln!(file, "{}", line)
            .and_then(|_| file.flush())
            .map_err(|e| VaultError::Io(format!("Failed to write audit entry: {}", e)))
    }

    /// Every entry in the log, oldest first
    pub fn read_all(&self) -> VaultResult<Vec<AuditEntry>> {
        self.scan(|_| true)
    }

    /// The last `count` entries, oldest first
    pub fn read_recent(&self, count: usize) -> VaultResult<Vec<AuditEntry>> {
        let mut entries = self.read_all()?;
        let skip = entries.len().saturating_sub(count);
        Ok(entries.split_off(skip))
    }

    /// Entries for one plan or reservation set; `entity_id` may be a prefix
    pub fn entries_for(&self, entity_id: &str) -> VaultResult<Vec<AuditEntry>> {
        self.scan(|entry| entry.entity_id.starts_with(entity_id))
    }

    fn scan(&self, keep: impl Fn(&AuditEntry) -> bool) -> VaultResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_path)
            .map_err(|e| VaultError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                VaultError::Io(format!("Failed to read audit log line {}: {}", index + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                VaultError::Json(format!("Bad audit entry on line {}: {}", index + 1, e))
            })?;
            if keep(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EntityType, Operation};
    use crate::models::{PlanId, ReservationSet, TransactionId};
    use serde_json::json;
    use tempfile::TempDir;

    fn logger_in(dir: &TempDir) -> AuditLogger {
        AuditLogger::new(dir.path().join("audit.log"))
    }

    fn plan_entry(id: &str) -> AuditEntry {
        AuditEntry::new(
            Operation::Plan,
            EntityType::Plan,
            id,
            Some("£4.50 via Santander".to_string()),
            &json!({"amount": 450}),
        )
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(logger_in(&dir).read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_recent_keeps_order() {
        let dir = TempDir::new().unwrap();
        let logger = logger_in(&dir);
        for i in 0..10 {
            logger.log(&plan_entry(&format!("plan-{}", i))).unwrap();
        }

        let recent = logger.read_recent(3).unwrap();
        let ids: Vec<_> = recent.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, ["plan-7", "plan-8", "plan-9"]);
        assert_eq!(logger.read_recent(50).unwrap().len(), 10);
    }

    #[test]
    fn test_entries_for_matches_prefix() {
        let dir = TempDir::new().unwrap();
        let logger = logger_in(&dir);
        logger.log(&plan_entry("plan-aa11")).unwrap();
        logger.log(&plan_entry("plan-bb22")).unwrap();
        logger.log(&plan_entry("plan-aa11")).unwrap();

        assert_eq!(logger.entries_for("plan-aa").unwrap().len(), 2);
        assert!(logger.entries_for("rsv-").unwrap().is_empty());
    }

    #[test]
    fn test_parallel_appends_stay_line_delimited() {
        let dir = TempDir::new().unwrap();
        let logger = logger_in(&dir);
        std::thread::scope(|s| {
            for t in 0..4 {
                let logger = &logger;
                s.spawn(move || {
                    for i in 0..25 {
                        logger.log(&plan_entry(&format!("plan-{}-{}", t, i))).unwrap();
                    }
                });
            }
        });
        assert_eq!(logger.read_all().unwrap().len(), 100);
    }

    #[test]
    fn test_release_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let set = ReservationSet::new(PlanId::new(), TransactionId::new(), vec![]);
        logger_in(&dir).log(&AuditEntry::released(&set)).unwrap();

        let entries = logger_in(&dir).read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::Release);
        assert_eq!(entries[0].entity_id, set.id.to_string());
    }
}
