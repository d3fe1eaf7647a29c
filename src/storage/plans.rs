//! Plan repository for JSON storage
//!
//! Manages loading and saving plan records to plans.json

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{VaultError, VaultResult};
use crate::models::{PlanId, PlanRecord, PlanStatus, ReservationSetId, TransactionId};

use super::file_io::{read_json, write_json_atomic};

/// Serializable plan data structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct PlanData {
    plans: Vec<PlanRecord>,
}

/// Repository for plan persistence
pub struct PlanRepository {
    /// `None` for a repository that is never persisted
    path: Option<PathBuf>,
    data: RwLock<HashMap<PlanId, PlanRecord>>,
}

impl PlanRepository {
    /// Create a new plan repository
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a repository that only lives in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Load plans from disk
    pub fn load(&self) -> VaultResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file_data: PlanData = read_json(path)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.clear();
        for record in file_data.plans {
            data.insert(record.id(), record);
        }

        Ok(())
    }

    /// Save plans to disk
    pub fn save(&self) -> VaultResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let plans = self.get_all()?;
        write_json_atomic(path, &PlanData { plans })
    }

    /// Get a plan record by ID
    pub fn get(&self, id: PlanId) -> VaultResult<Option<PlanRecord>> {
        let data = self
            .data
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.get(&id).cloned())
    }

    /// Get a plan record by ID, failing if it doesn't exist
    pub fn require(&self, id: PlanId) -> VaultResult<PlanRecord> {
        self.get(id)?
            .ok_or_else(|| VaultError::plan_not_found(id.to_string()))
    }

    /// Get all plan records, oldest first
    pub fn get_all(&self) -> VaultResult<Vec<PlanRecord>> {
        let data = self
            .data
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut plans: Vec<_> = data.values().cloned().collect();
        plans.sort_by(|a, b| {
            a.plan
                .created_at
                .cmp(&b.plan.created_at)
                .then(a.id().cmp(&b.id()))
        });
        Ok(plans)
    }

    /// All plans computed for a transaction
    pub fn for_transaction(&self, transaction_id: TransactionId) -> VaultResult<Vec<PlanRecord>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| r.plan.transaction_id == transaction_id)
            .collect())
    }

    /// Find a plan by full id, display id (`plan-1a2b3c4d`) or uuid prefix
    pub fn find(&self, query: &str) -> VaultResult<PlanRecord> {
        if let Ok(id) = query.parse::<PlanId>() {
            return self.require(id);
        }

        let prefix = query.strip_prefix("plan-").unwrap_or(query).to_lowercase();
        if prefix.is_empty() {
            return Err(VaultError::plan_not_found(query));
        }

        let data = self
            .data
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut matches = data
            .values()
            .filter(|r| r.id().as_uuid().to_string().starts_with(&prefix));
        match (matches.next(), matches.next()) {
            (Some(record), None) => Ok(record.clone()),
            (Some(_), Some(_)) => Err(VaultError::Validation(format!(
                "Plan id '{}' is ambiguous",
                query
            ))),
            (None, _) => Err(VaultError::plan_not_found(query)),
        }
    }

    /// Insert or update a plan record
    pub fn upsert(&self, record: PlanRecord) -> VaultResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        data.insert(record.id(), record);
        Ok(())
    }

    /// Change the status of a stored plan and return the updated record
    pub fn set_status(&self, id: PlanId, status: PlanStatus) -> VaultResult<PlanRecord> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let record = data
            .get_mut(&id)
            .ok_or_else(|| VaultError::plan_not_found(id.to_string()))?;
        record.set_status(status);
        Ok(record.clone())
    }

    /// Move an open plan to `status`, returning its previous status and
    /// the updated record
    ///
    /// Check and update happen under one write lock, so of two racing
    /// transitions only one sees the plan open.
    pub fn transition_open(
        &self,
        id: PlanId,
        status: PlanStatus,
    ) -> VaultResult<(PlanStatus, PlanRecord)> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let record = data
            .get_mut(&id)
            .ok_or_else(|| VaultError::plan_not_found(id.to_string()))?;
        let previous = record.status;
        if !previous.is_open() {
            return Err(VaultError::PlanState {
                plan_id: id,
                state: previous.to_string(),
            });
        }
        record.set_status(status);
        Ok((previous, record.clone()))
    }

    /// Claim an open plan for commit, returning the record as it was
    /// before the claim
    ///
    /// At most one plan per transaction can be claimed at a time; a second
    /// claimant, whether for the same plan or a sibling option, gets a
    /// `PlanState` error.
    pub fn claim_for_commit(&self, id: PlanId) -> VaultResult<PlanRecord> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let transaction_id = data
            .get(&id)
            .ok_or_else(|| VaultError::plan_not_found(id.to_string()))?
            .plan
            .transaction_id;
        if let Some(other) = data.values().find(|r| {
            r.id() != id
                && r.plan.transaction_id == transaction_id
                && matches!(r.status, PlanStatus::Committing | PlanStatus::Committed)
        }) {
            return Err(VaultError::PlanState {
                plan_id: id,
                state: format!("blocked: option {} is {}", other.id(), other.status),
            });
        }

        let record = data
            .get_mut(&id)
            .ok_or_else(|| VaultError::plan_not_found(id.to_string()))?;
        if !record.status.is_open() {
            return Err(VaultError::PlanState {
                plan_id: id,
                state: record.status.to_string(),
            });
        }
        let claimed = record.clone();
        record.set_status(PlanStatus::Committing);
        Ok(claimed)
    }

    /// Hand back a claim after a failed commit, restoring `status`
    pub fn release_claim(&self, id: PlanId, status: PlanStatus) -> VaultResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        if let Some(record) = data.get_mut(&id) {
            if record.status == PlanStatus::Committing {
                record.set_status(status);
            }
        }
        Ok(())
    }

    /// Mark a claimed plan committed and supersede every other open option
    /// for the same transaction, in one step
    ///
    /// Returns the number of options superseded.
    pub fn complete_commit(&self, id: PlanId, set_id: ReservationSetId) -> VaultResult<usize> {
        let mut data = self
            .data
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let record = data
            .get_mut(&id)
            .ok_or_else(|| VaultError::plan_not_found(id.to_string()))?;
        if record.status != PlanStatus::Committing {
            return Err(VaultError::PlanState {
                plan_id: id,
                state: record.status.to_string(),
            });
        }
        record.set_status(PlanStatus::Committed);
        record.reservation_set = Some(set_id);
        let transaction_id = record.plan.transaction_id;

        let mut superseded = 0;
        for sibling in data.values_mut() {
            if sibling.plan.transaction_id == transaction_id && sibling.status.is_open() {
                sibling.set_status(PlanStatus::Superseded);
                superseded += 1;
            }
        }
        Ok(superseded)
    }

    /// Count plan records
    pub fn count(&self) -> VaultResult<usize> {
        let data = self
            .data
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AllocationPlan, Currency, DecisionStep, Money, SpendingCategory, Transaction,
    };
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, PlanRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plans.json");
        let repo = PlanRepository::new(path);
        (temp_dir, repo)
    }

    fn txn() -> Transaction {
        Transaction::new(
            Money::from_minor(450),
            Currency::Gbp,
            SpendingCategory::Dining,
            "Pret",
        )
    }

    fn record_for(txn: &Transaction) -> PlanRecord {
        let plan = AllocationPlan::new(txn, DecisionStep::PassThrough, vec![], vec![]);
        PlanRecord::new(plan, txn.clone())
    }

    fn record() -> PlanRecord {
        record_for(&txn())
    }

    #[test]
    fn test_empty_load() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_upsert_and_get() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();

        let record = record();
        let id = record.id();
        repo.upsert(record).unwrap();

        let retrieved = repo.get(id).unwrap().unwrap();
        assert_eq!(retrieved.status, PlanStatus::Pending);
    }

    #[test]
    fn test_save_and_reload() {
        let (temp_dir, repo) = create_test_repo();
        let record = record();
        let id = record.id();
        repo.upsert(record).unwrap();
        repo.set_status(id, PlanStatus::Confirmed).unwrap();
        repo.save().unwrap();

        let path = temp_dir.path().join("plans.json");
        let repo2 = PlanRepository::new(path);
        repo2.load().unwrap();
        assert_eq!(repo2.require(id).unwrap().status, PlanStatus::Confirmed);
    }

    #[test]
    fn test_find_by_display_id_and_prefix() {
        let (_temp_dir, repo) = create_test_repo();
        let record = record();
        let id = record.id();
        repo.upsert(record).unwrap();

        assert_eq!(repo.find(&id.to_string()).unwrap().id(), id);
        assert_eq!(repo.find(&id.as_uuid().to_string()).unwrap().id(), id);
        assert_eq!(
            repo.find(&id.as_uuid().to_string()[..6]).unwrap().id(),
            id
        );
        assert!(repo.find("plan-zzzz").unwrap_err().is_not_found());
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let repo = PlanRepository::in_memory();
        repo.upsert(record()).unwrap();
        repo.save().unwrap();
        repo.load().unwrap();
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_for_transaction() {
        let (_temp_dir, repo) = create_test_repo();
        let first = record();
        let txn_id = first.plan.transaction_id;
        repo.upsert(first).unwrap();
        repo.upsert(record()).unwrap();

        assert_eq!(repo.for_transaction(txn_id).unwrap().len(), 1);
    }

    #[test]
    fn test_claim_is_exclusive_per_transaction() {
        let repo = PlanRepository::in_memory();
        let t = txn();
        let first = record_for(&t);
        let second = record_for(&t);
        let (a, b) = (first.id(), second.id());
        repo.upsert(first).unwrap();
        repo.upsert(second).unwrap();

        let claimed = repo.claim_for_commit(a).unwrap();
        assert_eq!(claimed.status, PlanStatus::Pending);
        assert_eq!(repo.require(a).unwrap().status, PlanStatus::Committing);

        // Same plan twice, or a sibling option, while the claim is held
        assert!(repo.claim_for_commit(a).unwrap_err().is_plan_state());
        assert!(repo.claim_for_commit(b).unwrap_err().is_plan_state());
        assert!(repo
            .transition_open(a, PlanStatus::Cancelled)
            .unwrap_err()
            .is_plan_state());

        repo.release_claim(a, PlanStatus::Pending).unwrap();
        assert_eq!(repo.require(a).unwrap().status, PlanStatus::Pending);
        repo.claim_for_commit(b).unwrap();
    }

    #[test]
    fn test_complete_commit_supersedes_open_siblings() {
        let repo = PlanRepository::in_memory();
        let t = txn();
        let records: Vec<_> = (0..3).map(|_| record_for(&t)).collect();
        let ids: Vec<_> = records.iter().map(|r| r.id()).collect();
        for r in records {
            repo.upsert(r).unwrap();
        }
        repo.transition_open(ids[2], PlanStatus::Cancelled).unwrap();
        let unrelated = record();
        let unrelated_id = unrelated.id();
        repo.upsert(unrelated).unwrap();

        repo.claim_for_commit(ids[0]).unwrap();
        let set_id = ReservationSetId::new();
        assert_eq!(repo.complete_commit(ids[0], set_id).unwrap(), 1);

        let committed = repo.require(ids[0]).unwrap();
        assert_eq!(committed.status, PlanStatus::Committed);
        assert_eq!(committed.reservation_set, Some(set_id));
        assert_eq!(repo.require(ids[1]).unwrap().status, PlanStatus::Superseded);
        assert_eq!(repo.require(ids[2]).unwrap().status, PlanStatus::Cancelled);
        assert_eq!(repo.require(unrelated_id).unwrap().status, PlanStatus::Pending);

        // Without a claim there is nothing to complete
        assert!(repo
            .complete_commit(unrelated_id, ReservationSetId::new())
            .unwrap_err()
            .is_plan_state());
    }

    #[test]
    fn test_transition_open_reports_previous_status() {
        let repo = PlanRepository::in_memory();
        let record = record();
        let id = record.id();
        repo.upsert(record).unwrap();

        let (previous, updated) = repo.transition_open(id, PlanStatus::Confirmed).unwrap();
        assert_eq!(previous, PlanStatus::Pending);
        assert_eq!(updated.status, PlanStatus::Confirmed);

        repo.transition_open(id, PlanStatus::Cancelled).unwrap();
        match repo.transition_open(id, PlanStatus::Confirmed) {
            Err(VaultError::PlanState { state, .. }) => assert_eq!(state, "cancelled"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
