//! Payment engine
//!
//! The external surface of the allocation engine. Every call is
//! request/response: fetch a snapshot, compute or look up a plan, and for
//! commits re-validate against the reservation ledger's live counters.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLogger, Operation};
use crate::config::Settings;
use crate::error::{VaultError, VaultResult};
use crate::models::{
    AllocationPlan, CalendarMonth, FundingSource, PlanId, PlanRecord, PlanStatus,
    ReleaseOutcome, ReservationSet, ReservationSetId, SourceId, Transaction,
};
use crate::storage::{PlanRepository, ReservationLedger, Snapshot, SourceProvider};

use super::capacity::Capacity;
use super::explainer::{Explainer, Explanation};
use super::optimizer::{AllocationRequest, Optimizer};

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// The plan that was actually committed; differs from the requested
    /// plan when a conflict forced a recompute
    pub plan: AllocationPlan,
    pub reservation_set: ReservationSet,
    /// Commit attempts, 1 when there was no conflict
    pub attempts: u32,
}

impl CommitOutcome {
    pub fn was_replanned(&self) -> bool {
        self.attempts > 1
    }
}

/// Capacity of one source right now
#[derive(Debug, Clone)]
pub struct SourceCapacity {
    pub source: FundingSource,
    pub capacity: Capacity,
}

/// Allocation engine over a source provider, a reservation ledger and a
/// plan store
pub struct PaymentEngine<P: SourceProvider> {
    provider: P,
    settings: Settings,
    ledger: Arc<ReservationLedger>,
    plans: Arc<PlanRepository>,
    last_snapshot: RwLock<Option<Snapshot>>,
    audit: Option<AuditLogger>,
}

impl<P: SourceProvider> PaymentEngine<P> {
    /// Engine with an in-memory ledger and plan store
    pub fn new(provider: P, settings: Settings) -> Self {
        Self::with_storage(
            provider,
            settings,
            Arc::new(ReservationLedger::new()),
            Arc::new(PlanRepository::in_memory()),
        )
    }

    /// Engine over shared ledger and plan store
    pub fn with_storage(
        provider: P,
        settings: Settings,
        ledger: Arc<ReservationLedger>,
        plans: Arc<PlanRepository>,
    ) -> Self {
        Self {
            provider,
            settings,
            ledger,
            plans,
            last_snapshot: RwLock::new(None),
            audit: None,
        }
    }

    /// Record decisions and ledger changes in an audit log
    pub fn with_audit(mut self, logger: AuditLogger) -> Self {
        self.audit = Some(logger);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ledger(&self) -> &ReservationLedger {
        &self.ledger
    }

    pub fn plans(&self) -> &PlanRepository {
        &self.plans
    }

    fn optimizer(&self) -> Optimizer<'_> {
        Optimizer::new(&self.settings)
    }

    fn audit(&self, entry: AuditEntry) {
        if let Some(logger) = &self.audit {
            if let Err(e) = logger.log(&entry) {
                warn!("Failed to write audit entry: {}", e);
            }
        }
    }

    /// Fetch a fresh snapshot and bring the ledger counters up to date
    pub fn refresh(&self) -> VaultResult<Snapshot> {
        let snapshot = self.provider.snapshot().map_err(|e| {
            warn!("Source provider failed: {}", e);
            VaultError::EngineUnavailable(e.to_string())
        })?;
        self.ledger.sync(&snapshot)?;

        let mut last = self
            .last_snapshot
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;
        *last = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// The last snapshot the engine saw, if any
    pub fn last_snapshot(&self) -> VaultResult<Option<Snapshot>> {
        let last = self
            .last_snapshot
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(last.clone())
    }

    /// Last snapshot, fetching one if the engine has none yet
    fn current_snapshot(&self) -> VaultResult<Snapshot> {
        match self.last_snapshot()? {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh(),
        }
    }

    /// Run the optimizer and flag plans computed from stale data
    fn compute(&self, transaction: &Transaction, snapshot: &Snapshot) -> VaultResult<AllocationPlan> {
        let mut plan = self.optimizer().optimize(AllocationRequest {
            transaction,
            sources: &snapshot.sources,
            obligations: &snapshot.obligations,
            ledger: &self.ledger,
        })?;
        self.mark_staleness(&mut plan, transaction, snapshot);
        Ok(plan)
    }

    fn mark_staleness(&self, plan: &mut AllocationPlan, transaction: &Transaction, snapshot: &Snapshot) {
        let age = snapshot.age_minutes(transaction.timestamp);
        plan.snapshot_age_minutes = age;
        if age > self.settings.freshness_minutes {
            warn!(
                plan = %plan.id,
                age_minutes = age,
                threshold = self.settings.freshness_minutes,
                "Plan computed from stale snapshot"
            );
            plan.stale = true;
            plan.trace.push(format!(
                "Snapshot is {} minutes old; confirm before committing",
                age
            ));
        }
    }

    fn store(&self, plan: &AllocationPlan, transaction: &Transaction) -> VaultResult<()> {
        self.plans
            .upsert(PlanRecord::new(plan.clone(), transaction.clone()))?;
        self.audit(AuditEntry::plan_created(plan));
        Ok(())
    }

    /// Compute and store a plan for one transaction
    pub fn optimize(&self, transaction: &Transaction) -> VaultResult<AllocationPlan> {
        let snapshot = self.refresh()?;
        let plan = self.compute(transaction, &snapshot)?;
        self.store(&plan, transaction)?;
        Ok(plan)
    }

    /// Compute and store ranked alternative plans for one transaction
    pub fn optimize_multi(&self, transaction: &Transaction) -> VaultResult<Vec<AllocationPlan>> {
        let snapshot = self.refresh()?;
        let mut options = self.optimizer().optimize_multi(AllocationRequest {
            transaction,
            sources: &snapshot.sources,
            obligations: &snapshot.obligations,
            ledger: &self.ledger,
        })?;
        for plan in &mut options {
            self.mark_staleness(plan, transaction, &snapshot);
            self.store(plan, transaction)?;
        }
        Ok(options)
    }

    /// Plan several transactions independently against the same live
    /// ledger; nothing is committed
    pub fn optimize_batch(&self, transactions: &[Transaction]) -> VaultResult<Vec<VaultResult<AllocationPlan>>> {
        let snapshot = self.refresh()?;
        let mut results = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let result = self.compute(transaction, &snapshot);
            if let Ok(plan) = &result {
                self.store(plan, transaction)?;
            }
            results.push(result);
        }
        info!(
            transactions = transactions.len(),
            planned = results.iter().filter(|r| r.is_ok()).count(),
            "Batch planned"
        );
        Ok(results)
    }

    /// Look up a stored plan by full id, display id or prefix
    pub fn find_plan(&self, query: &str) -> VaultResult<PlanRecord> {
        self.plans.find(query)
    }

    /// Look up a reservation set by full id, display id or prefix
    pub fn find_reservation_set(&self, query: &str) -> VaultResult<ReservationSet> {
        if let Ok(id) = query.parse::<ReservationSetId>() {
            return self
                .ledger
                .reservation_set(id)?
                .ok_or_else(|| VaultError::reservation_not_found(query));
        }
        let prefix = query.strip_prefix("rsv-").unwrap_or(query).to_lowercase();
        let mut matches: Vec<ReservationSet> = self
            .ledger
            .history()?
            .into_iter()
            .filter(|s| !prefix.is_empty() && s.id.as_uuid().to_string().starts_with(&prefix))
            .collect();
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(VaultError::reservation_not_found(query)),
            _ => Err(VaultError::Validation(format!(
                "Reservation set id '{}' is ambiguous",
                query
            ))),
        }
    }

    /// Accept a plan that needs user confirmation
    pub fn confirm(&self, plan_id: PlanId) -> VaultResult<PlanRecord> {
        let (previous, record) = self.plans.transition_open(plan_id, PlanStatus::Confirmed)?;
        if previous != PlanStatus::Confirmed {
            info!(plan = %plan_id, "Plan confirmed");
            self.audit(AuditEntry::plan_status(Operation::Confirm, &record));
        }
        Ok(record)
    }

    /// Discard an uncommitted plan; the ledger is untouched
    pub fn cancel(&self, plan_id: PlanId) -> VaultResult<PlanRecord> {
        let (_, record) = self.plans.transition_open(plan_id, PlanStatus::Cancelled)?;
        info!(plan = %plan_id, "Plan cancelled");
        self.audit(AuditEntry::plan_status(Operation::Cancel, &record));
        Ok(record)
    }

    /// Hand a claimed plan back after a failed commit
    fn abandon(&self, plan_id: PlanId, status: PlanStatus, err: VaultError) -> VaultError {
        if let Err(e) = self.plans.release_claim(plan_id, status) {
            warn!(plan = %plan_id, "Failed to release commit claim: {}", e);
        }
        err
    }

    /// Reserve a stored plan's draws against the ledger
    ///
    /// The plan is claimed first, so of several callers committing the same
    /// plan, or different options for the same purchase, exactly one
    /// reaches the ledger. Plans needing confirmation must be confirmed
    /// first. When an auto-committable plan conflicts with a concurrent
    /// commit it is recomputed against the live counters, at most
    /// `max_commit_retries` times; confirmed plans are never silently
    /// re-planned.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no such plan is stored
    /// - `PlanState` if the plan is not open, or another option for the
    ///   same purchase is being or has been committed
    /// - `StaleSnapshot` / `ConfirmationRequired` for unconfirmed plans that
    ///   need the user's approval
    /// - `CapacityExceeded` when the live counters no longer admit the plan
    ///   and no acceptable re-plan exists
    ///
    /// On error the plan returns to the status it had before the call.
    pub fn commit(&self, plan_id: PlanId) -> VaultResult<CommitOutcome> {
        let record = self.plans.claim_for_commit(plan_id)?;
        let confirmed = record.status == PlanStatus::Confirmed;

        if record.plan.stale && !confirmed {
            let err = VaultError::StaleSnapshot {
                age_minutes: record.plan.snapshot_age_minutes,
                threshold_minutes: self.settings.freshness_minutes,
            };
            return Err(self.abandon(plan_id, record.status, err));
        }
        if record.plan.requires_confirmation && !confirmed {
            return Err(self.abandon(
                plan_id,
                record.status,
                VaultError::ConfirmationRequired(plan_id),
            ));
        }

        let validator = self.optimizer().validator().clone();
        let mut prior = record.status;
        let mut plan = record.plan;
        let mut attempts = 1;
        loop {
            match self.ledger.commit(&plan, &validator) {
                Ok(set) => return self.finish_commit(plan, set, attempts),
                Err(e) if e.is_capacity_exceeded() => {
                    if confirmed || attempts > self.settings.max_commit_retries {
                        return Err(self.abandon(plan.id, prior, e));
                    }
                    warn!(plan = %plan.id, attempt = attempts, "Commit conflict: {}", e);

                    let recomputed = self
                        .current_snapshot()
                        .and_then(|snapshot| self.compute(&record.transaction, &snapshot));
                    let replanned = match recomputed {
                        Ok(p) if p.is_auto_committable() => p,
                        Ok(p) => {
                            debug!(plan = %p.id, "Recomputed plan needs confirmation");
                            return Err(self.abandon(plan.id, prior, e));
                        }
                        Err(err) if err.is_insufficient_funds() => {
                            return Err(self.abandon(plan.id, prior, e))
                        }
                        Err(err) => return Err(self.abandon(plan.id, prior, err)),
                    };

                    self.plans.set_status(plan.id, PlanStatus::Superseded)?;
                    self.store(&replanned, &record.transaction)?;
                    let claimed = self.plans.claim_for_commit(replanned.id)?;
                    prior = claimed.status;
                    plan = replanned;
                    attempts += 1;
                }
                Err(e) => return Err(self.abandon(plan.id, prior, e)),
            }
        }
    }

    fn finish_commit(
        &self,
        plan: AllocationPlan,
        set: ReservationSet,
        attempts: u32,
    ) -> VaultResult<CommitOutcome> {
        // Other open options for the same purchase can no longer be used
        let superseded = self.plans.complete_commit(plan.id, set.id)?;
        if superseded > 0 {
            debug!(plan = %plan.id, superseded, "Sibling options superseded");
        }

        self.audit(AuditEntry::committed(&set, &plan));
        Ok(CommitOutcome {
            plan,
            reservation_set: set,
            attempts,
        })
    }

    /// Optimize and commit in one call; only auto-committable plans go
    /// through
    pub fn pay(&self, transaction: &Transaction) -> VaultResult<CommitOutcome> {
        let plan = self.optimize(transaction)?;
        if plan.stale {
            return Err(VaultError::StaleSnapshot {
                age_minutes: plan.snapshot_age_minutes,
                threshold_minutes: self.settings.freshness_minutes,
            });
        }
        if plan.requires_confirmation {
            return Err(VaultError::ConfirmationRequired(plan.id));
        }
        self.commit(plan.id)
    }

    /// Reverse a committed reservation set; repeated calls are no-ops
    pub fn release(&self, set_id: ReservationSetId) -> VaultResult<ReleaseOutcome> {
        let outcome = self.ledger.release(set_id)?;
        if outcome == ReleaseOutcome::Released {
            if let Some(set) = self.ledger.reservation_set(set_id)? {
                if self.plans.get(set.plan_id)?.is_some() {
                    self.plans.set_status(set.plan_id, PlanStatus::Released)?;
                }
                self.audit(AuditEntry::released(&set));
            }
        }
        Ok(outcome)
    }

    /// Human-readable rationale for a stored plan
    pub fn explain(&self, plan_id: PlanId) -> VaultResult<Explanation> {
        let record = self.plans.require(plan_id)?;
        let snapshot = self.current_snapshot()?;
        Explainer::new(&self.settings).explain(&record.plan, &record.transaction, &snapshot.sources)
    }

    /// Live capacity of one source
    pub fn capacity(&self, source_id: &SourceId) -> VaultResult<Capacity> {
        let snapshot = self.current_snapshot()?;
        let source = snapshot
            .source(source_id)
            .ok_or_else(|| VaultError::source_not_found(source_id.as_str()))?;
        self.optimizer()
            .validator()
            .available_capacity(&self.ledger, source, CalendarMonth::current())
    }

    /// Live capacity of every source in the current snapshot
    pub fn capacities(&self) -> VaultResult<Vec<SourceCapacity>> {
        let snapshot = self.current_snapshot()?;
        let month = CalendarMonth::current();
        let optimizer = self.optimizer();
        snapshot
            .sources
            .into_iter()
            .map(|source| {
                let capacity = optimizer
                    .validator()
                    .available_capacity(&self.ledger, &source, month)?;
                Ok(SourceCapacity { source, capacity })
            })
            .collect()
    }

    /// Non-committable plan computed from the last snapshot the engine
    /// saw, for when the provider is unreachable
    pub fn estimate(&self, transaction: &Transaction) -> VaultResult<AllocationPlan> {
        let snapshot = self.last_snapshot()?.ok_or_else(|| {
            VaultError::EngineUnavailable("no snapshot has been loaded yet".into())
        })?;
        let mut plan = self.compute(transaction, &snapshot)?;
        plan.stale = true;
        plan.requires_confirmation = true;
        plan.label = Some(format!(
            "Estimate from data as of {}",
            snapshot.taken_at.format("%Y-%m-%d %H:%M UTC")
        ));
        debug!(plan = %plan.id, "Estimate computed");
        Ok(plan)
    }
}
