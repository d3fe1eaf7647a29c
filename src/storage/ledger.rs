//! Reservation ledger
//!
//! Live usage counters per funding source, and the reservation sets that
//! committed plans have applied to them. Each source's counters sit behind
//! their own mutex; a commit locks every touched source in ascending id
//! order, re-validates, then applies all deltas or none.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{VaultError, VaultResult};
use crate::models::{
    AllocationPlan, CalendarMonth, Constraint, Currency, FundingSource, Money, ReleaseOutcome,
    Reservation, ReservationSet, ReservationSetId, SourceId, SourceKind,
};
use crate::services::capacity::CapacityValidator;

use super::file_io::{read_json, write_json_atomic};
use super::snapshot::Snapshot;

/// Mutable usage state of one funding source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCounters {
    pub kind: SourceKind,
    pub currency: Currency,
    pub constraint: Constraint,

    #[serde(default)]
    pub carries_balance: bool,

    /// Spendable balance of an asset account
    pub available_balance: Money,

    /// Owed balance of a credit card
    pub credit_balance: Money,

    /// VRP usage per calendar month
    #[serde(default)]
    pub vrp_used: BTreeMap<CalendarMonth, Money>,

    /// Bumped on every change
    #[serde(default)]
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

/// The money-bearing part of a source's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageFigures {
    pub available_balance: Money,
    pub credit_balance: Money,
    pub vrp_used: BTreeMap<CalendarMonth, Money>,
}

impl SourceCounters {
    /// Seed counters from a snapshot source; reported VRP usage counts
    /// against `month`
    pub fn from_source(source: &FundingSource, month: CalendarMonth) -> Self {
        let mut vrp_used = BTreeMap::new();
        if let Some(vrp) = &source.constraint.vrp {
            if vrp.used_this_month.is_positive() {
                vrp_used.insert(month, vrp.used_this_month);
            }
        }

        Self {
            kind: source.kind,
            currency: source.currency,
            constraint: source.constraint.clone(),
            carries_balance: source.carries_balance,
            available_balance: source.balance,
            credit_balance: source
                .constraint
                .credit
                .map(|c| c.current_balance)
                .unwrap_or_default(),
            vrp_used,
            version: 0,
            synced_at: None,
        }
    }

    /// VRP usage counted against `month`
    pub fn vrp_used_in(&self, month: CalendarMonth) -> Money {
        self.vrp_used.get(&month).copied().unwrap_or_default()
    }

    pub fn usage(&self) -> UsageFigures {
        UsageFigures {
            available_balance: self.available_balance,
            credit_balance: self.credit_balance,
            vrp_used: self.vrp_used.clone(),
        }
    }

    /// Deltas a draw of `amount` would apply
    fn reservation_for(&self, source_id: &SourceId, amount: Money, month: CalendarMonth) -> Reservation {
        let is_card = self.kind == SourceKind::CreditCard;
        Reservation {
            source_id: source_id.clone(),
            amount,
            month,
            balance_delta: if is_card { Money::zero() } else { amount },
            credit_delta: if is_card { amount } else { Money::zero() },
            vrp_delta: if self.constraint.is_vrp_gated() {
                amount
            } else {
                Money::zero()
            },
        }
    }

    fn apply(&mut self, reservation: &Reservation) {
        self.available_balance -= reservation.balance_delta;
        self.credit_balance += reservation.credit_delta;
        if reservation.vrp_delta.is_positive() {
            *self.vrp_used.entry(reservation.month).or_default() += reservation.vrp_delta;
        }
        self.version += 1;
    }

    fn reverse(&mut self, reservation: &Reservation) {
        self.available_balance += reservation.balance_delta;
        self.credit_balance = (self.credit_balance - reservation.credit_delta).non_negative();
        if reservation.vrp_delta.is_positive() {
            let used = self.vrp_used_in(reservation.month) - reservation.vrp_delta;
            if used.is_positive() {
                self.vrp_used.insert(reservation.month, used);
            } else {
                self.vrp_used.remove(&reservation.month);
            }
        }
        self.version += 1;
    }
}

/// Serializable ledger state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub sources: BTreeMap<SourceId, SourceCounters>,
    #[serde(default)]
    pub reservation_sets: Vec<ReservationSet>,
}

type SharedCounters = Arc<Mutex<SourceCounters>>;

/// Concurrency-safe usage counters and reservation sets
#[derive(Default)]
pub struct ReservationLedger {
    sources: RwLock<BTreeMap<SourceId, SharedCounters>>,
    sets: Mutex<HashMap<ReservationSetId, ReservationSet>>,
    /// Source versions as last read from or written to disk
    persisted: Mutex<BTreeMap<SourceId, u64>>,
}

fn versions(state: &LedgerState) -> BTreeMap<SourceId, u64> {
    state
        .sources
        .iter()
        .map(|(id, counters)| (id.clone(), counters.version))
        .collect()
}

fn lock_counters<'a>(
    id: &SourceId,
    counters: &'a SharedCounters,
) -> VaultResult<MutexGuard<'a, SourceCounters>> {
    counters
        .lock()
        .map_err(|e| VaultError::Storage(format!("Failed to lock counters for {}: {}", id, e)))
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted state
    pub fn from_state(state: LedgerState) -> Self {
        let persisted = versions(&state);
        let sources = state
            .sources
            .into_iter()
            .map(|(id, counters)| (id, Arc::new(Mutex::new(counters))))
            .collect();
        let sets = state
            .reservation_sets
            .into_iter()
            .map(|set| (set.id, set))
            .collect();
        Self {
            sources: RwLock::new(sources),
            sets: Mutex::new(sets),
            persisted: Mutex::new(persisted),
        }
    }

    /// Copy out the current state
    pub fn to_state(&self) -> VaultResult<LedgerState> {
        let mut state = LedgerState::default();
        for (id, shared) in self.source_handles()? {
            state.sources.insert(id.clone(), lock_counters(&id, &shared)?.clone());
        }
        state.reservation_sets = self.history()?;
        Ok(state)
    }

    /// Load a ledger from a JSON file (empty if the file doesn't exist)
    pub fn load(path: &Path) -> VaultResult<Self> {
        let state: LedgerState = read_json(path)?;
        Ok(Self::from_state(state))
    }

    /// Save the ledger to a JSON file
    ///
    /// Several processes may open the same file. A save only goes through
    /// while the file still holds the source versions this ledger last
    /// loaded or saved; otherwise another writer committed in between and
    /// overwriting would drop its reservations. Nothing is written when no
    /// counter changed since.
    ///
    /// # Errors
    ///
    /// `VaultError::Storage` when the file was changed by another writer,
    /// plus any I/O or JSON error from reading or writing it.
    pub fn save(&self, path: &Path) -> VaultResult<()> {
        let mut persisted = self
            .persisted
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to lock ledger versions: {}", e)))?;

        let state = self.to_state()?;
        let current = versions(&state);
        if current == *persisted && path.exists() {
            debug!("Ledger unchanged; nothing to save");
            return Ok(());
        }

        let on_disk: LedgerState = read_json(path)?;
        if versions(&on_disk) != *persisted {
            warn!(path = %path.display(), "Ledger file changed since it was loaded");
            return Err(VaultError::Storage(format!(
                "{} was updated by another session; nothing was saved, retry the command",
                path.display()
            )));
        }

        write_json_atomic(path, &state)?;
        *persisted = current;
        Ok(())
    }

    fn source_handles(&self) -> VaultResult<Vec<(SourceId, SharedCounters)>> {
        let sources = self
            .sources
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(sources
            .iter()
            .map(|(id, c)| (id.clone(), Arc::clone(c)))
            .collect())
    }

    fn handle(&self, id: &SourceId) -> VaultResult<Option<SharedCounters>> {
        let sources = self
            .sources
            .read()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(sources.get(id).map(Arc::clone))
    }

    /// Seed or refresh counters from a provider snapshot
    ///
    /// Counters are only reseeded when the snapshot is newer than the one
    /// they were last synced from. Reservations committed after the
    /// snapshot was taken are not yet reflected in provider balances and
    /// are re-applied on top.
    pub fn sync(&self, snapshot: &Snapshot) -> VaultResult<usize> {
        let month = CalendarMonth::of(snapshot.taken_at);
        let pending: Vec<Reservation> = {
            let sets = self
                .sets
                .lock()
                .map_err(|e| VaultError::Storage(format!("Failed to lock reservation sets: {}", e)))?;
            sets.values()
                .filter(|s| !s.is_released() && s.committed_at > snapshot.taken_at)
                .flat_map(|s| s.reservations.iter().cloned())
                .collect()
        };

        let mut sources = self
            .sources
            .write()
            .map_err(|e| VaultError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let mut refreshed = 0;
        for source in &snapshot.sources {
            if let Some(existing) = sources.get(&source.id).cloned() {
                let mut current = lock_counters(&source.id, &existing)?;
                if current.synced_at.is_some_and(|at| at >= snapshot.taken_at) {
                    continue;
                }
                let version = current.version;
                *current = SourceCounters::from_source(source, month);
                current.version = version + 1;
                current.synced_at = Some(snapshot.taken_at);
                for r in pending.iter().filter(|r| r.source_id == source.id) {
                    current.apply(r);
                }
            } else {
                let mut counters = SourceCounters::from_source(source, month);
                counters.synced_at = Some(snapshot.taken_at);
                for r in pending.iter().filter(|r| r.source_id == source.id) {
                    counters.apply(r);
                }
                sources.insert(source.id.clone(), Arc::new(Mutex::new(counters)));
            }
            refreshed += 1;
        }

        debug!(refreshed, taken_at = %snapshot.taken_at, "Ledger synced from snapshot");
        Ok(refreshed)
    }

    /// Copy of a source's counters
    pub fn counters(&self, id: &SourceId) -> VaultResult<Option<SourceCounters>> {
        match self.handle(id)? {
            Some(shared) => Ok(Some(lock_counters(id, &shared)?.clone())),
            None => Ok(None),
        }
    }

    /// Re-validate and reserve every draw of `plan`, all or nothing
    ///
    /// # Errors
    ///
    /// - `NotFound` if a drawn source has no counters in the ledger
    /// - `CapacityExceeded` if any draw no longer fits the live counters;
    ///   no counter is changed in that case
    /// - `Storage` if a lock is poisoned
    pub fn commit(
        &self,
        plan: &AllocationPlan,
        validator: &CapacityValidator,
    ) -> VaultResult<ReservationSet> {
        let mut draws: BTreeMap<SourceId, Money> = BTreeMap::new();
        for entry in &plan.entries {
            *draws.entry(entry.source_id.clone()).or_default() += entry.amount;
        }

        let mut handles = Vec::with_capacity(draws.len());
        for id in draws.keys() {
            let shared = self
                .handle(id)?
                .ok_or_else(|| VaultError::source_not_found(id.as_str()))?;
            handles.push((id.clone(), shared));
        }

        // Ascending id order; BTreeMap iteration guarantees it
        let mut guards = Vec::with_capacity(handles.len());
        for (id, shared) in &handles {
            guards.push((id, lock_counters(id, shared)?));
        }

        for (id, guard) in &guards {
            let amount = draws[*id];
            if let Err(e) = validator.check_draw(id, guard, plan.month, amount) {
                warn!(plan = %plan.id, source = %id, %amount, "Commit rejected: {}", e);
                return Err(e.into_capacity_exceeded());
            }
        }

        let mut reservations = Vec::with_capacity(guards.len());
        for (id, guard) in guards.iter_mut() {
            let reservation = guard.reservation_for(id, draws[*id], plan.month);
            guard.apply(&reservation);
            reservations.push(reservation);
        }
        drop(guards);

        let set = ReservationSet::new(plan.id, plan.transaction_id, reservations);
        self.sets
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to lock reservation sets: {}", e)))?
            .insert(set.id, set.clone());

        info!(plan = %plan.id, set = %set.id, sources = set.reservations.len(), "Plan committed");
        Ok(set)
    }

    /// Reverse a reservation set exactly once
    ///
    /// The set stays locked while its counters are reversed and is only
    /// marked released once every reversal is applied, so a failed release
    /// can be retried.
    pub fn release(&self, set_id: ReservationSetId) -> VaultResult<ReleaseOutcome> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to lock reservation sets: {}", e)))?;
        let set = sets
            .get_mut(&set_id)
            .ok_or_else(|| VaultError::reservation_not_found(set_id.to_string()))?;
        if set.is_released() {
            debug!(set = %set_id, "Reservation set already released");
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        let mut reservations: Vec<&Reservation> = set.reservations.iter().collect();
        reservations.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        let mut handles = Vec::with_capacity(reservations.len());
        for reservation in reservations {
            match self.handle(&reservation.source_id)? {
                Some(shared) => handles.push((reservation, shared)),
                None => warn!(source = %reservation.source_id, "Released reservation for unknown source"),
            }
        }

        // Every counter is locked before any is touched
        let mut guards = Vec::with_capacity(handles.len());
        for (reservation, shared) in &handles {
            guards.push((*reservation, lock_counters(&reservation.source_id, shared)?));
        }
        for (reservation, guard) in guards.iter_mut() {
            guard.reverse(reservation);
        }
        drop(guards);
        drop(handles);

        set.released_at = Some(Utc::now());
        info!(set = %set_id, "Reservation set released");
        Ok(ReleaseOutcome::Released)
    }

    /// Look up a reservation set
    pub fn reservation_set(&self, set_id: ReservationSetId) -> VaultResult<Option<ReservationSet>> {
        let sets = self
            .sets
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to lock reservation sets: {}", e)))?;
        Ok(sets.get(&set_id).cloned())
    }

    /// All reservation sets, oldest first
    pub fn history(&self) -> VaultResult<Vec<ReservationSet>> {
        let sets = self
            .sets
            .lock()
            .map_err(|e| VaultError::Storage(format!("Failed to lock reservation sets: {}", e)))?;
        let mut all: Vec<_> = sets.values().cloned().collect();
        all.sort_by(|a, b| a.committed_at.cmp(&b.committed_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}
