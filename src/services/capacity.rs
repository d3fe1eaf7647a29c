//! Constraint validator
//!
//! Computes how much a funding source may absorb right now. Capacity is
//! always derived from the live reservation-ledger counters at call time,
//! never from a cached figure.

use crate::config::Preferences;
use crate::error::{VaultError, VaultResult};
use crate::models::{CalendarMonth, FundingSource, LimitKind, Money, SourceId, SourceKind};
use crate::storage::{ReservationLedger, SourceCounters};

/// Remaining capacity of a source and the limit that binds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    /// Non-negative, in the source's currency
    pub amount: Money,
    pub binding: LimitKind,
}

impl Capacity {
    fn tighten(&mut self, limit: Money, kind: LimitKind) {
        if limit < self.amount {
            self.amount = limit;
            self.binding = kind;
        }
    }
}

/// Applies floors, VRP caps, utilization ceilings and gates
#[derive(Debug, Clone, Default)]
pub struct CapacityValidator {
    default_source: Option<SourceId>,
    safety_buffer: Money,
}

impl CapacityValidator {
    pub fn new(preferences: &Preferences) -> Self {
        Self {
            default_source: preferences.default_source_id.clone(),
            safety_buffer: preferences.safety_buffer,
        }
    }

    /// Balance that must stay on an asset account
    pub fn floor_for(&self, source_id: &SourceId, counters: &SourceCounters) -> Money {
        let floor = counters.constraint.protected_floor;
        if self.default_source.as_ref() == Some(source_id) {
            floor.max(self.safety_buffer)
        } else {
            floor
        }
    }

    /// Capacity of a source given its counters for `month`
    pub fn capacity(
        &self,
        source_id: &SourceId,
        counters: &SourceCounters,
        month: CalendarMonth,
    ) -> Capacity {
        self.capacity_after_debits(source_id, counters, month, Money::zero())
    }

    /// Capacity once `pending` scheduled debits have left the source
    ///
    /// Debits lower an account's balance and raise a card's balance; VRP
    /// caps are unaffected since debits are not VRP transfers.
    pub fn capacity_after_debits(
        &self,
        source_id: &SourceId,
        counters: &SourceCounters,
        month: CalendarMonth,
        pending: Money,
    ) -> Capacity {
        let constraint = &counters.constraint;

        let gated_off = (constraint.is_vrp_gated() && !constraint.vrp_enabled)
            || (counters.kind == SourceKind::CreditCard
                && constraint.pay_in_full_only
                && counters.carries_balance);
        if gated_off {
            return Capacity {
                amount: Money::zero(),
                binding: LimitKind::GateDisabled,
            };
        }

        let mut capacity = match (&constraint.credit, counters.kind) {
            (Some(credit), SourceKind::CreditCard) => {
                let balance = counters.credit_balance + pending;
                let mut cap = Capacity {
                    amount: credit.utilization_ceiling() - balance,
                    binding: LimitKind::UtilizationCeiling,
                };
                cap.tighten(credit.credit_limit - balance, LimitKind::CreditLimit);
                cap
            }
            _ => Capacity {
                amount: counters.available_balance - pending - self.floor_for(source_id, counters),
                binding: LimitKind::ProtectedFloor,
            },
        };

        if let Some(vrp) = &constraint.vrp {
            capacity.tighten(vrp.per_transaction_max, LimitKind::PerTransactionCap);
            capacity.tighten(
                vrp.per_month_max - counters.vrp_used_in(month),
                LimitKind::MonthlyCap,
            );
        }

        capacity.amount = capacity.amount.non_negative();
        capacity
    }

    /// Fail with `ConstraintViolation` if drawing `amount` would breach a limit
    pub fn check_draw(
        &self,
        source_id: &SourceId,
        counters: &SourceCounters,
        month: CalendarMonth,
        amount: Money,
    ) -> VaultResult<()> {
        let capacity = self.capacity(source_id, counters, month);
        if amount > capacity.amount {
            return Err(VaultError::ConstraintViolation {
                source_id: source_id.clone(),
                attempted: amount,
                allowed: capacity.amount,
                limit: capacity.binding,
            });
        }
        Ok(())
    }

    /// Capacity of `source` read from the ledger's live counters
    ///
    /// Sources the ledger has never seen are evaluated from the snapshot
    /// values themselves.
    pub fn available_capacity(
        &self,
        ledger: &ReservationLedger,
        source: &FundingSource,
        month: CalendarMonth,
    ) -> VaultResult<Capacity> {
        let counters = match ledger.counters(&source.id)? {
            Some(counters) => counters,
            None => SourceCounters::from_source(source, month),
        };
        Ok(self.capacity(&source.id, &counters, month))
    }
}
