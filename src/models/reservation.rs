//! Reservations against funding-source usage counters
//!
//! Committing a plan produces one reservation per touched source, grouped
//! in a [`ReservationSet`]. Releasing the set reverses every delta exactly
//! once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{PlanId, ReservationSetId, SourceId, TransactionId};
use super::money::Money;
use super::month::CalendarMonth;

/// Deltas applied to one source's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub source_id: SourceId,

    /// Amount drawn, in the source's currency
    pub amount: Money,

    /// Month the VRP usage counts against
    pub month: CalendarMonth,

    /// Decrease of the available balance (asset accounts)
    #[serde(default)]
    pub balance_delta: Money,

    /// Increase of the owed balance (credit cards)
    #[serde(default)]
    pub credit_delta: Money,

    /// Increase of VRP usage for `month`
    #[serde(default)]
    pub vrp_delta: Money,
}

/// All reservations made by one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSet {
    pub id: ReservationSetId,
    pub plan_id: PlanId,
    pub transaction_id: TransactionId,
    pub reservations: Vec<Reservation>,
    pub committed_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
}

impl ReservationSet {
    pub fn new(plan_id: PlanId, transaction_id: TransactionId, reservations: Vec<Reservation>) -> Self {
        Self {
            id: ReservationSetId::new(),
            plan_id,
            transaction_id,
            reservations,
            committed_at: Utc::now(),
            released_at: None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released_at.is_some()
    }

    /// Reservation for a given source
    pub fn for_source(&self, source_id: &SourceId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| &r.source_id == source_id)
    }
}

/// Result of a release call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Deltas were reversed by this call
    Released,
    /// An earlier call already reversed them; nothing changed
    AlreadyReleased,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_set_is_active() {
        let set = ReservationSet::new(
            PlanId::new(),
            TransactionId::new(),
            vec![Reservation {
                source_id: SourceId::new("marcus-saver"),
                amount: Money::from_minor(7900),
                month: CalendarMonth::new(2026, 3),
                balance_delta: Money::from_minor(7900),
                credit_delta: Money::zero(),
                vrp_delta: Money::from_minor(7900),
            }],
        );
        assert!(!set.is_released());
        assert!(set.for_source(&SourceId::new("marcus-saver")).is_some());
        assert!(set.for_source(&SourceId::new("amex-gold")).is_none());
    }
}
