//! Allocation plan model
//!
//! A plan is the optimizer's answer for one transaction: which sources pay
//! how much, what that costs or earns, and which decision step produced it.
//! All accounting amounts (costs, rewards, net benefit) are denominated in
//! the transaction's currency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::currency::Currency;
use super::ids::{PlanId, ReservationSetId, SourceId, TransactionId};
use super::money::Money;
use super::month::CalendarMonth;
use super::transaction::Transaction;

/// The optimizer step that produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStep {
    PassThrough,
    RewardsArbitrage,
    FxOptimisation,
    OverdraftAvoidance,
    ComplexAllocation,
}

impl DecisionStep {
    /// Step number, 1-5
    pub fn number(&self) -> u8 {
        match self {
            Self::PassThrough => 1,
            Self::RewardsArbitrage => 2,
            Self::FxOptimisation => 3,
            Self::OverdraftAvoidance => 4,
            Self::ComplexAllocation => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PassThrough => "Pass-through",
            Self::RewardsArbitrage => "Rewards arbitrage",
            Self::FxOptimisation => "FX optimisation",
            Self::OverdraftAvoidance => "Overdraft avoidance",
            Self::ComplexAllocation => "Complex allocation",
        }
    }
}

impl fmt::Display for DecisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {} ({})", self.number(), self.label())
    }
}

/// One source's share of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub source_id: SourceId,
    pub source_name: String,
    pub source_currency: Currency,

    /// Portion of the transaction covered, in transaction currency
    pub covered: Money,

    /// Amount drawn from the source, in the source's currency
    pub amount: Money,

    pub interest_cost: Money,
    pub fx_cost: Money,
    pub reward: Money,

    #[serde(default)]
    pub points: u64,

    pub cost_per_pound: f64,
}

impl PlanEntry {
    /// Reward minus costs for this entry
    pub fn net(&self) -> Money {
        self.reward - self.interest_cost - self.fx_cost
    }
}

/// A funding plan for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub id: PlanId,
    pub transaction_id: TransactionId,

    /// Transaction currency; every accounting total is in this currency
    pub currency: Currency,

    /// Transaction amount
    pub amount: Money,

    pub entries: Vec<PlanEntry>,
    pub step: DecisionStep,

    pub total_reward: Money,
    pub total_interest_cost: Money,
    pub total_fx_cost: Money,
    pub net_benefit: Money,

    #[serde(default)]
    pub total_points: u64,

    /// Plan must be confirmed by the user before commit
    pub requires_confirmation: bool,

    /// Computed from a snapshot older than the freshness threshold
    #[serde(default)]
    pub stale: bool,

    /// Age of the snapshot the plan was computed from
    #[serde(default)]
    pub snapshot_age_minutes: i64,

    /// Strategy label for ranked alternatives (e.g. "Split across A + B")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Step-by-step decision trace
    #[serde(default)]
    pub trace: Vec<String>,

    /// Calendar month the reservations will count against
    pub month: CalendarMonth,

    pub created_at: DateTime<Utc>,
}

impl AllocationPlan {
    /// Build a plan from entries, summing the rounded entry values
    pub fn new(
        transaction: &Transaction,
        step: DecisionStep,
        entries: Vec<PlanEntry>,
        trace: Vec<String>,
    ) -> Self {
        let total_reward: Money = entries.iter().map(|e| e.reward).sum();
        let total_interest_cost: Money = entries.iter().map(|e| e.interest_cost).sum();
        let total_fx_cost: Money = entries.iter().map(|e| e.fx_cost).sum();
        let total_points = entries.iter().map(|e| e.points).sum();

        Self {
            id: PlanId::new(),
            transaction_id: transaction.id,
            currency: transaction.currency,
            amount: transaction.amount,
            entries,
            step,
            total_reward,
            total_interest_cost,
            total_fx_cost,
            net_benefit: total_reward - total_interest_cost - total_fx_cost,
            total_points,
            requires_confirmation: step == DecisionStep::ComplexAllocation,
            stale: false,
            snapshot_age_minutes: 0,
            label: None,
            trace,
            month: transaction.month(),
            created_at: Utc::now(),
        }
    }

    /// Sum of covered amounts, in transaction currency
    pub fn covered(&self) -> Money {
        self.entries.iter().map(|e| e.covered).sum()
    }

    /// Amount not yet covered
    pub fn shortfall(&self) -> Money {
        (self.amount - self.covered()).non_negative()
    }

    pub fn is_fully_covered(&self) -> bool {
        self.covered() == self.amount
    }

    /// Plan draws on more than one source
    pub fn is_split(&self) -> bool {
        self.entries.len() > 1
    }

    /// Entry for a given source, if the plan draws on it
    pub fn entry_for(&self, source_id: &SourceId) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| &e.source_id == source_id)
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &SourceId> {
        self.entries.iter().map(|e| &e.source_id)
    }

    /// Whether the plan may be committed without user confirmation
    pub fn is_auto_committable(&self) -> bool {
        !self.requires_confirmation && !self.stale
    }

    /// Same step and the same draws on the same sources, ignoring ids and
    /// timestamps
    pub fn same_allocation(&self, other: &AllocationPlan) -> bool {
        self.step == other.step
            && self.entries.len() == other.entries.len()
            && self.entries.iter().zip(&other.entries).all(|(a, b)| {
                a.source_id == b.source_id && a.covered == b.covered && a.amount == b.amount
            })
    }

    /// Same draws regardless of order or step
    pub fn same_split(&self, other: &AllocationPlan) -> bool {
        let key = |plan: &AllocationPlan| {
            let mut draws: Vec<(SourceId, Money)> = plan
                .entries
                .iter()
                .map(|e| (e.source_id.clone(), e.covered))
                .collect();
            draws.sort();
            draws
        };
        key(self) == key(other)
    }
}

impl fmt::Display for AllocationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.entries.iter().map(|e| e.source_name.as_str()).collect();
        write!(
            f,
            "{} via {} [{}], net {}",
            self.currency.format(self.amount),
            sources.join(" + "),
            self.step,
            self.net_benefit.format_signed(self.currency.symbol())
        )
    }
}

/// Lifecycle of a stored plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Computed, not yet committed
    Pending,
    /// User accepted a plan that required confirmation
    Confirmed,
    /// Claimed by a commit that has not finished yet
    Committing,
    /// Reservations were made
    Committed,
    /// Reservations were reversed after commit
    Released,
    /// Discarded before commit
    Cancelled,
    /// Another plan for the same transaction was committed
    Superseded,
}

impl PlanStatus {
    /// Plan can still be committed
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Committing => write!(f, "being committed"),
            Self::Committed => write!(f, "committed"),
            Self::Released => write!(f, "released"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}

/// A plan together with the transaction it answers and its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub plan: AllocationPlan,
    pub transaction: Transaction,
    pub status: PlanStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_set: Option<ReservationSetId>,

    pub updated_at: DateTime<Utc>,
}

impl PlanRecord {
    pub fn new(plan: AllocationPlan, transaction: Transaction) -> Self {
        Self {
            plan,
            transaction,
            status: PlanStatus::Pending,
            reservation_set: None,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> PlanId {
        self.plan.id
    }

    /// Move to a new status, stamping the update time
    pub fn set_status(&mut self, status: PlanStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
