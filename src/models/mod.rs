//! Core data models for OptiVault
//!
//! This module contains the data structures of the payment allocation
//! domain: funding sources and their constraints, transactions, plans and
//! reservations.

pub mod category;
pub mod constraint;
pub mod currency;
pub mod ids;
pub mod money;
pub mod month;
pub mod obligation;
pub mod plan;
pub mod reservation;
pub mod source;
pub mod transaction;

pub use category::{RewardKind, RewardSchedule, SpendingCategory};
pub use constraint::{Constraint, ConstraintValidationError, CreditCap, LimitKind, VrpCap};
pub use currency::{Currency, FxTable};
pub use ids::{PlanId, ReservationSetId, SourceId, TransactionId};
pub use money::{Money, MoneyParseError};
pub use month::CalendarMonth;
pub use obligation::ScheduledObligation;
pub use plan::{AllocationPlan, DecisionStep, PlanEntry, PlanRecord, PlanStatus};
pub use reservation::{ReleaseOutcome, Reservation, ReservationSet};
pub use source::{FundingSource, SourceKind, SourceValidationError};
pub use transaction::{Transaction, TransactionValidationError};
