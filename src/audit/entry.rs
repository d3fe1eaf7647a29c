//! Audit entry data structures
//!
//! Defines the structure of audit log entries including operation types,
//! entity types, and the entry format itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AllocationPlan, PlanRecord, ReservationSet};

/// Types of operations that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A plan was computed
    Plan,
    /// The user accepted a plan
    Confirm,
    /// Reservations were made
    Commit,
    /// Reservations were reversed
    Release,
    /// An uncommitted plan was discarded
    Cancel,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Plan => write!(f, "PLAN"),
            Operation::Confirm => write!(f, "CONFIRM"),
            Operation::Commit => write!(f, "COMMIT"),
            Operation::Release => write!(f, "RELEASE"),
            Operation::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// Types of entities that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Plan,
    ReservationSet,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Plan => write!(f, "Plan"),
            EntityType::ReservationSet => write!(f, "ReservationSet"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the operation occurred (UTC)
    pub timestamp: DateTime<Utc>,

    pub operation: Operation,
    pub entity_type: EntityType,
    pub entity_id: String,

    /// One-line description of what happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// JSON representation of the entity after the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AuditEntry {
    /// Create an entry with a JSON payload
    pub fn new<T: Serialize>(
        operation: Operation,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        summary: Option<String>,
        details: &T,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            entity_type,
            entity_id: entity_id.into(),
            summary,
            details: serde_json::to_value(details).ok(),
        }
    }

    /// A plan was computed
    pub fn plan_created(plan: &AllocationPlan) -> Self {
        Self::new(
            Operation::Plan,
            EntityType::Plan,
            plan.id.to_string(),
            Some(plan.to_string()),
            plan,
        )
    }

    /// A stored plan changed status without touching the ledger
    pub fn plan_status(operation: Operation, record: &PlanRecord) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            entity_type: EntityType::Plan,
            entity_id: record.id().to_string(),
            summary: Some(format!("{} is now {}", record.plan, record.status)),
            details: None,
        }
    }

    /// A plan was committed as `set`
    pub fn committed(set: &ReservationSet, plan: &AllocationPlan) -> Self {
        Self::new(
            Operation::Commit,
            EntityType::ReservationSet,
            set.id.to_string(),
            Some(format!("{} for {}", plan, plan.id)),
            set,
        )
    }

    /// A reservation set was reversed
    pub fn released(set: &ReservationSet) -> Self {
        Self::new(
            Operation::Release,
            EntityType::ReservationSet,
            set.id.to_string(),
            Some(format!(
                "Released {} reservation(s) for {}",
                set.reservations.len(),
                set.plan_id
            )),
            set,
        )
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.operation,
            self.entity_type,
            self.entity_id
        );

        if let Some(summary) = &self.summary {
            output.push_str(&format!(": {}", summary));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Currency, DecisionStep, Money, PlanId, PlanStatus, SpendingCategory, Transaction,
        TransactionId,
    };

    fn plan() -> (AllocationPlan, Transaction) {
        let txn = Transaction::new(
            Money::from_minor(450),
            Currency::Gbp,
            SpendingCategory::Dining,
            "Pret",
        );
        let plan = AllocationPlan::new(&txn, DecisionStep::PassThrough, vec![], vec![]);
        (plan, txn)
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Plan.to_string(), "PLAN");
        assert_eq!(Operation::Commit.to_string(), "COMMIT");
        assert_eq!(Operation::Release.to_string(), "RELEASE");
    }

    #[test]
    fn test_plan_created_entry() {
        let (plan, _) = plan();
        let entry = AuditEntry::plan_created(&plan);

        assert_eq!(entry.operation, Operation::Plan);
        assert_eq!(entry.entity_type, EntityType::Plan);
        assert_eq!(entry.entity_id, plan.id.to_string());
        assert!(entry.details.is_some());
    }

    #[test]
    fn test_status_entry() {
        let (plan, txn) = plan();
        let mut record = PlanRecord::new(plan, txn);
        record.set_status(PlanStatus::Cancelled);

        let entry = AuditEntry::plan_status(Operation::Cancel, &record);
        assert!(entry.summary.unwrap().ends_with("is now cancelled"));
        assert!(entry.details.is_none());
    }

    #[test]
    fn test_release_entry() {
        let set = ReservationSet::new(PlanId::new(), TransactionId::new(), vec![]);
        let entry = AuditEntry::released(&set);

        assert_eq!(entry.entity_type, EntityType::ReservationSet);
        assert!(entry.format_human_readable().contains("RELEASE ReservationSet rsv-"));
    }

    #[test]
    fn test_serialization() {
        let (plan, _) = plan();
        let entry = AuditEntry::plan_created(&plan);

        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: AuditEntry = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.operation, Operation::Plan);
        assert_eq!(deserialized.entity_type, EntityType::Plan);
    }
}
