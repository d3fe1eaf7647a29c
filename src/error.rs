//! Custom error types for OptiVault
//!
//! This module defines the error hierarchy for the engine using thiserror
//! for ergonomic error definitions. Money-affecting failures carry enough
//! structure (source id, amount attempted, limit breached) for a caller to
//! render an actionable message.

use thiserror::Error;

use crate::models::{AllocationPlan, LimitKind, Money, PlanId, SourceId};

/// The main error type for OptiVault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// No combination of sources covers the full amount
    #[error("Insufficient funds: short by {shortfall} after covering {covered}")]
    InsufficientFunds {
        shortfall: Money,
        covered: Money,
        partial: Box<AllocationPlan>,
    },

    /// Commit-time conflict with a concurrently updated counter
    #[error("Capacity exceeded on {source_id}: attempted {attempted}, available {available} ({limit})")]
    CapacityExceeded {
        source_id: SourceId,
        attempted: Money,
        available: Money,
        limit: LimitKind,
    },

    /// A draw would breach a floor, cap or disabled gate
    #[error("Constraint violation on {source_id}: attempted {attempted}, allowed {allowed} ({limit})")]
    ConstraintViolation {
        source_id: SourceId,
        attempted: Money,
        allowed: Money,
        limit: LimitKind,
    },

    /// Funding-source data is older than the freshness threshold
    #[error("Snapshot is {age_minutes} minutes old (threshold {threshold_minutes}); manual confirmation required")]
    StaleSnapshot {
        age_minutes: i64,
        threshold_minutes: i64,
    },

    /// Plan must be confirmed by the user before it can be committed
    #[error("Plan {0} requires confirmation before commit")]
    ConfirmationRequired(PlanId),

    /// The engine or one of its collaborators cannot be reached
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Plan is not in a state that allows the requested operation
    #[error("Plan {plan_id} is {state}")]
    PlanState { plan_id: PlanId, state: String },

    /// Import errors
    #[error("Import error: {0}")]
    Import(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl VaultError {
    /// Create a "not found" error for funding sources
    pub fn source_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Funding source",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for plans
    pub fn plan_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Plan",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for reservation sets
    pub fn reservation_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Reservation set",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a commit-time capacity conflict
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }

    /// Check if this is an insufficient-funds outcome
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::InsufficientFunds { .. })
    }

    /// Check if the plan was not in a state allowing the operation
    pub fn is_plan_state(&self) -> bool {
        matches!(self, Self::PlanState { .. })
    }

    /// Turn an internal constraint violation into the commit-time conflict
    /// surfaced to callers
    pub fn into_capacity_exceeded(self) -> Self {
        match self {
            Self::ConstraintViolation {
                source_id,
                attempted,
                allowed,
                limit,
            } => Self::CapacityExceeded {
                source_id,
                attempted,
                available: allowed,
                limit,
            },
            other => other,
        }
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for OptiVault operations
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_not_found_error() {
        let err = VaultError::source_not_found("amex-gold");
        assert_eq!(err.to_string(), "Funding source not found: amex-gold");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_capacity_exceeded_error() {
        let err = VaultError::CapacityExceeded {
            source_id: SourceId::new("marcus-saver"),
            attempted: Money::from_minor(60000),
            available: Money::from_minor(50000),
            limit: LimitKind::PerTransactionCap,
        };
        assert_eq!(
            err.to_string(),
            "Capacity exceeded on marcus-saver: attempted 600.00, available 500.00 (VRP per-transaction cap)"
        );
        assert!(err.is_capacity_exceeded());
    }

    #[test]
    fn test_violation_converts_to_capacity_exceeded() {
        let err = VaultError::ConstraintViolation {
            source_id: SourceId::new("amex-gold"),
            attempted: Money::from_minor(100),
            allowed: Money::zero(),
            limit: LimitKind::GateDisabled,
        };
        match err.into_capacity_exceeded() {
            VaultError::CapacityExceeded {
                available, limit, ..
            } => {
                assert_eq!(available, Money::zero());
                assert_eq!(limit, LimitKind::GateDisabled);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let vault_err: VaultError = io_err.into();
        assert!(matches!(vault_err, VaultError::Io(_)));
    }
}
