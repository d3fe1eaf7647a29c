//! Per-source constraints
//!
//! Bank-enforced VRP caps, user-set utilization ceilings, protected floors
//! and on/off gates live together in one versioned struct so every rule is
//! validated in one place instead of scattered across the optimizer.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;
use super::source::SourceKind;

/// Which limit bounds (or was breached on) a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    /// Balance minus the protected floor / safety buffer
    ProtectedFloor,
    /// VRP per-transaction maximum
    PerTransactionCap,
    /// VRP calendar-month maximum minus usage
    MonthlyCap,
    /// Credit limit times the user's max utilization
    UtilizationCeiling,
    /// Hard credit limit
    CreditLimit,
    /// VRP disabled, or pay-in-full-only card carrying a balance
    GateDisabled,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ProtectedFloor => "protected balance floor",
            Self::PerTransactionCap => "VRP per-transaction cap",
            Self::MonthlyCap => "VRP monthly cap",
            Self::UtilizationCeiling => "credit utilisation ceiling",
            Self::CreditLimit => "credit limit",
            Self::GateDisabled => "source disabled",
        };
        f.write_str(label)
    }
}

/// Variable Recurring Payment caps enforced by the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrpCap {
    pub per_transaction_max: Money,
    pub per_month_max: Money,
    /// Usage reported by the provider for the current calendar month
    #[serde(default)]
    pub used_this_month: Money,
}

impl VrpCap {
    pub fn new(per_transaction_max: Money, per_month_max: Money) -> Self {
        Self {
            per_transaction_max,
            per_month_max,
            used_this_month: Money::zero(),
        }
    }

    pub fn with_used(mut self, used: Money) -> Self {
        self.used_this_month = used;
        self
    }
}

/// Credit utilization cap for a card
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditCap {
    pub credit_limit: Money,
    /// Amount currently owed
    #[serde(default)]
    pub current_balance: Money,
    /// User ceiling, 0-100
    pub max_utilization_percent: f64,
}

impl CreditCap {
    pub fn new(credit_limit: Money, current_balance: Money, max_utilization_percent: f64) -> Self {
        Self {
            credit_limit,
            current_balance,
            max_utilization_percent,
        }
    }

    /// Highest balance the user allows on this card
    pub fn utilization_ceiling(&self) -> Money {
        self.credit_limit
            .scale_floor(self.max_utilization_percent / 100.0)
            .min(self.credit_limit)
    }

    /// Utilization of a given owed balance, in percent
    pub fn utilization_percent(&self, balance: Money) -> f64 {
        if self.credit_limit.is_zero() {
            return 0.0;
        }
        balance.minor() as f64 / self.credit_limit.minor() as f64 * 100.0
    }
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// All limits and gates for one funding source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Bumped whenever the provider or user changes any rule
    #[serde(default = "default_version")]
    pub version: u32,

    /// VRP caps; present only on VRP-gated sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrp: Option<VrpCap>,

    /// Credit utilization cap; present only on credit cards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<CreditCap>,

    /// Balance below which the source may never be drawn
    #[serde(default)]
    pub protected_floor: Money,

    /// User toggle for VRP pulls from this source
    #[serde(default = "default_true")]
    pub vrp_enabled: bool,

    /// Card may only be used while no revolving balance is carried
    #[serde(default)]
    pub pay_in_full_only: bool,
}

impl Default for Constraint {
    fn default() -> Self {
        Self {
            version: default_version(),
            vrp: None,
            credit: None,
            protected_floor: Money::zero(),
            vrp_enabled: true,
            pay_in_full_only: false,
        }
    }
}

impl Constraint {
    /// Constraint for a VRP-gated account
    pub fn vrp(cap: VrpCap) -> Self {
        Self {
            vrp: Some(cap),
            ..Self::default()
        }
    }

    /// Constraint for a credit card
    pub fn credit(cap: CreditCap) -> Self {
        Self {
            credit: Some(cap),
            ..Self::default()
        }
    }

    pub fn with_floor(mut self, floor: Money) -> Self {
        self.protected_floor = floor;
        self
    }

    pub fn with_vrp_enabled(mut self, enabled: bool) -> Self {
        self.vrp_enabled = enabled;
        self
    }

    pub fn with_pay_in_full_only(mut self, pay_in_full_only: bool) -> Self {
        self.pay_in_full_only = pay_in_full_only;
        self
    }

    /// Whether pulls from this source go through VRP
    pub fn is_vrp_gated(&self) -> bool {
        self.vrp.is_some()
    }

    /// Validate the constraint against the kind of source it guards
    pub fn validate(&self, kind: SourceKind) -> Result<(), ConstraintValidationError> {
        if self.protected_floor.is_negative() {
            return Err(ConstraintValidationError::NegativeFloor);
        }

        if let Some(vrp) = &self.vrp {
            if vrp.per_transaction_max.is_negative() || vrp.per_month_max.is_negative() {
                return Err(ConstraintValidationError::NegativeCap);
            }
            if vrp.used_this_month.is_negative() || vrp.used_this_month > vrp.per_month_max {
                return Err(ConstraintValidationError::MonthlyUsageOverCap {
                    used: vrp.used_this_month,
                    max: vrp.per_month_max,
                });
            }
        }

        match (kind, &self.credit) {
            (SourceKind::CreditCard, None) => Err(ConstraintValidationError::MissingCreditCap),
            (SourceKind::CreditCard, Some(credit)) => {
                if credit.credit_limit.is_negative() || credit.current_balance.is_negative() {
                    return Err(ConstraintValidationError::NegativeCap);
                }
                if credit.current_balance > credit.credit_limit {
                    return Err(ConstraintValidationError::BalanceOverLimit {
                        balance: credit.current_balance,
                        limit: credit.credit_limit,
                    });
                }
                if !(credit.max_utilization_percent > 0.0
                    && credit.max_utilization_percent <= 100.0)
                {
                    return Err(ConstraintValidationError::InvalidUtilization(
                        credit.max_utilization_percent,
                    ));
                }
                Ok(())
            }
            (_, Some(_)) => Err(ConstraintValidationError::UnexpectedCreditCap),
            (_, None) => Ok(()),
        }
    }
}

/// Validation errors for constraints
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintValidationError {
    NegativeFloor,
    NegativeCap,
    MonthlyUsageOverCap { used: Money, max: Money },
    BalanceOverLimit { balance: Money, limit: Money },
    InvalidUtilization(f64),
    MissingCreditCap,
    UnexpectedCreditCap,
}

impl fmt::Display for ConstraintValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeFloor => write!(f, "Protected floor cannot be negative"),
            Self::NegativeCap => write!(f, "Limits cannot be negative"),
            Self::MonthlyUsageOverCap { used, max } => {
                write!(f, "VRP usage {} exceeds monthly cap {}", used, max)
            }
            Self::BalanceOverLimit { balance, limit } => {
                write!(f, "Card balance {} exceeds credit limit {}", balance, limit)
            }
            Self::InvalidUtilization(pct) => {
                write!(f, "Max utilization must be in (0, 100], got {}", pct)
            }
            Self::MissingCreditCap => write!(f, "Credit card has no credit cap"),
            Self::UnexpectedCreditCap => write!(f, "Only credit cards may carry a credit cap"),
        }
    }
}

impl std::error::Error for ConstraintValidationError {}
