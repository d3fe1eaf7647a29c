//! Funding source model
//!
//! A funding source is one of the user's current accounts, savings pots,
//! credit cards or international accounts, as last reported by the data
//! provider. The engine treats it as an immutable snapshot for the duration
//! of one decision; mutable usage lives in the reservation ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::{RewardSchedule, SpendingCategory};
use super::constraint::{Constraint, ConstraintValidationError, CreditCap, VrpCap};
use super::currency::Currency;
use super::ids::SourceId;
use super::money::Money;

/// Type of funding source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    CurrentAccount,
    SavingsAccount,
    CreditCard,
    InternationalAccount,
}

impl SourceKind {
    /// Returns true for sources whose balance is money owed
    pub fn is_liability(&self) -> bool {
        matches!(self, Self::CreditCard)
    }

    /// Parse source kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "current" | "current_account" | "checking" => Some(Self::CurrentAccount),
            "savings" | "savings_account" | "isa" => Some(Self::SavingsAccount),
            "credit" | "credit_card" | "card" => Some(Self::CreditCard),
            "international" | "international_account" | "intl" => {
                Some(Self::InternationalAccount)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentAccount => write!(f, "Current Account"),
            Self::SavingsAccount => write!(f, "Savings Account"),
            Self::CreditCard => write!(f, "Credit Card"),
            Self::InternationalAccount => write!(f, "International Account"),
        }
    }
}

/// A funding source as reported by the data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingSource {
    pub id: SourceId,

    /// Display name (e.g., "Amex Gold")
    pub name: String,

    #[serde(rename = "type")]
    pub kind: SourceKind,

    #[serde(default)]
    pub currency: Currency,

    /// Available balance for asset accounts; unused for credit cards, whose
    /// owed balance lives in the credit cap
    #[serde(default)]
    pub balance: Money,

    /// Savings yield for accounts, APR for cards (0.045 = 4.5%)
    #[serde(default)]
    pub annual_interest_rate: f64,

    /// Markup charged when paying in a currency other than `currency`
    #[serde(default)]
    pub fx_markup: f64,

    /// Flat fee per draw in the source's currency, e.g. an international
    /// transfer charge
    #[serde(default, skip_serializing_if = "Money::is_zero")]
    pub transfer_fee: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<RewardSchedule>,

    /// Card currently carries a revolving balance
    #[serde(default)]
    pub carries_balance: bool,

    #[serde(default)]
    pub constraint: Constraint,
}

impl FundingSource {
    /// Create a new source with default values
    pub fn new(id: impl Into<SourceId>, name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            currency: Currency::Gbp,
            balance: Money::zero(),
            annual_interest_rate: 0.0,
            fx_markup: 0.0,
            transfer_fee: Money::zero(),
            rewards: None,
            carries_balance: false,
            constraint: Constraint::default(),
        }
    }

    /// Current account holding `balance`
    pub fn current_account(id: &str, name: &str, balance: Money) -> Self {
        Self::new(id, name, SourceKind::CurrentAccount).with_balance(balance)
    }

    /// Savings account pulled through VRP
    pub fn savings_account(id: &str, name: &str, balance: Money, annual_rate: f64, vrp: VrpCap) -> Self {
        let mut source = Self::new(id, name, SourceKind::SavingsAccount).with_balance(balance);
        source.annual_interest_rate = annual_rate;
        source.constraint = Constraint::vrp(vrp);
        source
    }

    /// Credit card with a credit cap
    pub fn credit_card(id: &str, name: &str, cap: CreditCap) -> Self {
        let mut source = Self::new(id, name, SourceKind::CreditCard);
        source.constraint = Constraint::credit(cap);
        source
    }

    pub fn with_balance(mut self, balance: Money) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_fx_markup(mut self, markup: f64) -> Self {
        self.fx_markup = markup;
        self
    }

    pub fn with_transfer_fee(mut self, fee: Money) -> Self {
        self.transfer_fee = fee;
        self
    }

    pub fn with_interest_rate(mut self, annual_rate: f64) -> Self {
        self.annual_interest_rate = annual_rate;
        self
    }

    pub fn with_rewards(mut self, rewards: RewardSchedule) -> Self {
        self.rewards = Some(rewards);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn carrying_balance(mut self, carries: bool) -> Self {
        self.carries_balance = carries;
        self
    }

    /// Effective reward rate for a category, 0 when the source has no
    /// reward schedule
    pub fn reward_rate(&self, category: SpendingCategory) -> f64 {
        self.rewards
            .as_ref()
            .map(|r| r.effective_rate(category))
            .unwrap_or(0.0)
    }

    /// Whether the source can be used for reward arbitrage at all
    pub fn is_pay_in_full_eligible(&self) -> bool {
        self.kind == SourceKind::CreditCard && !self.carries_balance
    }

    /// Validate the source
    pub fn validate(&self) -> Result<(), SourceValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(SourceValidationError::EmptyId);
        }

        if self.name.trim().is_empty() {
            return Err(SourceValidationError::EmptyName);
        }

        if !self.kind.is_liability() && self.balance.is_negative() {
            return Err(SourceValidationError::NegativeBalance(self.balance));
        }

        for (label, rate) in [
            ("annual_interest_rate", self.annual_interest_rate),
            ("fx_markup", self.fx_markup),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(SourceValidationError::InvalidRate(label));
            }
        }

        if self.transfer_fee.is_negative() {
            return Err(SourceValidationError::NegativeFee(self.transfer_fee));
        }

        if let Some(rewards) = &self.rewards {
            rewards.validate().map_err(SourceValidationError::Rewards)?;
        }

        self.constraint
            .validate(self.kind)
            .map_err(SourceValidationError::Constraint)
    }
}

impl fmt::Display for FundingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Validation errors for funding sources
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValidationError {
    EmptyId,
    EmptyName,
    NegativeBalance(Money),
    InvalidRate(&'static str),
    NegativeFee(Money),
    Rewards(String),
    Constraint(ConstraintValidationError),
}

impl fmt::Display for SourceValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "Source id cannot be empty"),
            Self::EmptyName => write!(f, "Source name cannot be empty"),
            Self::NegativeBalance(b) => write!(f, "Account balance cannot be negative: {}", b),
            Self::InvalidRate(field) => write!(f, "{} must be a non-negative number", field),
            Self::NegativeFee(fee) => write!(f, "Transfer fee cannot be negative: {}", fee),
            Self::Rewards(msg) => write!(f, "Invalid rewards: {}", msg),
            Self::Constraint(e) => write!(f, "Invalid constraint: {}", e),
        }
    }
}

impl std::error::Error for SourceValidationError {}
