//! Transaction model
//!
//! A purchase submitted to the engine. Immutable once submitted.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::SpendingCategory;
use super::currency::Currency;
use super::ids::TransactionId;
use super::money::Money;

/// A purchase to be funded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,

    /// Amount in `currency`, always positive
    pub amount: Money,

    #[serde(default)]
    pub currency: Currency,

    #[serde(default)]
    pub category: SpendingCategory,

    #[serde(default)]
    pub merchant: String,

    /// Merchant is located abroad
    #[serde(default)]
    pub international: bool,

    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction stamped with the current time
    pub fn new(
        amount: Money,
        currency: Currency,
        category: SpendingCategory,
        merchant: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            amount,
            currency,
            category,
            merchant: merchant.into(),
            international: false,
            timestamp: Utc::now(),
        }
    }

    /// Set the submission time
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mark the merchant as international
    pub fn international(mut self) -> Self {
        self.international = true;
        self
    }

    /// Whether the transaction is billed in a currency other than `home`
    pub fn is_foreign_currency(&self, home: Currency) -> bool {
        self.currency != home
    }

    /// Calendar month the transaction falls in
    pub fn month(&self) -> super::month::CalendarMonth {
        super::month::CalendarMonth::new(self.timestamp.year(), self.timestamp.month())
    }

    /// Validate the transaction
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if !self.amount.is_positive() {
            return Err(TransactionValidationError::NonPositiveAmount(self.amount));
        }
        if self.merchant.len() > 200 {
            return Err(TransactionValidationError::MerchantTooLong(self.merchant.len()));
        }
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {} ({})",
            self.currency.format(self.amount),
            self.currency,
            if self.merchant.is_empty() { "unknown merchant" } else { &self.merchant },
            self.category
        )
    }
}

/// Validation errors for transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    NonPositiveAmount(Money),
    MerchantTooLong(usize),
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPositiveAmount(a) => write!(f, "Transaction amount must be positive, got {}", a),
            Self::MerchantTooLong(len) => {
                write!(f, "Merchant name too long ({} chars, max 200)", len)
            }
        }
    }
}

impl std::error::Error for TransactionValidationError {}
