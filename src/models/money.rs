//! Money type for representing currency amounts
//!
//! Internally stores amounts in minor units (pence, cents) as i64 to avoid
//! floating-point drift when plans are split and summed. Rates are applied
//! through [`Money::scale`], which rounds once per application.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A monetary amount stored as minor units (hundredths of the currency unit)
///
/// The currency itself is carried alongside the amount by whatever owns it
/// (a transaction, a funding source, a plan entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Create a Money amount from minor units
    ///
    /// # Examples
    /// ```
    /// use optivault::models::Money;
    /// let amount = Money::from_minor(11240); // 112.40
    /// ```
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Create a Money amount from major and minor parts
    ///
    /// # Examples
    /// ```
    /// use optivault::models::Money;
    /// let amount = Money::from_major_minor(3820, 15); // 3,820.15
    /// ```
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        Self(major * 100 + minor)
    }

    /// Create a zero Money amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Get the amount in minor units
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Get the whole major units (truncated toward zero)
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Get the minor-unit remainder (0-99)
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Check if the amount is zero
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Check if the amount is positive
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Check if the amount is negative
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Get the absolute value
    pub const fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Clamp negative amounts to zero
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Self(0)
        } else {
            *self
        }
    }

    /// Amount as a floating-point number of major units
    pub fn as_major_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Multiply by a rate, rounding half away from zero to minor units
    pub fn scale(&self, rate: f64) -> Self {
        Self((self.0 as f64 * rate).round() as i64)
    }

    /// Multiply by a rate, rounding toward negative infinity
    pub fn scale_floor(&self, rate: f64) -> Self {
        Self((self.0 as f64 * rate).floor() as i64)
    }

    /// Multiply by a whole count
    pub const fn times(&self, count: i64) -> Self {
        Self(self.0 * count)
    }

    /// Parse a money amount from a string
    ///
    /// Accepts formats: "10.50", "-10.50", "£10.50", "1,850.00", "10"
    pub fn parse(s: &str) -> Result<Self, MoneyParseError> {
        let s = s.trim();

        let (negative, s) = if let Some(stripped) = s.strip_prefix('-') {
            (true, stripped)
        } else {
            (false, s)
        };

        // Strip a leading currency symbol and thousands separators
        let s = s
            .trim_start_matches(|c: char| matches!(c, '£' | '$' | '€' | '₹'))
            .replace(',', "");

        let invalid = || MoneyParseError::InvalidFormat(s.clone());
        let (major, fraction) = s.split_once('.').unwrap_or((s.as_str(), ""));
        if major.is_empty()
            || !major.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let major: i64 = major.parse().map_err(|_| invalid())?;

        // "5" is 50 pence, "05" is 5
        let minor = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse::<i64>().map_err(|_| invalid())?,
        };
        let minor = major
            .checked_mul(100)
            .and_then(|m| m.checked_add(minor))
            .ok_or_else(invalid)?;

        Ok(Self(if negative { -minor } else { minor }))
    }

    /// Format with a currency symbol
    pub fn format_with_symbol(&self, symbol: &str) -> String {
        if self.is_negative() {
            format!("-{}{}.{:02}", symbol, self.major().abs(), self.minor_part())
        } else {
            format!("{}{}.{:02}", symbol, self.major(), self.minor_part())
        }
    }

    /// Format with an explicit sign, e.g. "+£1.12" or "-£3.59"
    pub fn format_signed(&self, symbol: &str) -> String {
        if self.is_negative() {
            self.format_with_symbol(symbol)
        } else {
            format!("+{}", self.format_with_symbol(symbol))
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}.{:02}", self.major().abs(), self.minor_part())
        } else {
            write!(f, "{}.{:02}", self.major(), self.minor_part())
        }
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Error type for money parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("Invalid money format: {0}")]
    InvalidFormat(String),
}
