//! Scheduled obligations (direct debits, standing orders)
//!
//! Fed by the data provider and consulted by the overdraft look-ahead.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SourceId;
use super::money::Money;

/// An upcoming payment already scheduled against a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledObligation {
    pub source_id: SourceId,

    /// Amount in the source's currency
    pub amount: Money,

    pub due_at: DateTime<Utc>,

    /// Payee label (e.g., "Council tax")
    #[serde(default)]
    pub name: String,
}

impl ScheduledObligation {
    pub fn new(
        source_id: impl Into<SourceId>,
        amount: Money,
        due_at: DateTime<Utc>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            amount,
            due_at,
            name: name.into(),
        }
    }

    /// Whether the obligation falls due within `[from, from + hours]`
    pub fn is_due_within(&self, from: DateTime<Utc>, hours: u32) -> bool {
        self.due_at >= from && self.due_at <= from + Duration::hours(i64::from(hours))
    }
}

/// Total due against `source_id` within the look-ahead window
pub fn due_within(
    obligations: &[ScheduledObligation],
    source_id: &SourceId,
    from: DateTime<Utc>,
    hours: u32,
) -> Money {
    obligations
        .iter()
        .filter(|o| &o.source_id == source_id && o.is_due_within(from, hours))
        .map(|o| o.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_due_within_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let obligations = vec![
            ScheduledObligation::new("santander", Money::from_minor(14900), now + Duration::hours(20), "Council tax"),
            ScheduledObligation::new("santander", Money::from_minor(8000), now + Duration::hours(28), "Energy"),
            ScheduledObligation::new("santander", Money::from_minor(5000), now + Duration::hours(29), "Gym"),
            ScheduledObligation::new("monzo", Money::from_minor(1000), now + Duration::hours(1), "Phone"),
            ScheduledObligation::new("santander", Money::from_minor(999), now - Duration::hours(1), "Past"),
        ];

        let due = due_within(&obligations, &SourceId::new("santander"), now, 28);
        assert_eq!(due, Money::from_minor(22900));
    }
}
