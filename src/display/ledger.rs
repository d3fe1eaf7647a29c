//! Reservation ledger display formatting

use crate::models::ReservationSet;

/// Format one reservation set with its per-source deltas
pub fn format_reservation_set(set: &ReservationSet) -> String {
    let mut output = String::new();

    output.push_str(&format!("Reservation set {}\n", set.id));
    output.push_str(&format!("  Plan:           {}\n", set.plan_id));
    output.push_str(&format!("  Transaction:    {}\n", set.transaction_id));
    output.push_str(&format!(
        "  Committed:      {}\n",
        set.committed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    match set.released_at {
        Some(at) => output.push_str(&format!(
            "  Released:       {}\n",
            at.format("%Y-%m-%d %H:%M:%S UTC")
        )),
        None => output.push_str("  Released:       no\n"),
    }

    output.push('\n');
    for r in &set.reservations {
        let mut deltas = Vec::new();
        if !r.balance_delta.is_zero() {
            deltas.push(format!("balance -{}", r.balance_delta));
        }
        if !r.credit_delta.is_zero() {
            deltas.push(format!("owed +{}", r.credit_delta));
        }
        if !r.vrp_delta.is_zero() {
            deltas.push(format!("VRP {} +{}", r.month, r.vrp_delta));
        }
        output.push_str(&format!(
            "  {:<16} {:>12}  {}\n",
            r.source_id.as_str(),
            r.amount.to_string(),
            deltas.join(", ")
        ));
    }

    output
}

/// Format the ledger history, oldest first
pub fn format_ledger_history(sets: &[ReservationSet]) -> String {
    if sets.is_empty() {
        return "No reservations recorded.".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<13}  {:<19}  {:<9}  {}\n",
        "Set", "Plan", "Committed", "Status", "Sources"
    ));

    for set in sets {
        let sources = set
            .reservations
            .iter()
            .map(|r| format!("{} {}", r.source_id, r.amount))
            .collect::<Vec<_>>()
            .join(", ");
        output.push_str(&format!(
            "{:<12}  {:<13}  {:<19}  {:<9}  {}\n",
            set.id.to_string(),
            set.plan_id.to_string(),
            set.committed_at.format("%Y-%m-%d %H:%M").to_string(),
            if set.is_released() { "released" } else { "active" },
            sources
        ));
    }

    let active = sets.iter().filter(|s| !s.is_released()).count();
    output.push_str(&format!(
        "\n{} reservation set(s), {} active\n",
        sets.len(),
        active
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history() {
        assert_eq!(format_ledger_history(&[]), "No reservations recorded.");
    }
}
