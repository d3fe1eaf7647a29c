//! Funding source display formatting
//!
//! Formats funding sources and their live capacity in table and detail
//! views.

use crate::models::{FundingSource, RewardKind};
use crate::services::SourceCapacity;
use crate::storage::SourceCounters;

/// Format sources with their live capacity as a table
pub fn format_source_list(rows: &[SourceCapacity]) -> String {
    if rows.is_empty() {
        return "No funding sources found.".to_string();
    }

    // Calculate column widths
    let id_width = rows
        .iter()
        .map(|r| r.source.id.as_str().len())
        .max()
        .unwrap_or(2)
        .max(2);

    let name_width = rows
        .iter()
        .map(|r| r.source.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<id_width$}  {:<name_width$}  {:<21}  {:>14}  {:>14}  {}\n",
        "ID",
        "Name",
        "Type",
        "Balance",
        "Available",
        "Limited by",
        id_width = id_width,
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:-<id_width$}  {:-<name_width$}  {:-<21}  {:->14}  {:->14}  {:-<10}\n",
        "",
        "",
        "",
        "",
        "",
        "",
        id_width = id_width,
        name_width = name_width,
    ));

    for row in rows {
        let source = &row.source;
        output.push_str(&format!(
            "{:<id_width$}  {:<name_width$}  {:<21}  {:>14}  {:>14}  {}\n",
            source.id.as_str(),
            source.name,
            source.kind.to_string(),
            source.currency.format(source.balance),
            source.currency.format(row.capacity.amount),
            row.capacity.binding,
            id_width = id_width,
            name_width = name_width,
        ));
    }

    output
}

/// Format a single source's terms and live counters
pub fn format_source_details(source: &FundingSource, counters: Option<&SourceCounters>) -> String {
    let cur = source.currency;
    let mut output = String::new();

    output.push_str(&format!("Source: {}\n", source.name));
    output.push_str(&format!("  ID:             {}\n", source.id));
    output.push_str(&format!("  Type:           {}\n", source.kind));
    output.push_str(&format!("  Currency:       {}\n", cur));
    output.push_str(&format!("  Balance:        {}\n", cur.format(source.balance)));

    if source.annual_interest_rate > 0.0 {
        output.push_str(&format!(
            "  Interest:       {:.2}% a year\n",
            source.annual_interest_rate * 100.0
        ));
    }
    if source.fx_markup > 0.0 {
        output.push_str(&format!("  FX markup:      {:.2}%\n", source.fx_markup * 100.0));
    }
    if let Some(rewards) = &source.rewards {
        let kind = match rewards.kind {
            RewardKind::Cashback => "cashback".to_string(),
            RewardKind::Points { point_value } => {
                format!("points worth {}{:.3} each", cur.symbol(), point_value)
            }
        };
        let rates = rewards
            .rates
            .iter()
            .map(|(category, rate)| format!("{} {}", category, rate))
            .collect::<Vec<_>>()
            .join(", ");
        output.push_str(&format!("  Rewards:        {} ({})\n", kind, rates));
    }

    let constraint = &source.constraint;
    if constraint.protected_floor.is_positive() {
        output.push_str(&format!(
            "  Floor:          {}\n",
            cur.format(constraint.protected_floor)
        ));
    }
    if let Some(vrp) = &constraint.vrp {
        output.push_str(&format!(
            "  VRP:            {} per payment, {} a month{}\n",
            cur.format(vrp.per_transaction_max),
            cur.format(vrp.per_month_max),
            if constraint.vrp_enabled { "" } else { " (disabled)" }
        ));
    }
    if let Some(credit) = &constraint.credit {
        output.push_str(&format!(
            "  Credit limit:   {} (max {:.0}% utilisation)\n",
            cur.format(credit.credit_limit),
            credit.max_utilization_percent
        ));
    }
    if constraint.pay_in_full_only {
        output.push_str("  Pay in full:    required for reward routing\n");
    }

    if let Some(counters) = counters {
        output.push_str("\nLive counters:\n");
        if source.kind.is_liability() {
            output.push_str(&format!(
                "  Owed:           {}\n",
                cur.format(counters.credit_balance)
            ));
        } else {
            output.push_str(&format!(
                "  Available:      {}\n",
                cur.format(counters.available_balance)
            ));
        }
        for (month, used) in &counters.vrp_used {
            output.push_str(&format!("  VRP used {}: {}\n", month, cur.format(*used)));
        }
        output.push_str(&format!("  Version:        {}\n", counters.version));
    }

    output
}
