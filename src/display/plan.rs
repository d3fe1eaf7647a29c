//! Plan display formatting
//!
//! Formats allocation plans for terminal output in table and detail views.

use crate::models::{AllocationPlan, PlanRecord, Transaction};

/// Format a plan's entries as a table with totals
pub fn format_plan(plan: &AllocationPlan, transaction: &Transaction) -> String {
    let cur = plan.currency;
    let mut output = String::new();

    output.push_str(&format!("Plan {}  {}\n", plan.id, plan.step));
    if let Some(label) = &plan.label {
        output.push_str(&format!("  {}\n", label));
    }
    output.push_str(&format!("  {}\n\n", transaction));

    let name_width = plan
        .entries
        .iter()
        .map(|e| e.source_name.len())
        .max()
        .unwrap_or(6)
        .max(6);

    output.push_str(&format!(
        "{:<name_width$}  {:>12}  {:>14}  {:>10}  {:>10}\n",
        "Source",
        "Covers",
        "Drawn",
        "Cost",
        "Reward",
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:-<name_width$}  {:->12}  {:->14}  {:->10}  {:->10}\n",
        "",
        "",
        "",
        "",
        "",
        name_width = name_width,
    ));

    for entry in &plan.entries {
        output.push_str(&format!(
            "{:<name_width$}  {:>12}  {:>14}  {:>10}  {:>10}\n",
            entry.source_name,
            cur.format(entry.covered),
            entry.source_currency.format(entry.amount),
            cur.format(entry.interest_cost + entry.fx_cost),
            cur.format(entry.reward),
            name_width = name_width,
        ));
    }

    output.push('\n');
    output.push_str(&format!(
        "Net benefit: {}",
        plan.net_benefit.format_signed(cur.symbol())
    ));
    if plan.total_points > 0 {
        output.push_str(&format!(" ({} points)", plan.total_points));
    }
    output.push('\n');

    if plan.stale {
        output.push_str(&format!(
            "Warning: computed from data {} minutes old\n",
            plan.snapshot_age_minutes
        ));
    }
    if plan.requires_confirmation {
        output.push_str("Confirmation required before commit\n");
    }

    output
}

/// Format the decision trace as a numbered list
pub fn format_trace(plan: &AllocationPlan) -> String {
    let mut output = String::from("Decision trace:\n");
    for (i, line) in plan.trace.iter().enumerate() {
        output.push_str(&format!("  {:>2}. {}\n", i + 1, line));
    }
    output
}

/// Format ranked alternatives, best first
pub fn format_plan_options(options: &[AllocationPlan]) -> String {
    if options.is_empty() {
        return "No payment options found.".to_string();
    }

    let label_width = options
        .iter()
        .map(|p| p.label.as_deref().unwrap_or("").len())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut output = String::new();
    output.push_str(&format!(
        "{:>2}  {:<13}  {:<label_width$}  {:>10}\n",
        "#",
        "Plan",
        "Option",
        "Net",
        label_width = label_width,
    ));

    for (i, plan) in options.iter().enumerate() {
        output.push_str(&format!(
            "{:>2}  {:<13}  {:<label_width$}  {:>10}\n",
            i + 1,
            plan.id.to_string(),
            plan.label.as_deref().unwrap_or(""),
            plan.net_benefit.format_signed(plan.currency.symbol()),
            label_width = label_width,
        ));
    }

    output
}

/// Format stored plans with their status
pub fn format_plan_list(records: &[PlanRecord]) -> String {
    if records.is_empty() {
        return "No plans found.".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<13}  {:<10}  {:<24}  {:>12}  {}\n",
        "Plan", "Status", "Step", "Amount", "Merchant"
    ));

    for record in records {
        output.push_str(&format!(
            "{:<13}  {:<10}  {:<24}  {:>12}  {}\n",
            record.id().to_string(),
            record.status.to_string(),
            record.plan.step.to_string(),
            record.plan.currency.format(record.plan.amount),
            record.transaction.merchant,
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, DecisionStep, Money, SpendingCategory};

    #[test]
    fn test_format_empty_options() {
        assert_eq!(format_plan_options(&[]), "No payment options found.");
    }

    #[test]
    fn test_format_plan_flags() {
        let txn = Transaction::new(
            Money::from_minor(60000),
            Currency::Gbp,
            SpendingCategory::Other,
            "Currys",
        );
        let mut plan = AllocationPlan::new(&txn, DecisionStep::ComplexAllocation, vec![], vec![]);
        plan.stale = true;
        plan.snapshot_age_minutes = 90;

        let output = format_plan(&plan, &txn);
        assert!(output.contains("Step 5 (Complex allocation)"));
        assert!(output.contains("90 minutes old"));
        assert!(output.contains("Confirmation required"));
    }
}
