//! Explanation display formatting

use crate::services::Explanation;

/// Format a plan rationale for the terminal
pub fn format_explanation(explanation: &Explanation, currency_symbol: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", explanation.headline));
    output.push_str(&format!("  {}\n\n", explanation.earn_label));

    for source in &explanation.per_source {
        output.push_str(&format!("  • {}\n", source.line));
    }

    output.push('\n');
    output.push_str(&format!("{}\n", explanation.comparison.summary));
    if !explanation.annual_projection.is_zero() {
        output.push_str(&format!(
            "  Over a year ({} purchases like this): {}\n",
            explanation.annual_frequency,
            explanation.annual_projection.format_signed(currency_symbol)
        ));
    }

    if !explanation.utilisation.is_empty() {
        output.push('\n');
        for line in &explanation.utilisation {
            output.push_str(&format!("  {}\n", line));
        }
    }

    if let Some(nudge) = &explanation.savings_nudge {
        output.push_str(&format!("\n{}\n", nudge));
    }

    if !explanation.steps.is_empty() {
        output.push_str("\nHow this was decided:\n");
        for step in &explanation.steps {
            output.push_str(&format!("  - {}\n", step));
        }
    }

    output
}
