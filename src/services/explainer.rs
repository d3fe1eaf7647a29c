//! Decision explainer
//!
//! Turns a plan into the human-readable rationale shown next to it. Pure:
//! reads the plan, the transaction and the source list, never the ledger.

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::VaultResult;
use crate::models::{
    AllocationPlan, DecisionStep, FundingSource, Money, PlanEntry, SourceId, SourceKind,
    Transaction,
};

use super::cost::CostModel;

/// Why one source was used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRationale {
    pub source_id: SourceId,
    pub source_name: String,
    pub covered: Money,
    pub cost_per_pound: f64,
    pub line: String,
}

/// The plan against paying everything from the default source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source_id: Option<SourceId>,
    pub default_net: Money,
    pub plan_net: Money,
    /// `plan_net - default_net`
    pub delta: Money,
    pub summary: String,
}

/// Everything needed to render a plan's rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub headline: String,
    pub earn_label: String,
    pub per_source: Vec<SourceRationale>,
    pub comparison: Comparison,
    /// Comparison delta repeated at the category's yearly frequency
    pub annual_projection: Money,
    pub annual_frequency: u32,
    #[serde(default)]
    pub utilisation: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_nudge: Option<String>,
    pub steps: Vec<String>,
}

fn percent(p: f64) -> String {
    let rounded = (p * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}%", rounded)
    } else {
        format!("{:.1}%", rounded)
    }
}

fn joined_names(entries: &[PlanEntry]) -> String {
    entries
        .iter()
        .map(|e| e.source_name.as_str())
        .collect::<Vec<_>>()
        .join(" + ")
}

pub struct Explainer<'a> {
    settings: &'a Settings,
    cost: CostModel<'a>,
}

impl<'a> Explainer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            cost: CostModel::new(&settings.fx_rates, settings.rate_policy),
        }
    }

    pub fn explain(
        &self,
        plan: &AllocationPlan,
        transaction: &Transaction,
        sources: &[FundingSource],
    ) -> VaultResult<Explanation> {
        let comparison = self.compare(plan, transaction, sources)?;
        let annual_frequency = self.settings.frequency_for(transaction.category);

        Ok(Explanation {
            headline: self.headline(plan),
            earn_label: self.earn_label(plan),
            per_source: plan
                .entries
                .iter()
                .map(|e| self.rationale(plan, e))
                .collect(),
            annual_projection: comparison.delta.times(annual_frequency as i64),
            annual_frequency,
            comparison,
            utilisation: self.utilisation(plan, sources),
            savings_nudge: self.savings_nudge(plan, sources),
            steps: plan.trace.clone(),
        })
    }

    fn headline(&self, plan: &AllocationPlan) -> String {
        if let Some(label) = &plan.label {
            return label.clone();
        }
        match (plan.step, plan.entries.as_slice()) {
            (_, []) => "No source can fund this purchase".to_string(),
            (DecisionStep::PassThrough, [only]) => format!("Pay from {}", only.source_name),
            (_, [only]) => format!("Pay with {}", only.source_name),
            (DecisionStep::OverdraftAvoidance, entries) => format!(
                "Split across {} to protect {}",
                joined_names(entries),
                entries[0].source_name
            ),
            (_, entries) => format!("Split across {}", joined_names(entries)),
        }
    }

    fn earn_label(&self, plan: &AllocationPlan) -> String {
        let symbol = plan.currency.symbol();
        if plan.total_points > 0 {
            format!(
                "Earn {} points (≈ {})",
                plan.total_points,
                plan.total_reward.format_with_symbol(symbol)
            )
        } else if plan.total_reward.is_positive() {
            format!("Earn {} cashback", plan.total_reward.format_with_symbol(symbol))
        } else {
            "No rewards on this route".to_string()
        }
    }

    fn rationale(&self, plan: &AllocationPlan, entry: &PlanEntry) -> SourceRationale {
        let symbol = plan.currency.symbol();
        let sign = if entry.cost_per_pound < 0.0 { "-" } else { "" };
        let mut parts = Vec::new();
        if entry.reward.is_positive() {
            parts.push(format!("reward {}", entry.reward.format_with_symbol(symbol)));
        }
        if entry.interest_cost.is_positive() {
            parts.push(format!("interest {}", entry.interest_cost.format_with_symbol(symbol)));
        }
        if entry.fx_cost.is_positive() {
            parts.push(format!("FX {}", entry.fx_cost.format_with_symbol(symbol)));
        }

        let mut line = format!(
            "{} cost: {}{}{:.3} per {}1, covers {}",
            entry.source_name,
            sign,
            symbol,
            entry.cost_per_pound.abs(),
            symbol,
            entry.covered.format_with_symbol(symbol)
        );
        if entry.source_currency != plan.currency {
            line.push_str(&format!(
                " ({} from the {} balance)",
                entry.source_currency.format(entry.amount),
                entry.source_currency
            ));
        }
        if !parts.is_empty() {
            line.push_str(&format!(": {}", parts.join(", ")));
        }

        SourceRationale {
            source_id: entry.source_id.clone(),
            source_name: entry.source_name.clone(),
            covered: entry.covered,
            cost_per_pound: entry.cost_per_pound,
            line,
        }
    }

    fn compare(
        &self,
        plan: &AllocationPlan,
        transaction: &Transaction,
        sources: &[FundingSource],
    ) -> VaultResult<Comparison> {
        let symbol = plan.currency.symbol();
        let default = self
            .settings
            .preferences
            .default_source_id
            .as_ref()
            .and_then(|id| sources.iter().find(|s| &s.id == id));

        let Some(default) = default else {
            return Ok(Comparison {
                default_source_id: None,
                default_net: Money::zero(),
                plan_net: plan.net_benefit,
                delta: plan.net_benefit,
                summary: format!(
                    "Net {} (no default source to compare against)",
                    plan.net_benefit.format_signed(symbol)
                ),
            });
        };

        let default_net = self
            .cost
            .breakdown(default, transaction, transaction.amount)?
            .net();
        let delta = plan.net_benefit - default_net;
        let summary = if delta.is_positive() {
            format!(
                "You're {} better off than paying from {}",
                delta.format_with_symbol(symbol),
                default.name
            )
        } else if delta.is_negative() {
            format!(
                "Costs {} more than paying from {}",
                delta.abs().format_with_symbol(symbol),
                default.name
            )
        } else {
            format!("Same outcome as paying from {}", default.name)
        };

        Ok(Comparison {
            default_source_id: Some(default.id.clone()),
            default_net,
            plan_net: plan.net_benefit,
            delta,
            summary,
        })
    }

    /// Before/after utilisation for every card the plan draws on
    fn utilisation(&self, plan: &AllocationPlan, sources: &[FundingSource]) -> Vec<String> {
        plan.entries
            .iter()
            .filter_map(|entry| {
                let source = sources.iter().find(|s| s.id == entry.source_id)?;
                let credit = source.constraint.credit.as_ref()?;
                let before = credit.utilization_percent(credit.current_balance);
                let after = credit.utilization_percent(credit.current_balance + entry.amount);
                let verdict = if after <= credit.max_utilization_percent {
                    format!("under {} limit ✓", percent(credit.max_utilization_percent))
                } else {
                    format!("over {} limit ✗", percent(credit.max_utilization_percent))
                };
                Some(format!(
                    "{} utilisation: {} → {} ({})",
                    source.name,
                    percent(before),
                    percent(after),
                    verdict
                ))
            })
            .collect()
    }

    /// Interest savings keep earning while spend goes on a card
    fn savings_nudge(&self, plan: &AllocationPlan, sources: &[FundingSource]) -> Option<String> {
        if plan.step != DecisionStep::RewardsArbitrage {
            return None;
        }
        let monthly: Money = sources
            .iter()
            .filter(|s| s.kind == SourceKind::SavingsAccount)
            .map(|s| s.balance.scale(s.annual_interest_rate / 12.0))
            .sum();
        monthly.is_positive().then(|| {
            format!(
                "Your savings keep earning {}/mo while this goes on credit",
                self.settings.home_currency.format(monthly)
            )
        })
    }
}
