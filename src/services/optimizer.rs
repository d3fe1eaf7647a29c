//! Allocation optimizer
//!
//! Evaluates five fallback tiers in order and stops at the first one whose
//! preconditions hold:
//!
//! 1. Pass-through: the default source covers the purchase at no cost and
//!    no reward is forgone.
//! 2. Rewards arbitrage: a pay-in-full card with a category reward covers
//!    the whole purchase at negative cost.
//! 3. FX optimisation: foreign-currency spend is filled greedily from the
//!    cheapest sources.
//! 4. Overdraft avoidance: a guard over plans 1-3 that moves part of a
//!    default-source draw elsewhere when scheduled debits would push the
//!    default balance under the safety buffer.
//! 5. Complex allocation: greedy fill across every source; the plan needs
//!    user confirmation.
//!
//! The search is greedy, not globally optimal. Each tier maps to one line
//! of explanation the user can follow.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{VaultError, VaultResult};
use crate::models::{
    obligation, AllocationPlan, DecisionStep, FundingSource, Money, PlanEntry,
    ScheduledObligation, SourceId, SourceKind, Transaction,
};
use crate::storage::{ReservationLedger, SourceCounters};

use super::capacity::{Capacity, CapacityValidator};
use super::cost::CostModel;

/// Everything one decision reads
#[derive(Clone, Copy)]
pub struct AllocationRequest<'a> {
    pub transaction: &'a Transaction,
    pub sources: &'a [FundingSource],
    pub obligations: &'a [ScheduledObligation],
    pub ledger: &'a ReservationLedger,
}

/// A source evaluated for one transaction
#[derive(Debug, Clone)]
pub struct Candidate<'s> {
    pub source: &'s FundingSource,
    pub counters: SourceCounters,
    pub cost_per_pound: f64,
    /// Source currency
    pub capacity: Capacity,
    /// Capacity expressed in transaction currency
    pub covered_capacity: Money,
}

fn pct(rate: f64) -> String {
    format!("{:.3}%", rate * 100.0)
}

/// Step 1-5 allocation state machine
pub struct Optimizer<'a> {
    settings: &'a Settings,
    cost: CostModel<'a>,
    validator: CapacityValidator,
}

impl<'a> Optimizer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            cost: CostModel::new(&settings.fx_rates, settings.rate_policy),
            validator: CapacityValidator::new(&settings.preferences),
        }
    }

    pub fn cost_model(&self) -> &CostModel<'a> {
        &self.cost
    }

    pub fn validator(&self) -> &CapacityValidator {
        &self.validator
    }

    fn is_zero_cost(&self, cost: f64) -> bool {
        cost.abs() <= self.settings.cost_epsilon
    }

    fn is_default(&self, id: &SourceId) -> bool {
        self.settings.preferences.is_default(id)
    }

    /// Evaluate every valid source and rank by cost, then larger capacity,
    /// then smaller id
    ///
    /// Costs tie when they lie within `cost_epsilon` of the cheapest cost in
    /// their group, so ties never chain across a wide range. Scheduled debits
    /// due within the look-ahead window come off every source except the
    /// default, whose debits the overdraft guard handles.
    pub fn rank<'s>(&self, request: &AllocationRequest<'s>) -> VaultResult<Vec<Candidate<'s>>> {
        let transaction = request.transaction;
        let month = transaction.month();
        let mut ordered: Vec<&'s FundingSource> = request.sources.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut candidates = Vec::with_capacity(ordered.len());
        for source in ordered {
            if let Err(e) = source.validate() {
                debug!(source = %source.id, "Skipping invalid source: {}", e);
                continue;
            }
            let counters = match request.ledger.counters(&source.id)? {
                Some(counters) => counters,
                None => SourceCounters::from_source(source, month),
            };
            let pending = if self.is_default(&source.id) {
                Money::zero()
            } else {
                self.due_within(request, &source.id)
            };
            let capacity =
                self.validator
                    .capacity_after_debits(&source.id, &counters, month, pending);
            let covered_capacity = self.cost.fx().max_covered(
                capacity.amount,
                source.currency,
                transaction.currency,
            )?;
            candidates.push(Candidate {
                source,
                counters,
                cost_per_pound: self.cost.cost_per_pound(source, transaction)?,
                capacity,
                covered_capacity,
            });
        }

        candidates.sort_by(|a, b| {
            a.cost_per_pound
                .total_cmp(&b.cost_per_pound)
                .then(a.source.id.cmp(&b.source.id))
        });
        let eps = self.settings.cost_epsilon.max(0.0);
        let mut start = 0;
        while start < candidates.len() {
            let leader = candidates[start].cost_per_pound;
            let end = candidates[start..]
                .iter()
                .position(|c| c.cost_per_pound - leader > eps)
                .map_or(candidates.len(), |offset| start + offset);
            candidates[start..end].sort_by(|a, b| {
                b.covered_capacity
                    .cmp(&a.covered_capacity)
                    .then(a.source.id.cmp(&b.source.id))
            });
            start = end;
        }
        Ok(candidates)
    }

    fn ranking_line(&self, candidates: &[Candidate<'_>]) -> String {
        let ranked: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} {}", c.source.name, pct(c.cost_per_pound)))
            .collect();
        format!("Ranked by cost per unit: {}", ranked.join(", "))
    }

    /// Best-ranked source eligible for reward arbitrage
    fn rewards_candidate<'c, 's>(
        &self,
        transaction: &Transaction,
        candidates: &'c [Candidate<'s>],
    ) -> Option<&'c Candidate<'s>> {
        if !self.settings.preferences.allows_reward_routing() {
            return None;
        }
        candidates.iter().find(|c| {
            c.source.rewards.is_some()
                && c.source.is_pay_in_full_eligible()
                && c.cost_per_pound < -self.settings.cost_epsilon
                && c.covered_capacity >= transaction.amount
        })
    }

    fn single(
        &self,
        transaction: &Transaction,
        candidate: &Candidate<'_>,
        step: DecisionStep,
        trace: Vec<String>,
    ) -> VaultResult<AllocationPlan> {
        let entry = self.cost.entry(candidate.source, transaction, transaction.amount)?;
        Ok(AllocationPlan::new(transaction, step, vec![entry], trace))
    }

    /// Greedily cover the transaction from `candidates` in order, each up to
    /// its entry in `caps` (transaction currency)
    ///
    /// Draws that would breach a constraint exclude the source instead of
    /// failing the whole plan.
    fn fill(
        &self,
        transaction: &Transaction,
        candidates: &[Candidate<'_>],
        caps: &[Money],
        trace: &mut Vec<String>,
    ) -> VaultResult<(Vec<PlanEntry>, Money)> {
        let month = transaction.month();
        let mut remaining = transaction.amount;
        let mut entries = Vec::new();

        for (candidate, cap) in candidates.iter().zip(caps) {
            if remaining.is_zero() {
                break;
            }
            if !cap.is_positive() {
                continue;
            }
            let take = remaining.min(*cap);
            let entry = self.cost.entry(candidate.source, transaction, take)?;

            match self
                .validator
                .check_draw(&candidate.source.id, &candidate.counters, month, entry.amount)
            {
                Ok(()) => {}
                Err(e @ VaultError::ConstraintViolation { .. }) => {
                    debug!(source = %candidate.source.id, "Excluded from fill: {}", e);
                    trace.push(format!("{} excluded: {}", candidate.source.name, e));
                    continue;
                }
                Err(e) => return Err(e),
            }

            trace.push(format!(
                "Take {} from {} ({} per unit)",
                transaction.currency.format(take),
                candidate.source.name,
                pct(candidate.cost_per_pound)
            ));
            remaining -= take;
            entries.push(entry);
        }

        Ok((entries, remaining))
    }

    /// Scheduled debits due on `id` within the look-ahead window
    fn due_within(&self, request: &AllocationRequest<'_>, id: &SourceId) -> Money {
        obligation::due_within(
            request.obligations,
            id,
            request.transaction.timestamp,
            self.settings.preferences.look_ahead_hours,
        )
    }

    /// Capacities for Step 5: the default source keeps back what scheduled
    /// debits will take
    fn reserved_caps(
        &self,
        request: &AllocationRequest<'_>,
        candidates: &[Candidate<'_>],
    ) -> VaultResult<Vec<Money>> {
        let protect = self.settings.preferences.overdraft_protection;
        candidates
            .iter()
            .map(|c| {
                if protect && self.is_default(&c.source.id) {
                    let due = self.due_within(request, &c.source.id);
                    self.cost.fx().max_covered(
                        (c.capacity.amount - due).non_negative(),
                        c.source.currency,
                        request.transaction.currency,
                    )
                } else {
                    Ok(c.covered_capacity)
                }
            })
            .collect()
    }

    /// Produce a plan for one transaction
    ///
    /// # Errors
    ///
    /// - `Validation` if the transaction itself is malformed
    /// - `InsufficientFunds` if every source together cannot cover the
    ///   amount; the error carries the best partial plan
    /// - `Config` if a needed FX rate is missing from the rate table
    /// - `Storage` if the ledger's counters cannot be read
    pub fn optimize(&self, request: AllocationRequest<'_>) -> VaultResult<AllocationPlan> {
        let txn = request.transaction;
        txn.validate()
            .map_err(|e| VaultError::Validation(e.to_string()))?;

        let candidates = self.rank(&request)?;
        let mut trace = vec![self.ranking_line(&candidates)];
        let prefs = &self.settings.preferences;

        let default = prefs
            .default_source_id
            .as_ref()
            .and_then(|id| candidates.iter().find(|c| &c.source.id == id));
        let rewards = self.rewards_candidate(txn, &candidates);

        // Step 1
        match default {
            Some(d)
                if d.covered_capacity >= txn.amount
                    && self.is_zero_cost(d.cost_per_pound)
                    && d.source.reward_rate(txn.category) == 0.0
                    && rewards.is_none() =>
            {
                trace.push(format!(
                    "Step 1 (Pass-through): {} covers {} at no cost",
                    d.source.name,
                    txn.currency.format(txn.amount)
                ));
                let plan = self.single(txn, d, DecisionStep::PassThrough, trace.clone())?;
                if let Some(plan) = self.guard_overdraft(&request, &candidates, plan, &mut trace)? {
                    return Ok(self.finish(plan));
                }
            }
            Some(d) => {
                let reason = if d.covered_capacity < txn.amount {
                    format!(
                        "only {} available ({})",
                        txn.currency.format(d.covered_capacity),
                        d.capacity.binding
                    )
                } else if !self.is_zero_cost(d.cost_per_pound) {
                    format!("costs {} per unit", pct(d.cost_per_pound))
                } else if let Some(r) = rewards {
                    format!("{} earns a reward on {}", r.source.name, txn.category)
                } else {
                    "it earns a reward itself".to_string()
                };
                trace.push(format!(
                    "Step 1 (Pass-through): skipped, {} {}",
                    d.source.name, reason
                ));
            }
            None => trace.push("Step 1 (Pass-through): skipped, no default source".into()),
        }

        // Step 2
        match rewards {
            Some(card) => {
                trace.push(format!(
                    "Step 2 (Rewards arbitrage): {} earns {} on {}",
                    card.source.name,
                    pct(card.source.reward_rate(txn.category)),
                    txn.category
                ));
                let plan =
                    self.single(txn, card, DecisionStep::RewardsArbitrage, trace.clone())?;
                if let Some(plan) = self.guard_overdraft(&request, &candidates, plan, &mut trace)? {
                    return Ok(self.finish(plan));
                }
            }
            None if !prefs.allows_reward_routing() => trace.push(
                "Step 2 (Rewards arbitrage): skipped, reward routing not enabled".into(),
            ),
            None => trace.push(
                "Step 2 (Rewards arbitrage): skipped, no reward source can take the full amount"
                    .into(),
            ),
        }

        // Step 3
        if txn.is_foreign_currency(self.settings.home_currency) {
            let mut step_trace = trace.clone();
            step_trace.push(format!(
                "Step 3 (FX optimisation): {} purchase, filling from cheapest sources",
                txn.currency
            ));
            let caps: Vec<Money> = candidates.iter().map(|c| c.covered_capacity).collect();
            let (entries, remaining) = self.fill(txn, &candidates, &caps, &mut step_trace)?;
            if remaining.is_zero() {
                let plan =
                    AllocationPlan::new(txn, DecisionStep::FxOptimisation, entries, step_trace);
                if let Some(plan) = self.guard_overdraft(&request, &candidates, plan, &mut trace)? {
                    return Ok(self.finish(plan));
                }
            } else {
                trace.push(format!(
                    "Step 3 (FX optimisation): short by {}",
                    txn.currency.format(remaining)
                ));
            }
        } else {
            trace.push(format!(
                "Step 3 (FX optimisation): skipped, purchase is in {}",
                self.settings.home_currency
            ));
        }

        debug!(transaction = %txn.id, "Falling through to complex allocation");
        self.complex(&request, &candidates, trace)
    }

    /// Step 4: keep the default source above the safety buffer after
    /// scheduled debits; `None` means the shortfall could not be moved
    fn guard_overdraft(
        &self,
        request: &AllocationRequest<'_>,
        candidates: &[Candidate<'_>],
        plan: AllocationPlan,
        fallback: &mut Vec<String>,
    ) -> VaultResult<Option<AllocationPlan>> {
        let prefs = &self.settings.preferences;
        let txn = request.transaction;
        if !prefs.overdraft_protection {
            return Ok(Some(plan));
        }
        let Some(default_id) = prefs.default_source_id.as_ref() else {
            return Ok(Some(plan));
        };
        let (Some(drawn), Some(default)) = (
            plan.entry_for(default_id).cloned(),
            candidates.iter().find(|c| &c.source.id == default_id),
        ) else {
            return Ok(Some(plan));
        };

        let symbol = default.source.currency;
        let due = self.due_within(request, default_id);
        let balance = default.counters.available_balance;
        let projected = balance - drawn.amount - due;
        if projected >= prefs.safety_buffer {
            let mut plan = plan;
            if due.is_positive() {
                plan.trace.push(format!(
                    "Step 4 (Overdraft avoidance): {} stays at {} after {} of scheduled debits",
                    default.source.name,
                    symbol.format(projected),
                    symbol.format(due)
                ));
            }
            return Ok(Some(plan));
        }

        let allowed = (balance - due - prefs.safety_buffer).non_negative();
        let keep = self
            .cost
            .fx()
            .max_covered(allowed, default.source.currency, txn.currency)?
            .min(drawn.covered);
        let shift = drawn.covered - keep;

        let mut trace = plan.trace.clone();
        trace.push(format!(
            "Step 4 (Overdraft avoidance): {} would fall to {} with {} due within {}h; moving {}",
            default.source.name,
            symbol.format(projected),
            symbol.format(due),
            prefs.look_ahead_hours,
            txn.currency.format(shift)
        ));

        let mut remaining = shift;
        let mut additions: BTreeMap<SourceId, Money> = BTreeMap::new();
        let mut order: Vec<&FundingSource> = Vec::new();
        for alt in candidates.iter().filter(|c| {
            &c.source.id != default_id
                && matches!(
                    c.source.kind,
                    SourceKind::CurrentAccount | SourceKind::SavingsAccount
                )
                && c.counters.constraint.is_vrp_gated()
                && c.counters.constraint.vrp_enabled
        }) {
            if remaining.is_zero() {
                break;
            }
            let already = plan
                .entry_for(&alt.source.id)
                .map(|e| e.covered)
                .unwrap_or_default();
            let room = (alt.covered_capacity - already).non_negative();
            if room.is_zero() {
                continue;
            }
            let take = remaining.min(room);
            trace.push(format!(
                "Pull {} from {} via VRP ({} per unit, {} available)",
                txn.currency.format(take),
                alt.source.name,
                pct(alt.cost_per_pound),
                txn.currency.format(room)
            ));
            additions.insert(alt.source.id.clone(), take);
            order.push(alt.source);
            remaining -= take;
        }

        if remaining.is_positive() {
            fallback.push(format!(
                "Step 4 (Overdraft avoidance): {} would fall to {}, VRP sources short by {}",
                default.source.name,
                symbol.format(projected),
                txn.currency.format(remaining)
            ));
            debug!(shortfall = %remaining, "Overdraft guard could not move shortfall");
            return Ok(None);
        }

        let mut entries = Vec::with_capacity(plan.entries.len() + order.len());
        for entry in &plan.entries {
            let covered = if &entry.source_id == default_id {
                keep
            } else {
                entry.covered + additions.remove(&entry.source_id).unwrap_or_default()
            };
            if covered.is_positive() {
                let source = candidates
                    .iter()
                    .find(|c| c.source.id == entry.source_id)
                    .map(|c| c.source)
                    .ok_or_else(|| VaultError::source_not_found(entry.source_id.as_str()))?;
                entries.push(self.cost.entry(source, txn, covered)?);
            }
        }
        for source in order {
            if let Some(covered) = additions.remove(&source.id) {
                entries.push(self.cost.entry(source, txn, covered)?);
            }
        }

        Ok(Some(AllocationPlan::new(
            txn,
            DecisionStep::OverdraftAvoidance,
            entries,
            trace,
        )))
    }

    /// Step 5: greedy fill across every ranked source
    fn complex(
        &self,
        request: &AllocationRequest<'_>,
        candidates: &[Candidate<'_>],
        mut trace: Vec<String>,
    ) -> VaultResult<AllocationPlan> {
        let txn = request.transaction;
        trace.push("Step 5 (Complex allocation): splitting across ranked sources".into());
        let caps = self.reserved_caps(request, candidates)?;
        let (entries, remaining) = self.fill(txn, candidates, &caps, &mut trace)?;
        let plan = AllocationPlan::new(txn, DecisionStep::ComplexAllocation, entries, trace);

        if remaining.is_positive() {
            info!(
                transaction = %txn.id,
                shortfall = %remaining,
                "Insufficient funds across all sources"
            );
            return Err(VaultError::InsufficientFunds {
                shortfall: remaining,
                covered: plan.covered(),
                partial: Box::new(plan),
            });
        }
        Ok(self.finish(plan))
    }

    fn finish(&self, plan: AllocationPlan) -> AllocationPlan {
        info!(
            plan = %plan.id,
            step = plan.step.number(),
            sources = plan.entries.len(),
            net = %plan.net_benefit,
            "Plan computed"
        );
        plan
    }

    /// Ranked alternatives for the user to choose from: every source able
    /// to pay alone, plus the cheapest split
    pub fn optimize_multi(&self, request: AllocationRequest<'_>) -> VaultResult<Vec<AllocationPlan>> {
        let txn = request.transaction;
        txn.validate()
            .map_err(|e| VaultError::Validation(e.to_string()))?;

        let candidates = self.rank(&request)?;
        let caps = self.reserved_caps(&request, &candidates)?;
        let ranking = self.ranking_line(&candidates);

        let mut options: Vec<AllocationPlan> = Vec::new();
        for (candidate, cap) in candidates.iter().zip(&caps) {
            if *cap < txn.amount {
                continue;
            }
            let trace = vec![
                ranking.clone(),
                format!(
                    "Option: {} covers {} alone ({} per unit)",
                    candidate.source.name,
                    txn.currency.format(txn.amount),
                    pct(candidate.cost_per_pound)
                ),
            ];
            let mut plan = self.single(txn, candidate, DecisionStep::ComplexAllocation, trace)?;
            plan.label = Some(format!("Pay with {}", candidate.source.name));
            options.push(plan);
        }

        let mut trace = vec![ranking, "Option: cheapest split".to_string()];
        let (entries, remaining) = self.fill(txn, &candidates, &caps, &mut trace)?;
        let split = AllocationPlan::new(txn, DecisionStep::ComplexAllocation, entries, trace);
        if remaining.is_positive() {
            if options.is_empty() {
                return Err(VaultError::InsufficientFunds {
                    shortfall: remaining,
                    covered: split.covered(),
                    partial: Box::new(split),
                });
            }
        } else if !options.iter().any(|o| o.same_split(&split)) {
            let names: Vec<&str> = split.entries.iter().map(|e| e.source_name.as_str()).collect();
            let label = format!("Split across {}", names.join(" + "));
            let mut split = split;
            split.label = Some(label);
            options.push(split);
        }

        options.sort_by(|a, b| {
            b.net_benefit
                .cmp(&a.net_benefit)
                .then(a.entries.len().cmp(&b.entries.len()))
                .then_with(|| a.entries[0].source_id.cmp(&b.entries[0].source_id))
        });
        for plan in &mut options {
            plan.requires_confirmation = true;
        }

        info!(transaction = %txn.id, options = options.len(), "Strategies computed");
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preferences;
    use crate::models::{
        Constraint, CreditCap, Currency, RewardSchedule, SpendingCategory, VrpCap,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn gbp(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    fn settings() -> Settings {
        Settings {
            preferences: Preferences::default().with_default_source("santander"),
            ..Settings::default()
        }
    }

    fn txn(amount: i64, category: SpendingCategory) -> Transaction {
        Transaction::new(gbp(amount), Currency::Gbp, category, "Merchant")
            .at(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
    }

    fn santander(balance: i64) -> FundingSource {
        FundingSource::current_account("santander", "Santander", gbp(balance)).with_fx_markup(0.0399)
    }

    fn amex() -> FundingSource {
        FundingSource::credit_card(
            "amex-gold",
            "Amex Gold",
            CreditCap::new(gbp(800000), gbp(240000), 90.0),
        )
        .with_rewards(RewardSchedule::cashback([(SpendingCategory::Grocery, 0.01)]))
    }

    fn saver(per_txn: i64) -> FundingSource {
        FundingSource::savings_account(
            "marcus-saver",
            "Marcus Saver",
            gbp(420000),
            0.04,
            VrpCap::new(gbp(per_txn), gbp(300000)),
        )
    }

    fn request<'a>(
        t: &'a Transaction,
        sources: &'a [FundingSource],
        obligations: &'a [ScheduledObligation],
        ledger: &'a ReservationLedger,
    ) -> AllocationRequest<'a> {
        AllocationRequest {
            transaction: t,
            sources,
            obligations,
            ledger,
        }
    }

    #[test]
    fn test_rank_ties_prefer_capacity_then_id() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![
            FundingSource::current_account("b-small", "B", gbp(1000)),
            FundingSource::current_account("a-small", "A", gbp(1000)),
            FundingSource::current_account("c-large", "C", gbp(5000)),
        ];
        let t = txn(500, SpendingCategory::Other);
        let ranked = opt.rank(&request(&t, &sources, &[], &ledger)).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.source.id.as_str()).collect();
        assert_eq!(ids, vec!["c-large", "a-small", "b-small"]);
    }

    #[test]
    fn test_rank_ties_measured_from_cheapest_in_group() {
        let mut s = settings();
        s.cost_epsilon = 0.001;
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let card = |id: &str, limit: i64, rate: f64| {
            FundingSource::credit_card(id, id, CreditCap::new(gbp(limit), gbp(0), 100.0))
                .with_rewards(RewardSchedule::cashback([(SpendingCategory::Other, rate)]))
        };
        let sources = vec![
            card("a-wide", 500000, 0.0104),
            card("b-narrow", 100000, 0.0106),
            card("c-widest", 900000, 0.0085),
        ];
        let t = txn(500, SpendingCategory::Other);

        let ranked = opt.rank(&request(&t, &sources, &[], &ledger)).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.source.id.as_str()).collect();
        assert_eq!(ids, vec!["a-wide", "b-narrow", "c-widest"]);
    }

    #[test]
    fn test_card_debits_due_reduce_card_headroom() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let card = FundingSource::credit_card(
            "amex-gold",
            "Amex Gold",
            CreditCap::new(gbp(100000), gbp(0), 90.0),
        )
        .with_rewards(RewardSchedule::cashback([(SpendingCategory::Grocery, 0.01)]));
        let sources = vec![santander(50000), card];
        let t = txn(80000, SpendingCategory::Grocery);
        let obligations = vec![ScheduledObligation::new(
            "amex-gold",
            gbp(30000),
            t.timestamp + Duration::hours(10),
            "Gym membership",
        )];

        let plan = opt
            .optimize(request(&t, &sources, &obligations, &ledger))
            .unwrap();
        assert_eq!(plan.step, DecisionStep::ComplexAllocation);
        assert_eq!(plan.entry_for(&SourceId::new("amex-gold")).unwrap().covered, gbp(60000));
        assert_eq!(plan.entry_for(&SourceId::new("santander")).unwrap().covered, gbp(20000));

        // Without the debit the card takes the whole purchase
        let plan = opt.optimize(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(plan.step, DecisionStep::RewardsArbitrage);
    }

    #[test]
    fn test_step1_pass_through() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(382015), amex()];
        let t = txn(450, SpendingCategory::Dining);

        let plan = opt.optimize(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(plan.step, DecisionStep::PassThrough);
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].source_id.as_str(), "santander");
        assert_eq!(plan.net_benefit, Money::zero());
        assert!(plan.is_auto_committable());
    }

    #[test]
    fn test_step2_rewards_arbitrage() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(382015), amex()];
        let t = txn(11240, SpendingCategory::Grocery);

        let plan = opt.optimize(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(plan.step, DecisionStep::RewardsArbitrage);
        assert_eq!(plan.entries[0].source_id.as_str(), "amex-gold");
        assert_eq!(plan.net_benefit, gbp(112));
    }

    #[test]
    fn test_reward_routing_off_falls_back_to_default() {
        let mut s = settings();
        s.preferences.reward_routing = false;
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(382015), amex()];
        let t = txn(11240, SpendingCategory::Grocery);

        let plan = opt.optimize(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(plan.step, DecisionStep::PassThrough);
    }

    #[test]
    fn test_card_carrying_balance_not_used_for_rewards() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(382015), amex().carrying_balance(true)];
        let t = txn(11240, SpendingCategory::Grocery);

        let plan = opt.optimize(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(plan.step, DecisionStep::PassThrough);
        assert_eq!(plan.entries[0].source_id.as_str(), "santander");
    }

    #[test]
    fn test_step3_fx_split_when_cheapest_is_short() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        // 0% FX card with only 50.00 GBP of headroom
        let card = FundingSource::credit_card(
            "capital-one",
            "Capital One",
            CreditCap::new(gbp(100000), gbp(45000), 50.0),
        );
        let sources = vec![santander(382015), card];
        let t = Transaction::new(gbp(8999), Currency::Usd, SpendingCategory::OnlineShopping, "Steam")
            .at(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());

        let plan = opt.optimize(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(plan.step, DecisionStep::FxOptimisation);
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].source_id.as_str(), "capital-one");
        assert!(plan.entries[0].amount <= gbp(5000));
        assert_eq!(plan.covered(), t.amount);
    }

    #[test]
    fn test_step4_moves_shortfall_to_vrp_source() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(200000), saver(100000)];
        let t = txn(185000, SpendingCategory::Rent);
        let obligations = vec![ScheduledObligation::new(
            "santander",
            gbp(22900),
            t.timestamp + Duration::hours(20),
            "Direct debits",
        )];

        let plan = opt
            .optimize(request(&t, &sources, &obligations, &ledger))
            .unwrap();
        assert_eq!(plan.step, DecisionStep::OverdraftAvoidance);
        assert_eq!(plan.entry_for(&SourceId::new("santander")).unwrap().covered, gbp(177100));
        assert_eq!(plan.entry_for(&SourceId::new("marcus-saver")).unwrap().covered, gbp(7900));
        assert_eq!(plan.covered(), t.amount);
        assert!(!plan.requires_confirmation);
    }

    #[test]
    fn test_step4_respects_per_transaction_cap_then_falls_through() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        // Saver can move only 50.00 per transaction, shortfall is 79.00
        let lloyds = FundingSource::current_account("lloyds", "Lloyds", gbp(68030));
        let sources = vec![santander(200000), saver(5000), lloyds];
        let t = txn(185000, SpendingCategory::Rent);
        let obligations = vec![ScheduledObligation::new(
            "santander",
            gbp(22900),
            t.timestamp + Duration::hours(20),
            "Direct debits",
        )];

        let plan = opt
            .optimize(request(&t, &sources, &obligations, &ledger))
            .unwrap();
        assert_eq!(plan.step, DecisionStep::ComplexAllocation);
        assert!(plan.requires_confirmation);
        assert_eq!(plan.covered(), t.amount);
        // Default keeps back the scheduled debits
        assert_eq!(plan.entry_for(&SourceId::new("santander")).unwrap().covered, gbp(177100));
    }

    #[test]
    fn test_obligations_outside_window_ignored() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(200000), saver(100000)];
        let t = txn(185000, SpendingCategory::Rent);
        let obligations = vec![ScheduledObligation::new(
            "santander",
            gbp(22900),
            t.timestamp + Duration::hours(30),
            "Direct debits",
        )];

        let plan = opt
            .optimize(request(&t, &sources, &obligations, &ledger))
            .unwrap();
        assert_eq!(plan.step, DecisionStep::PassThrough);
    }

    #[test]
    fn test_insufficient_funds_returns_partial() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(10000), saver(5000)];
        let t = txn(50000, SpendingCategory::Other);

        match opt.optimize(request(&t, &sources, &[], &ledger)) {
            Err(VaultError::InsufficientFunds {
                shortfall,
                covered,
                partial,
            }) => {
                assert_eq!(covered, gbp(15000));
                assert_eq!(shortfall, gbp(35000));
                assert_eq!(partial.covered(), covered);
            }
            other => panic!("unexpected: {:?}", other.map(|p| p.step)),
        }
    }

    #[test]
    fn test_gated_source_is_excluded() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let mut isa = saver(100000);
        isa.constraint = Constraint::vrp(VrpCap::new(gbp(100000), gbp(300000))).with_vrp_enabled(false);
        let sources = vec![santander(10000), isa];
        let t = txn(20000, SpendingCategory::Other);

        assert!(opt
            .optimize(request(&t, &sources, &[], &ledger))
            .unwrap_err()
            .is_insufficient_funds());
    }

    #[test]
    fn test_invalid_transaction_rejected() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let t = txn(0, SpendingCategory::Other);
        assert!(opt
            .optimize(request(&t, &[], &[], &ledger))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_optimize_is_deterministic() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![amex(), santander(30000), saver(100000)];
        let t = txn(60000, SpendingCategory::Other);

        let a = opt.optimize(request(&t, &sources, &[], &ledger)).unwrap();
        let mut reversed = sources.clone();
        reversed.reverse();
        let b = opt.optimize(request(&t, &reversed, &[], &ledger)).unwrap();
        assert!(a.same_allocation(&b));
        assert_eq!(a.trace, b.trace);
    }

    #[test]
    fn test_optimize_multi_ranks_by_net_benefit() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(382015), amex(), saver(100000)];
        let t = txn(11240, SpendingCategory::Grocery);

        let options = opt.optimize_multi(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].entries[0].source_id.as_str(), "amex-gold");
        assert_eq!(options[0].label.as_deref(), Some("Pay with Amex Gold"));
        assert!(options.iter().all(|o| o.requires_confirmation));
        assert!(options
            .windows(2)
            .all(|w| w[0].net_benefit >= w[1].net_benefit));
    }

    #[test]
    fn test_optimize_multi_includes_split() {
        let s = settings();
        let opt = Optimizer::new(&s);
        let ledger = ReservationLedger::new();
        let sources = vec![santander(30000), saver(50000)];
        let t = txn(60000, SpendingCategory::Other);

        let options = opt.optimize_multi(request(&t, &sources, &[], &ledger)).unwrap();
        assert_eq!(options.len(), 1);
        assert!(options[0].is_split());
        assert_eq!(
            options[0].label.as_deref(),
            Some("Split across Santander + Marcus Saver")
        );
    }
}
