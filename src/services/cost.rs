//! Cost model
//!
//! Signed per-unit cost of routing a transaction through a funding source:
//! forgone interest plus FX markup plus any flat transfer fee spread over
//! the purchase, minus rewards. Negative values mean the source pays the
//! user to use it. Pure: depends only on the source, the transaction and
//! the static rate tables, never on ledger counters.

use crate::config::RatePolicy;
use crate::error::VaultResult;
use crate::models::{FundingSource, FxTable, Money, PlanEntry, SourceKind, Transaction};

/// Rounded money components of one draw, in transaction currency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    /// Covered amount, transaction currency
    pub covered: Money,
    /// Drawn amount, source currency
    pub amount: Money,
    pub interest_cost: Money,
    pub fx_cost: Money,
    pub reward: Money,
    pub points: u64,
    pub cost_per_pound: f64,
}

impl CostBreakdown {
    pub fn net(&self) -> Money {
        self.reward - self.interest_cost - self.fx_cost
    }
}

/// Cost model over a static FX table and day-count policy
#[derive(Debug, Clone, Copy)]
pub struct CostModel<'a> {
    fx: &'a FxTable,
    policy: RatePolicy,
}

impl<'a> CostModel<'a> {
    pub fn new(fx: &'a FxTable, policy: RatePolicy) -> Self {
        Self { fx, policy }
    }

    /// Interest forgone (accounts) or charged (cards carrying a balance)
    /// per unit spent
    pub fn interest_rate(&self, source: &FundingSource) -> f64 {
        match source.kind {
            SourceKind::CreditCard if !source.carries_balance => 0.0,
            _ => self.policy.pro_rate(source.annual_interest_rate),
        }
    }

    /// FX markup per unit spent; zero for same-currency spend
    pub fn fx_rate(&self, source: &FundingSource, transaction: &Transaction) -> f64 {
        if source.currency != transaction.currency {
            source.fx_markup
        } else {
            0.0
        }
    }

    /// Reward value per unit spent
    pub fn reward_rate(&self, source: &FundingSource, transaction: &Transaction) -> f64 {
        source.reward_rate(transaction.category)
    }

    /// Flat transfer fee in transaction currency
    pub fn transfer_fee(
        &self,
        source: &FundingSource,
        transaction: &Transaction,
    ) -> VaultResult<Money> {
        if source.transfer_fee.is_zero() {
            return Ok(Money::zero());
        }
        self.fx
            .convert(source.transfer_fee, source.currency, transaction.currency)
    }

    /// Signed cost of routing one unit of the transaction through `source`
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Config` when a transfer fee must be converted
    /// and the FX table has no rate for one of the currencies.
    pub fn cost_per_pound(
        &self,
        source: &FundingSource,
        transaction: &Transaction,
    ) -> VaultResult<f64> {
        let fee = self.transfer_fee(source, transaction)?;
        let fee_rate = if transaction.amount.is_positive() {
            fee.minor() as f64 / transaction.amount.minor() as f64
        } else {
            0.0
        };
        Ok(self.interest_rate(source) + self.fx_rate(source, transaction) + fee_rate
            - self.reward_rate(source, transaction))
    }

    /// Money components of covering `covered` (transaction currency) from
    /// `source`, each rounded to minor units
    ///
    /// The transfer fee is charged once per draw and reported with the FX
    /// cost.
    pub fn breakdown(
        &self,
        source: &FundingSource,
        transaction: &Transaction,
        covered: Money,
    ) -> VaultResult<CostBreakdown> {
        let amount = self
            .fx
            .convert(covered, transaction.currency, source.currency)?;
        let points = source
            .rewards
            .as_ref()
            .map(|r| r.points_for(transaction.category, covered))
            .unwrap_or(0);
        let fee = if covered.is_positive() {
            self.transfer_fee(source, transaction)?
        } else {
            Money::zero()
        };

        Ok(CostBreakdown {
            covered,
            amount,
            interest_cost: covered.scale(self.interest_rate(source)),
            fx_cost: covered.scale(self.fx_rate(source, transaction)) + fee,
            reward: covered.scale(self.reward_rate(source, transaction)),
            points,
            cost_per_pound: self.cost_per_pound(source, transaction)?,
        })
    }

    /// Plan entry for covering `covered` from `source`
    pub fn entry(
        &self,
        source: &FundingSource,
        transaction: &Transaction,
        covered: Money,
    ) -> VaultResult<PlanEntry> {
        let b = self.breakdown(source, transaction, covered)?;
        Ok(PlanEntry {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            source_currency: source.currency,
            covered: b.covered,
            amount: b.amount,
            interest_cost: b.interest_cost,
            fx_cost: b.fx_cost,
            reward: b.reward,
            points: b.points,
            cost_per_pound: b.cost_per_pound,
        })
    }

    pub fn fx(&self) -> &FxTable {
        self.fx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CreditCap, Currency, RewardSchedule, SpendingCategory, VrpCap,
    };

    fn gbp(minor: i64) -> Money {
        Money::from_minor(minor)
    }

    fn amex() -> FundingSource {
        FundingSource::credit_card(
            "amex-gold",
            "Amex Gold",
            CreditCap::new(gbp(800000), gbp(240000), 90.0),
        )
        .with_interest_rate(0.249)
        .with_fx_markup(0.0299)
        .with_rewards(RewardSchedule::cashback([
            (SpendingCategory::Grocery, 0.01),
            (SpendingCategory::Other, 0.005),
        ]))
    }

    fn groceries() -> Transaction {
        Transaction::new(gbp(11240), Currency::Gbp, SpendingCategory::Grocery, "Sainsbury's")
    }

    #[test]
    fn test_domestic_current_account_costs_nothing() {
        let fx = FxTable::default();
        let model = CostModel::new(&fx, RatePolicy::default());
        let current = FundingSource::current_account("santander", "Santander", gbp(382015));

        assert_eq!(model.cost_per_pound(&current, &groceries()).unwrap(), 0.0);
        let b = model.breakdown(&current, &groceries(), gbp(11240)).unwrap();
        assert_eq!(b.net(), Money::zero());
    }

    #[test]
    fn test_cashback_card_is_negative_cost() {
        let fx = FxTable::default();
        let model = CostModel::new(&fx, RatePolicy::default());

        assert!((model.cost_per_pound(&amex(), &groceries()).unwrap() + 0.01).abs() < 1e-12);
        let b = model.breakdown(&amex(), &groceries(), gbp(11240)).unwrap();
        assert_eq!(b.reward, gbp(112));
        assert_eq!(b.net(), gbp(112));
    }

    #[test]
    fn test_card_carrying_balance_pays_apr() {
        let fx = FxTable::default();
        let model = CostModel::new(&fx, RatePolicy::default());
        let card = amex().carrying_balance(true);

        // 24.9% / 365 * 30 = 2.0466% of spend, minus 1% cashback
        let cost = model.cost_per_pound(&card, &groceries()).unwrap();
        assert!((cost - (0.249 / 365.0 * 30.0 - 0.01)).abs() < 1e-12);
        assert!(cost > 0.0);
    }

    #[test]
    fn test_savings_forgone_interest_uses_policy() {
        let fx = FxTable::default();
        let policy = RatePolicy {
            day_count_basis: 365,
            holding_period_days: 30,
        };
        let model = CostModel::new(&fx, policy);
        let saver = FundingSource::savings_account(
            "marcus-saver",
            "Marcus Saver",
            gbp(420000),
            0.04,
            VrpCap::new(gbp(100000), gbp(300000)),
        );

        let b = model.breakdown(&saver, &groceries(), gbp(7900)).unwrap();
        // 79.00 * 0.04 / 365 * 30 = 0.2597
        assert_eq!(b.interest_cost, gbp(26));
        assert_eq!(b.fx_cost, Money::zero());
    }

    #[test]
    fn test_fx_markup_only_for_foreign_currency() {
        let fx = FxTable::default();
        let model = CostModel::new(&fx, RatePolicy::default());
        let current = FundingSource::current_account("santander", "Santander", gbp(382015))
            .with_fx_markup(0.0399);

        let usd = Transaction::new(gbp(8999), Currency::Usd, SpendingCategory::OnlineShopping, "Steam");
        let b = model.breakdown(&current, &usd, gbp(8999)).unwrap();
        assert_eq!(b.fx_cost, gbp(359));
        assert_eq!(b.amount, gbp(7120));

        // International merchant billed in GBP: no FX cost
        let domestic = groceries().international();
        assert_eq!(model.fx_rate(&current, &domestic), 0.0);
    }

    #[test]
    fn test_transfer_fee_spread_over_purchase() {
        let fx = FxTable::default();
        let model = CostModel::new(&fx, RatePolicy::default());
        let wise = FundingSource::new("wise", "Wise", SourceKind::InternationalAccount)
            .with_balance(gbp(500000))
            .with_fx_markup(0.005)
            .with_transfer_fee(gbp(200));
        let hotel = Transaction::new(gbp(40000), Currency::Gbp, SpendingCategory::Hotel, "Ibis");

        // 2.00 over 400.00 adds 0.5% per unit
        let cost = model.cost_per_pound(&wise, &hotel).unwrap();
        assert!((cost - 0.005).abs() < 1e-12);

        let b = model.breakdown(&wise, &hotel, gbp(10000)).unwrap();
        assert_eq!(b.fx_cost, gbp(200));
        assert_eq!(b.net(), gbp(-200));
        assert_eq!(model.breakdown(&wise, &hotel, Money::zero()).unwrap().fx_cost, Money::zero());
    }

    #[test]
    fn test_points_reported() {
        let fx = FxTable::default();
        let model = CostModel::new(&fx, RatePolicy::default());
        let card = FundingSource::credit_card(
            "capital-one",
            "Capital One",
            CreditCap::new(gbp(500000), gbp(0), 50.0),
        )
        .with_rewards(RewardSchedule::points(0.01, [(SpendingCategory::Travel, 2.0)]));
        let flight = Transaction::new(gbp(28400), Currency::Gbp, SpendingCategory::Travel, "BA");

        let entry = model.entry(&card, &flight, gbp(28400)).unwrap();
        assert_eq!(entry.points, 568);
        assert_eq!(entry.reward, gbp(568));
    }
}
