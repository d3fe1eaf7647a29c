//! Payment CLI commands
//!
//! Implements `optimize`, `pay` and `batch`: planning and committing
//! purchases against the configured snapshot.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Args;

use crate::config::Settings;
use crate::display::{format_plan, format_plan_options, format_trace};
use crate::error::{VaultError, VaultResult};
use crate::models::{Currency, Money, SpendingCategory, Transaction};
use crate::storage::{import_transactions_csv, Storage};

use super::open_engine;

/// A purchase as described on the command line
#[derive(Args, Debug, Clone)]
pub struct PurchaseArgs {
    /// Amount (e.g., "112.40")
    pub amount: String,
    /// ISO currency code
    #[arg(short, long, default_value = "GBP")]
    pub currency: String,
    /// Spending category (groceries, travel, hotels, shopping, fuel, dining, ...)
    #[arg(short = 'g', long, default_value = "other")]
    pub category: String,
    /// Merchant name
    #[arg(short, long, default_value = "")]
    pub merchant: String,
    /// Merchant is located abroad
    #[arg(long)]
    pub international: bool,
    /// Submission time (RFC 3339), defaults to now
    #[arg(long)]
    pub at: Option<String>,
    /// Merge scheduled debits from a CSV file (source_id,amount,due_at,name)
    #[arg(long)]
    pub obligations: Option<PathBuf>,
}

impl PurchaseArgs {
    /// Build the transaction these arguments describe
    pub fn to_transaction(&self) -> VaultResult<Transaction> {
        let amount = Money::parse(&self.amount).map_err(|e| {
            VaultError::Validation(format!(
                "Invalid amount: '{}'. Use format like '112.40'. Error: {}",
                self.amount, e
            ))
        })?;
        let currency = Currency::parse(&self.currency).ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid currency: '{}'. Valid currencies: GBP, USD, EUR, INR, AUD",
                self.currency
            ))
        })?;
        let category = SpendingCategory::parse(&self.category).ok_or_else(|| {
            VaultError::Validation(format!(
                "Invalid category: '{}'. Valid categories: {}",
                self.category,
                SpendingCategory::all()
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        let mut txn = Transaction::new(amount, currency, category, self.merchant.clone());
        if self.international {
            txn = txn.international();
        }
        if let Some(at) = &self.at {
            let at = DateTime::parse_from_rfc3339(at)
                .map_err(|e| VaultError::Validation(format!("Invalid time '{}': {}", at, e)))?;
            txn = txn.at(at.with_timezone(&Utc));
        }
        Ok(txn)
    }
}

/// Handle `optimize`
pub fn handle_optimize(
    storage: &Storage,
    settings: &Settings,
    purchase: &PurchaseArgs,
    multi: bool,
    estimate: bool,
    trace: bool,
) -> VaultResult<()> {
    let txn = purchase.to_transaction()?;
    let engine = open_engine(storage, settings, purchase.obligations.as_deref());

    if estimate {
        if let Err(e) = engine.refresh() {
            println!("Live data unavailable: {}", e);
        }
        let plan = engine.estimate(&txn)?;
        print!("{}", format_plan(&plan, &txn));
        if trace {
            print!("\n{}", format_trace(&plan));
        }
        return Ok(());
    }

    if multi {
        let options = engine.optimize_multi(&txn)?;
        storage.save_all()?;
        println!("Options for {}:\n", txn);
        print!("{}", format_plan_options(&options));
        println!();
        println!("Run 'optivault plan confirm <plan>' then 'optivault plan commit <plan>' to use one.");
        return Ok(());
    }

    let plan = engine.optimize(&txn)?;
    storage.save_all()?;
    print!("{}", format_plan(&plan, &txn));
    if trace {
        print!("\n{}", format_trace(&plan));
    }
    Ok(())
}

/// Handle `pay`: optimize and commit when no confirmation is needed
pub fn handle_pay(storage: &Storage, settings: &Settings, purchase: &PurchaseArgs) -> VaultResult<()> {
    let txn = purchase.to_transaction()?;
    let engine = open_engine(storage, settings, purchase.obligations.as_deref());

    let result = engine.pay(&txn);
    // Plans are stored even when the commit is refused
    storage.save_all()?;
    let outcome = result?;

    print!("{}", format_plan(&outcome.plan, &txn));
    println!();
    println!("Committed: {}", outcome.reservation_set.id);
    if outcome.was_replanned() {
        println!(
            "Note: re-planned after a conflicting commit ({} attempts)",
            outcome.attempts
        );
    }
    Ok(())
}

/// Handle `batch`: plan every purchase in a CSV file without committing
pub fn handle_batch(storage: &Storage, settings: &Settings, file: &Path) -> VaultResult<()> {
    let transactions = import_transactions_csv(file)?;
    let engine = open_engine(storage, settings, None);

    let results = engine.optimize_batch(&transactions)?;
    storage.save_all()?;

    for (txn, result) in transactions.iter().zip(&results) {
        match result {
            Ok(plan) => println!(
                "{}  {:<28}  {}  {}",
                plan.id,
                plan.step.to_string(),
                plan.net_benefit.format_signed(plan.currency.symbol()),
                txn
            ),
            Err(e) => println!("{:<13}  {}  {}", "failed", e, txn),
        }
    }

    let planned = results.iter().filter(|r| r.is_ok()).count();
    println!();
    println!("Planned {} of {} purchases", planned, transactions.len());
    Ok(())
}
