//! Transaction CSV import for batch planning
//!
//! Expected header: `amount,currency,category,merchant[,timestamp]`.
//! Currency and category fall back to GBP and `other` when blank.

use std::path::Path;

use csv::{Reader, StringRecord};

use crate::error::{VaultError, VaultResult};
use crate::models::{Currency, Money, SpendingCategory, Transaction};

use super::snapshot::parse_due_at;

/// Read purchases from a CSV file
pub fn import_transactions_csv(path: &Path) -> VaultResult<Vec<Transaction>> {
    let mut reader = Reader::from_path(path)
        .map_err(|e| VaultError::Import(format!("Failed to open {}: {}", path.display(), e)))?;
    parse_transactions(&mut reader)
}

/// Parse purchases from any CSV reader
pub fn parse_transactions<R: std::io::Read>(reader: &mut Reader<R>) -> VaultResult<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| VaultError::Import(format!("Error reading CSV record: {}", e)))?;
        let txn = parse_transaction(&record)
            .map_err(|e| VaultError::Import(format!("Row {}: {}", idx + 2, e)))?;
        transactions.push(txn);
    }
    Ok(transactions)
}

fn parse_transaction(record: &StringRecord) -> Result<Transaction, String> {
    let optional = |i: usize| record.get(i).map(str::trim).filter(|s| !s.is_empty());

    let amount = optional(0).ok_or_else(|| "Missing amount column".to_string())?;
    let amount = Money::parse(amount).map_err(|e| e.to_string())?;

    let currency = match optional(1) {
        Some(code) => Currency::parse(code).ok_or_else(|| format!("Unknown currency: '{}'", code))?,
        None => Currency::default(),
    };
    let category = match optional(2) {
        Some(name) => {
            SpendingCategory::parse(name).ok_or_else(|| format!("Unknown category: '{}'", name))?
        }
        None => SpendingCategory::Other,
    };
    let merchant = optional(3).unwrap_or_default();

    let mut txn = Transaction::new(amount, currency, category, merchant);
    if let Some(at) = optional(4) {
        txn = txn.at(parse_due_at(at)?);
    }
    Ok(txn)
}
