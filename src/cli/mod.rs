//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the payment engine.

pub mod ledger;
pub mod payment;
pub mod plan;
pub mod source;

pub use ledger::{handle_ledger_command, LedgerCommands};
pub use payment::{handle_batch, handle_optimize, handle_pay, PurchaseArgs};
pub use plan::{handle_plan_command, PlanCommands};
pub use source::{handle_source_command, SourceCommands};

use std::path::Path;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::PaymentEngine;
use crate::storage::{FileSnapshotProvider, Storage};

/// Engine over the on-disk ledger, plan store and snapshot file
pub fn open_engine(
    storage: &Storage,
    settings: &Settings,
    obligations_csv: Option<&Path>,
) -> PaymentEngine<FileSnapshotProvider> {
    let mut provider = storage.snapshot_provider();
    if let Some(path) = obligations_csv {
        provider = provider.with_obligations_csv(path);
    }
    PaymentEngine::with_storage(
        provider,
        settings.clone(),
        Arc::clone(&storage.ledger),
        Arc::clone(&storage.plans),
    )
    .with_audit(storage.audit_logger())
}
