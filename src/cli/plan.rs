//! Plan CLI commands
//!
//! Implements CLI commands for reviewing and acting on stored plans.

use clap::Subcommand;

use crate::config::Settings;
use crate::display::{format_explanation, format_plan, format_plan_list, format_trace};
use crate::error::{VaultError, VaultResult};
use crate::storage::Storage;

use super::open_engine;

/// Plan subcommands
#[derive(Subcommand)]
pub enum PlanCommands {
    /// List stored plans
    List {
        /// Include committed, cancelled and superseded plans
        #[arg(short, long)]
        all: bool,
    },
    /// Show a plan
    Show {
        /// Plan ID or prefix
        plan: String,
        /// Print the decision trace
        #[arg(long)]
        trace: bool,
    },
    /// Accept a plan that needs confirmation
    Confirm {
        /// Plan ID or prefix
        plan: String,
    },
    /// Reserve a plan's draws
    Commit {
        /// Plan ID or prefix
        plan: String,
    },
    /// Discard an uncommitted plan
    Cancel {
        /// Plan ID or prefix
        plan: String,
    },
    /// Explain why a plan was chosen
    Explain {
        /// Plan ID or prefix
        plan: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Handle a plan command
pub fn handle_plan_command(storage: &Storage, settings: &Settings, cmd: PlanCommands) -> VaultResult<()> {
    let engine = open_engine(storage, settings, None);

    match cmd {
        PlanCommands::List { all } => {
            let records: Vec<_> = storage
                .plans
                .get_all()?
                .into_iter()
                .filter(|r| all || r.status.is_open())
                .collect();
            print!("{}", format_plan_list(&records));
        }

        PlanCommands::Show { plan, trace } => {
            let record = engine.find_plan(&plan)?;
            print!("{}", format_plan(&record.plan, &record.transaction));
            println!("Status: {}", record.status);
            if let Some(set_id) = record.reservation_set {
                println!("Reservation set: {}", set_id);
            }
            if trace {
                print!("\n{}", format_trace(&record.plan));
            }
        }

        PlanCommands::Confirm { plan } => {
            let record = engine.find_plan(&plan)?;
            let record = engine.confirm(record.id())?;
            storage.save_all()?;
            println!("Confirmed plan: {}", record.id());
        }

        PlanCommands::Commit { plan } => {
            let record = engine.find_plan(&plan)?;
            let result = engine.commit(record.id());
            storage.save_all()?;
            let outcome = result?;

            println!("Committed plan: {}", outcome.plan.id);
            println!("  Reservation set: {}", outcome.reservation_set.id);
            for r in &outcome.reservation_set.reservations {
                println!("  {}: {}", r.source_id, r.amount);
            }
            if outcome.was_replanned() {
                println!(
                    "Note: replaces {} after a conflicting commit",
                    record.id()
                );
            }
        }

        PlanCommands::Cancel { plan } => {
            let record = engine.find_plan(&plan)?;
            let record = engine.cancel(record.id())?;
            storage.save_all()?;
            println!("Cancelled plan: {}", record.id());
        }

        PlanCommands::Explain { plan, json } => {
            let record = engine.find_plan(&plan)?;
            let explanation = engine.explain(record.id())?;
            if json {
                let out = serde_json::to_string_pretty(&explanation)
                    .map_err(|e| VaultError::Export(e.to_string()))?;
                println!("{}", out);
            } else {
                print!(
                    "{}",
                    format_explanation(&explanation, record.plan.currency.symbol())
                );
            }
        }
    }

    Ok(())
}
