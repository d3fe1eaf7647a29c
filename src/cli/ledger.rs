//! Reservation ledger CLI commands
//!
//! Implements CLI commands for reviewing, releasing and exporting
//! committed reservations.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Subcommand;

use crate::config::Settings;
use crate::display::{format_ledger_history, format_reservation_set};
use crate::error::{VaultError, VaultResult};
use crate::export::{export_full_json, export_full_yaml, export_plans_csv, export_reservations_csv};
use crate::models::ReleaseOutcome;
use crate::storage::Storage;

use super::open_engine;

/// Ledger subcommands
#[derive(Subcommand)]
pub enum LedgerCommands {
    /// List reservation sets, oldest first
    History {
        /// Only show sets that have not been released
        #[arg(long)]
        active: bool,
    },
    /// Show one reservation set
    Show {
        /// Reservation set ID or prefix
        set: String,
    },
    /// Reverse a committed reservation set
    Release {
        /// Reservation set ID or prefix
        set: String,
    },
    /// Export the ledger and plans
    Export {
        /// Output format (csv, plans-csv, json, yaml)
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Handle a ledger command
pub fn handle_ledger_command(storage: &Storage, settings: &Settings, cmd: LedgerCommands) -> VaultResult<()> {
    let engine = open_engine(storage, settings, None);

    match cmd {
        LedgerCommands::History { active } => {
            let sets: Vec<_> = storage
                .ledger
                .history()?
                .into_iter()
                .filter(|s| !active || !s.is_released())
                .collect();
            print!("{}", format_ledger_history(&sets));
        }

        LedgerCommands::Show { set } => {
            let found = engine.find_reservation_set(&set)?;
            print!("{}", format_reservation_set(&found));
        }

        LedgerCommands::Release { set } => {
            let found = engine.find_reservation_set(&set)?;
            match engine.release(found.id)? {
                ReleaseOutcome::Released => println!("Released reservation set: {}", found.id),
                ReleaseOutcome::AlreadyReleased => {
                    println!("Reservation set {} was already released", found.id)
                }
            }
            storage.save_all()?;
        }

        LedgerCommands::Export { format, output } => {
            let mut writer: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|e| {
                    VaultError::Export(format!("Failed to create {}: {}", path.display(), e))
                })?)),
                None => Box::new(io::stdout().lock()),
            };

            match format.to_lowercase().as_str() {
                "csv" => export_reservations_csv(storage, &mut writer)?,
                "plans-csv" => export_plans_csv(storage, &mut writer)?,
                "json" => export_full_json(storage, &mut writer, true)?,
                "yaml" | "yml" => export_full_yaml(storage, &mut writer)?,
                other => {
                    return Err(VaultError::Validation(format!(
                        "Unknown export format: '{}'. Valid formats: csv, plans-csv, json, yaml",
                        other
                    )))
                }
            }
            writer.flush().map_err(|e| VaultError::Export(e.to_string()))?;

            if let Some(path) = output {
                eprintln!("Exported to {}", path.display());
            }
        }
    }

    Ok(())
}
