//! Funding source CLI commands

use clap::Subcommand;

use crate::config::Settings;
use crate::display::{format_source_details, format_source_list};
use crate::error::{VaultError, VaultResult};
use crate::models::SourceId;
use crate::storage::Storage;

use super::open_engine;

/// Source subcommands
#[derive(Subcommand)]
pub enum SourceCommands {
    /// List sources with their live capacity
    List,
    /// Show a source's terms and counters
    Show {
        /// Source ID
        source: String,
    },
    /// Show how much a source can absorb right now
    Capacity {
        /// Source ID
        source: String,
    },
}

/// Handle a source command
pub fn handle_source_command(storage: &Storage, settings: &Settings, cmd: SourceCommands) -> VaultResult<()> {
    let engine = open_engine(storage, settings, None);
    engine.refresh()?;

    match cmd {
        SourceCommands::List => {
            let rows = engine.capacities()?;
            print!("{}", format_source_list(&rows));
        }

        SourceCommands::Show { source } => {
            let id = SourceId::new(source.as_str());
            let snapshot = engine
                .last_snapshot()?
                .ok_or_else(|| VaultError::EngineUnavailable("no snapshot loaded".into()))?;
            let found = snapshot
                .source(&id)
                .ok_or_else(|| VaultError::source_not_found(&source))?;
            let counters = storage.ledger.counters(&id)?;
            print!("{}", format_source_details(found, counters.as_ref()));
        }

        SourceCommands::Capacity { source } => {
            let capacity = engine.capacity(&SourceId::new(source.as_str()))?;
            println!("{}: {} ({})", source, capacity.amount, capacity.binding);
        }
    }

    storage.save_all()?;
    Ok(())
}
