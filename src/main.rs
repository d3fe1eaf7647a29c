use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use optivault::cli::{
    handle_batch, handle_ledger_command, handle_optimize, handle_pay, handle_plan_command,
    handle_source_command, LedgerCommands, PlanCommands, PurchaseArgs, SourceCommands,
};
use optivault::config::{paths::VaultPaths, settings::Settings};
use optivault::storage::{initialize_storage, Storage};

#[derive(Parser)]
#[command(
    name = "optivault",
    author = "Kaylee Beyene",
    version,
    about = "Payment allocation engine for accounts, savings pots and cards",
    long_about = "OptiVault decides, for each purchase, which of your funding sources \
                  should pay and how much: the default account, a reward card, a \
                  cheaper FX route or a split that keeps your account clear of \
                  upcoming direct debits."
)]
struct Cli {
    /// Read funding sources from this snapshot file instead of the default
    #[arg(long, global = true, env = "OPTIVAULT_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a purchase without committing it
    Optimize {
        #[command(flatten)]
        purchase: PurchaseArgs,
        /// Show ranked alternatives instead of a single plan
        #[arg(long)]
        multi: bool,
        /// Preview from the last known data; never committable
        #[arg(long)]
        estimate: bool,
        /// Print the decision trace
        #[arg(long)]
        trace: bool,
    },

    /// Plan a purchase and commit it if no confirmation is needed
    Pay {
        #[command(flatten)]
        purchase: PurchaseArgs,
    },

    /// Plan every purchase in a CSV file (amount,currency,category,merchant[,timestamp])
    Batch {
        /// Path to CSV file
        file: PathBuf,
    },

    /// Stored plan commands
    #[command(subcommand)]
    Plan(PlanCommands),

    /// Funding source commands
    #[command(subcommand, alias = "src")]
    Source(SourceCommands),

    /// Reservation ledger commands
    #[command(subcommand)]
    Ledger(LedgerCommands),

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only entries for this plan or reservation set
        #[arg(long)]
        entity: Option<String>,
    },

    /// Write default settings and a demo snapshot
    Init,

    /// Show current configuration and paths
    Config,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "optivault=debug" } else { "optivault=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).compact())
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Initialize paths and settings
    let paths = VaultPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    // Initialize storage
    let mut storage = Storage::open(paths.clone())?;
    if let Some(snapshot) = cli.snapshot {
        storage = storage.with_snapshot_file(snapshot);
    }

    match cli.command {
        Some(Commands::Optimize {
            purchase,
            multi,
            estimate,
            trace,
        }) => {
            handle_optimize(&storage, &settings, &purchase, multi, estimate, trace)?;
        }
        Some(Commands::Pay { purchase }) => {
            handle_pay(&storage, &settings, &purchase)?;
        }
        Some(Commands::Batch { file }) => {
            handle_batch(&storage, &settings, &file)?;
        }
        Some(Commands::Plan(cmd)) => {
            handle_plan_command(&storage, &settings, cmd)?;
        }
        Some(Commands::Source(cmd)) => {
            handle_source_command(&storage, &settings, cmd)?;
        }
        Some(Commands::Ledger(cmd)) => {
            handle_ledger_command(&storage, &settings, cmd)?;
        }
        Some(Commands::Audit { limit, entity }) => {
            let logger = storage.audit_logger();
            let entries = match entity {
                Some(id) => logger.entries_for(&id)?,
                None => logger.read_recent(limit)?,
            };
            if entries.is_empty() {
                println!("No audit entries.");
            }
            for entry in entries {
                println!("{}", entry.format_human_readable());
            }
        }
        Some(Commands::Init) => {
            println!("Initializing OptiVault at: {}", paths.base_dir().display());
            if initialize_storage(&paths, Utc::now())? {
                println!("Initialization complete!");
                println!();
                println!("A demo snapshot with eight funding sources has been written to:");
                println!("  {}", paths.snapshot_file().display());
                println!();
                println!("Run 'optivault source list' to see them.");
            } else {
                println!("Already initialized.");
            }
        }
        Some(Commands::Config) => {
            println!("OptiVault Configuration");
            println!("=======================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Snapshot file:    {}", storage.snapshot_provider().path().display());
            println!("Audit log:        {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  Home currency:      {}", settings.home_currency);
            println!("  Freshness:          {} minutes", settings.freshness_minutes);
            println!("  Commit retries:     {}", settings.max_commit_retries);
            println!(
                "  Default source:     {}",
                settings
                    .preferences
                    .default_source_id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "(none)".to_string())
            );
            println!("  Reward routing:     {}", settings.preferences.allows_reward_routing());
            println!("  Overdraft guard:    {}", settings.preferences.overdraft_protection);
            println!("  Safety buffer:      {}", settings.home_currency.format(settings.preferences.safety_buffer));
            println!("  Look-ahead:         {} hours", settings.preferences.look_ahead_hours);
        }
        None => {
            println!("OptiVault - payment allocation engine");
            println!();
            println!("Run 'optivault --help' for usage information.");
            println!("Run 'optivault init' to create a demo setup.");
        }
    }

    Ok(())
}
