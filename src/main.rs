//! # Account Harvester CLI (`harvest`)
//!
//! Mirrors the documents, photos, folders and albums of configured online
//! accounts into a local semantic graph store.
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite triple store schema |
//! | `harvest accounts` | List configured accounts and their inputs |
//! | `harvest crawl <account\|all>` | Crawl accounts and reconcile deletions |
//! | `harvest show <identifier>` | Print the stored properties of a resource |
//!
//! Logs go to stderr and honour `RUST_LOG`; stdout carries only command
//! output.

use account_harvester::{accounts, config, db, harvest, migrate, provider::Capability, show};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Account Harvester: incremental mirroring of online accounts into a
/// semantic store.
#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Mirror documents and photos of online accounts into a local semantic store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store schema.
    ///
    /// Creates the SQLite database file and the triples table. Safe to run
    /// repeatedly.
    Init,

    /// List configured accounts and whether their inputs exist.
    Accounts,

    /// Crawl one account, or every account concurrently with `all`.
    ///
    /// Press Ctrl-C to cancel; cancelled crawls never delete anything.
    Crawl {
        /// Account name from the config, or `all`.
        account: String,

        /// Only crawl these capabilities (repeatable).
        #[arg(long = "capability", value_enum)]
        capabilities: Vec<Capability>,
    },

    /// Print the stored properties of a mirrored resource.
    Show {
        /// Provider identifier, e.g. `google:drive:<id>`.
        identifier: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("account_harvester={}", default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized successfully.");
        }
        Commands::Accounts => {
            accounts::list_accounts(&cfg)?;
        }
        Commands::Crawl {
            account,
            capabilities,
        } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling crawls");
                    on_signal.cancel();
                }
            });

            let results = harvest::run_harvest(&cfg, &account, &capabilities, cancel).await?;
            harvest::check_results(&results)?;
        }
        Commands::Show { identifier, json } => {
            let store = db::open_store(&cfg).await?;
            show::run_show(store.as_ref(), &identifier, json).await?;
        }
    }

    Ok(())
}
