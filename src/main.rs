//! # Hackathon Search CLI (`hsearch`)
//!
//! ## Usage
//!
//! ```bash
//! hsearch --config ./config/hsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hsearch clean` | Normalize the raw snapshot into the cleaned snapshot |
//! | `hsearch upsert` | Upload the cleaned snapshot to the index, paced |
//! | `hsearch search "<query>"` | Run one search and print the projects as JSON |
//! | `hsearch serve` | Start the search proxy |
//!
//! ## Examples
//!
//! ```bash
//! # Show batches, token estimates and expected duration, no API calls
//! hsearch upsert --dry-run
//!
//! # Slower upload for a smaller quota
//! hsearch upsert --tokens-per-minute 100000 --progress json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use hackathon_search::config::{self, Config};
use hackathon_search::core::index::VectorIndex;
use hackathon_search::ingest::{self, UpsertOptions};
use hackathon_search::pinecone::PineconeClient;
use hackathon_search::progress::ProgressMode;
use hackathon_search::{clean_cmd, secrets, server};

/// Hackathon Search CLI: ingest hackathon projects into a vector index
/// and search them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/hsearch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "hsearch",
    about = "Semantic search over hackathon projects",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/hsearch.toml`. A missing file means defaults;
    /// `HSEARCH_*` environment variables override either.
    #[arg(long, global = true, default_value = "./config/hsearch.toml")]
    config: PathBuf,

    /// Progress on stderr: `auto` (human if TTY), `human`, `json`, or `off`.
    #[arg(long, global = true, default_value = "auto", value_parser = ProgressMode::parse)]
    progress: ProgressMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize the raw project snapshot.
    ///
    /// Reads `[data].raw_path`, fills missing fields with empty values,
    /// drops blank list entries, and writes `[data].clean_path`.
    Clean,

    /// Upload the cleaned snapshot to the index.
    ///
    /// Creates the index if it does not exist, skips oversized records,
    /// and sends batches one at a time, sleeping between them to stay
    /// under the tokens-per-minute budget.
    Upsert {
        /// Plan only: load, filter and schedule without any API call.
        #[arg(long)]
        dry_run: bool,

        /// Override `[ingest].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override `[ingest].tokens_per_minute`.
        #[arg(long)]
        tokens_per_minute: Option<u64>,
    },

    /// Search projects and print the results as JSON.
    Search {
        /// Free-text query.
        query: String,
    },

    /// Start the search proxy HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(cfg: &Config) -> anyhow::Result<PineconeClient> {
    let key = secrets::resolve_api_key(cfg).await?;
    PineconeClient::new(&key, &cfg.pinecone)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.reporter();

    match cli.command {
        Commands::Clean => {
            let report = clean_cmd::run_clean(&cfg, progress.as_ref())?;
            clean_cmd::print_report(&report);
        }
        Commands::Upsert {
            dry_run,
            batch_size,
            tokens_per_minute,
        } => {
            let options = UpsertOptions {
                dry_run,
                batch_size,
                tokens_per_minute,
            };
            let plan = ingest::prepare_upsert(&cfg, &options, progress.as_ref())?;
            let report = if dry_run {
                ingest::dry_run_report(&plan)
            } else {
                let client = connect(&cfg).await?;
                ingest::execute_upsert(&cfg, &plan, &client, progress.as_ref()).await?
            };
            ingest::print_report(&cfg, &report);
        }
        Commands::Search { query } => {
            anyhow::ensure!(!query.trim().is_empty(), "query must not be empty");
            let client = connect(&cfg).await?;
            let projects = server::search_projects(&cfg, &client, query.trim()).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "projects": projects }))?
            );
        }
        Commands::Serve => {
            let client: Arc<dyn VectorIndex> = Arc::new(connect(&cfg).await?);
            server::run_server(Arc::new(cfg), client).await?;
        }
    }

    Ok(())
}
