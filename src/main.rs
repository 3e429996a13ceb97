//! Meme Attribution CLI
//!
//! Computes who receives a minted meme's tokens, for operators and for the
//! application layer that submits the distribution.
//!
//! ## Usage
//!
//! ```bash
//! # Distribution payload for a meme (JSON on stdout)
//! meme-attribution compute 8f14e45f --pretty
//!
//! # Lineage and raw proportions only
//! meme-attribution raw 8f14e45f
//!
//! # Local development database
//! meme-attribution --database ./memes.db init
//! meme-attribution --database ./memes.db seed fixtures.json
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change verbosity.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use meme_attribution::db::{self, MemeDb, SeedFixture};
use meme_attribution::services::spawn_logging_listener;
use meme_attribution::{AttributionService, Config, EventBus};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meme-attribution")]
#[command(about = "Contribution attribution engine for minted memes")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database with memes, interactions and users
    #[arg(long, env = "MEME_ATTRIBUTION_DB")]
    database: Option<PathBuf>,

    /// Contributor share of the supply, in basis points
    #[arg(long)]
    target_sum_bps: Option<u32>,

    /// Per-user cap, in basis points of the supply
    #[arg(long)]
    per_user_cap_bps: Option<u32>,

    /// Distribution units per percentage point of supply
    #[arg(long)]
    units_per_percent: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the distribution payload for a meme
    Compute {
        meme_id: String,
        /// Pretty-print the JSON report
        #[arg(long)]
        pretty: bool,
    },
    /// Show lineage and raw attribution for a meme
    Raw {
        meme_id: String,
        #[arg(long)]
        pretty: bool,
    },
    /// Create the schema in the configured database
    Init,
    /// Load a JSON fixture of memes, interactions and users
    Seed {
        file: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("meme_attribution=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(path) = args.database {
        config.database_path = path;
    }
    if let Some(bps) = args.target_sum_bps {
        config.target_sum_bps = bps;
    }
    if let Some(bps) = args.per_user_cap_bps {
        config.per_user_cap_bps = bps;
    }
    if let Some(units) = args.units_per_percent {
        config.units_per_percent = units;
    }

    let policy = config.policy()?;

    info!(
        database = %config.database_path.display(),
        target_sum_bps = policy.target_sum_bps(),
        per_user_cap_bps = policy.per_user_cap_bps(),
        units_per_percent = policy.units_per_percent(),
        "Starting meme-attribution"
    );

    match args.command {
        Command::Compute { meme_id, pretty } => {
            let db = Arc::new(MemeDb::open_read_only(&config.database_path)?);
            let events = Arc::new(EventBus::new());
            let listener = spawn_logging_listener(Arc::clone(&events));

            let service = AttributionService::new(db, policy, Arc::clone(&events));
            let report = service.compute_distribution(&meme_id)?;

            // Dropping the last sender lets the listener drain and exit
            drop(service);
            drop(events);
            listener.await?;

            print_json(&report, pretty)?;
        }
        Command::Raw { meme_id, pretty } => {
            let db = Arc::new(MemeDb::open_read_only(&config.database_path)?);
            let service = AttributionService::new(db, policy, Arc::new(EventBus::new()));
            print_json(&service.compute_raw(&meme_id)?, pretty)?;
        }
        Command::Init => {
            if let Some(parent) = config.database_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let db = MemeDb::open(&config.database_path)?;
            print_json(&db.stats()?, false)?;
        }
        Command::Seed { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading seed file {}", file.display()))?;
            let fixture: SeedFixture = serde_json::from_str(&raw)?;

            let db = MemeDb::open(&config.database_path)?;
            let result = db.with_conn_mut(|conn| db::seed::seed(conn, &fixture))?;
            print_json(&result, false)?;
        }
    }

    Ok(())
}
