//! crabwatch - CRAB production monitor
//!
//! Main entry point for the command line tool.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::path::PathBuf;

use clap::Parser;
use crabwatch::{run_monitor, RunOptions};
use crabwatch_core::config::DB_URL_ENV;
use crabwatch_core::Config;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "crabwatch", about = "Monitor the CRAB tasks of a production", version)]
struct Cli {
    /// Start a new production snapshot from the current framework and analysis commits
    #[arg(long)]
    new: bool,

    /// Snapshot file to continue from (default: newest prod_*.json)
    #[arg(short = 'j', long = "json", value_name = "FILE")]
    json: Option<PathBuf>,

    /// Poll tasks already marked COMPLETED again
    #[arg(long = "recheckcompleted")]
    recheck_completed: bool,

    /// Config file (key=value), applied over .crabwatch/config
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the CRAB task directories
    #[arg(long, value_name = "DIR")]
    tasks_dir: Option<PathBuf>,

    /// Sample database URL
    #[arg(long, env = DB_URL_ENV, value_name = "URL")]
    db_url: Option<String>,
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let workspace = std::env::current_dir()?;
    let mut config = Config::load(&workspace, cli.config.as_deref())?;
    if let Some(tasks_dir) = cli.tasks_dir {
        config.tasks_dir = tasks_dir;
    }
    if let Some(url) = cli.db_url.filter(|url| !url.is_empty()) {
        config.record_store_url = Some(url);
    }
    if cli.recheck_completed {
        config.recheck_completed = true;
    }

    let options = RunOptions {
        workspace,
        new_session: cli.new,
        snapshot: cli.json,
    };

    // Tasks are polled one at a time.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_monitor(&config, &options))?;
    Ok(())
}
