mod config;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use live_keeper::{ApiHosts, Scheduler, SessionStore, build_units};
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "keeper", about = "Keeps bilibili live sessions alive and runs their daily tasks", version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "keeper.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    init_logging(args.verbose, args.quiet);

    let config = AppConfig::load(&args.config)?;
    if config.accounts.is_empty() {
        anyhow::bail!(
            "no accounts configured in {}; add an [[accounts]] entry",
            args.config.display()
        );
    }

    let units = build_units(&config.accounts);
    info!(
        accounts = config.accounts.len(),
        units = units.len(),
        session_file = %config.session_file.display(),
        "starting keeper"
    );

    let store = SessionStore::new(&config.session_file);
    let scheduler = Scheduler::new(store, ApiHosts::default());
    scheduler.run(units).await;

    info!("all units stopped");
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
