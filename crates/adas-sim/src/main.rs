//! ADAS Simulator - Main Entry Point

use adas::RuntimeConfig;
use adas_sim::{init_logging, run, Args};
use anyhow::Result;
use clap::Parser;
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = RuntimeConfig::load(args.config.as_deref())?;
    init_logging(args.level(&config)?)?;

    info!("=== ADAS Simulator v{} ===", env!("CARGO_PKG_VERSION"));

    let report = run(&args, &config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
