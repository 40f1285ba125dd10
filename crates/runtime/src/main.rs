#![deny(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use runtime::RunConfig;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = RunConfig::parse();
    let summary = runtime::run(&config)?;
    tracing::info!(
        frames = summary.frames,
        stages = summary.reports.len(),
        "voxbench finished"
    );
    Ok(())
}
