use advent_agent::cli::CliArgs;
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    advent_agent::run(args).await
}
