use clap::Parser;
use std::path::PathBuf;

use crate::puzzle::Part;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "advent_agent")]
#[command(
    about = "Solve an Advent of Code puzzle with LLM-generated Python",
    long_about = "Solve an Advent of Code puzzle with LLM-generated Python\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default search path when --config is not provided:\n    1. $XDG_CONFIG_HOME/advent-agent/config.toml\n    2. ~/.config/advent-agent/config.toml"
)]
pub struct CliArgs {
    /// Puzzle day to solve.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=25))]
    pub day: u8,

    #[arg(long, value_enum, default_value = "1")]
    pub part: Part,

    /// Event year; overrides AOC_YEAR and the config file.
    #[arg(long)]
    pub year: Option<u16>,

    /// Read the puzzle input from this file instead of downloading it.
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Session cookie; overrides AOC_SESSION and the config file.
    #[arg(long, value_name = "COOKIE")]
    pub session: Option<String>,

    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the generated program before the answer.
    #[arg(long)]
    pub show_code: bool,

    /// Print whatever the generated program wrote to stdout.
    #[arg(long)]
    pub show_output: bool,

    /// Log HTTP requests and responses to stderr, secrets redacted.
    #[arg(long)]
    pub verbose: bool,
}
