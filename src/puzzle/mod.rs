mod fetcher;
mod parser;
mod statement;

pub use fetcher::{FetchError, PuzzleFetcher};
pub use parser::{ParseError, parse_statement};
pub use statement::{FormatError, PART_TWO_MARKER, PuzzleStatement};

use clap::ValueEnum;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Part {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("1"),
            Self::Two => f.write_str("2"),
        }
    }
}

/// Raw puzzle page as served for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleDocument {
    pub day: u8,
    pub body: Vec<u8>,
}
