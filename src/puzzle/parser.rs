use regex::Regex;
use std::io::Cursor;
use std::sync::LazyLock;
use thiserror::Error;

use super::PuzzleDocument;

const RENDER_WIDTH: usize = 100;

static STATEMENT_ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<article\b[^>]*\bclass\s*=\s*"day-desc"[^>]*>.*?</article>"#)
        .expect("statement pattern is valid")
});

// Statement headings render as `## --- Day 1: ... ---`.
static HEADING_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6} (---)").expect("heading pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no puzzle statement found in the page for day {day}")]
    NoStatement { day: u8 },
}

/// Extracts the plain-text statement: every `day-desc` article in document
/// order, rendered without markup.
pub fn parse_statement(document: &PuzzleDocument) -> Result<String, ParseError> {
    let html = String::from_utf8_lossy(&document.body);
    let articles: Vec<&str> = STATEMENT_ARTICLE
        .find_iter(&html)
        .map(|m| m.as_str())
        .collect();

    if articles.is_empty() {
        return Err(ParseError::NoStatement { day: document.day });
    }

    let joined = articles.join("\n");
    let rendered = html2text::from_read(Cursor::new(joined.as_bytes()), RENDER_WIDTH);
    Ok(HEADING_PREFIX.replace_all(&rendered, "$1").into_owned())
}
