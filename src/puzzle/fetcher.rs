use thiserror::Error;

use super::PuzzleDocument;
use crate::http::HttpClient;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("missing AOC_SESSION cookie")]
    MissingSession,
    #[error("puzzle server returned status {0}")]
    Status(u16),
    #[error("puzzle request failed: {0}")]
    Transport(String),
}

/// Authenticated access to the puzzle site for one event year.
#[derive(Debug, Clone)]
pub struct PuzzleFetcher {
    http: HttpClient,
    base_url: String,
    year: u16,
    session: Option<String>,
}

impl PuzzleFetcher {
    pub fn new(http: HttpClient, base_url: &str, year: u16, session: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            year,
            session: session.filter(|value| !value.trim().is_empty()),
        }
    }

    pub fn puzzle_url(&self, day: u8) -> String {
        format!("{}/{}/day/{day}", self.base_url, self.year)
    }

    pub async fn fetch_puzzle(&self, day: u8) -> Result<PuzzleDocument, FetchError> {
        let body = self.get(&self.puzzle_url(day)).await?;
        Ok(PuzzleDocument {
            day,
            body: body.into_bytes(),
        })
    }

    /// Downloads the personal input file, verbatim.
    pub async fn fetch_input(&self, day: u8) -> Result<String, FetchError> {
        self.get(&format!("{}/input", self.puzzle_url(day))).await
    }

    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let session = self.session.as_deref().ok_or(FetchError::MissingSession)?;
        let cookie = format!("session={}", session.trim());

        let resp = self
            .http
            .get(url, &[("cookie", cookie.as_str())])
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        if !resp.is_success() {
            return Err(FetchError::Status(resp.status));
        }
        Ok(resp.body)
    }
}
