use reqwest::header::HeaderMap;
use reqwest::{Client, Request};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
#[cfg(test)]
use std::sync::{Arc, Mutex};

use super::debug::{
    HttpDebugConfig, redact_header_value, redact_text_body, redact_url, truncate_for_log,
};
use crate::trace::RunTrace;

/// reqwest wrapper shared by the puzzle fetcher and the LLM providers.
///
/// Every exchange is mirrored to the run trace (when attached) and, with
/// `--verbose`, to stderr as `[http-debug]` lines. Both views are redacted.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
    sink: DebugSink,
    trace: Option<RunTrace>,
}

#[derive(Clone)]
enum DebugSink {
    Stderr,
    #[cfg(test)]
    Memory(Arc<Mutex<Vec<String>>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn marker(self) -> char {
        match self {
            Self::Outbound => '>',
            Self::Inbound => '<',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub body: String,
}

impl HttpResponseData {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self {
            inner,
            debug,
            sink: DebugSink::Stderr,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: RunTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponseData, reqwest::Error> {
        let request = headers
            .iter()
            .fold(self.inner.get(url), |builder, (name, value)| {
                builder.header(*name, *value)
            })
            .build()?;
        self.execute(request, "").await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
        payload: &T,
    ) -> Result<HttpResponseData, reqwest::Error> {
        // reqwest serializes the payload again; this copy only feeds the logs.
        let body_text = serde_json::to_string(payload)
            .unwrap_or_else(|err| format!("{{\"_serialization_error\":\"{err}\"}}"));

        let request = headers
            .iter()
            .fold(
                self.inner.post(url).query(query).json(payload),
                |builder, (name, value)| builder.header(*name, *value),
            )
            .build()?;
        self.execute(request, &body_text).await
    }

    async fn execute(
        &self,
        request: Request,
        body_text: &str,
    ) -> Result<HttpResponseData, reqwest::Error> {
        let start_line = format!(
            "{} {}",
            request.method(),
            redact_url(request.url(), self.debug.redact_secrets)
        );
        self.emit_debug(
            Direction::Outbound,
            &start_line,
            request.headers(),
            body_text
        );
        if let Some(trace) = &self.trace {
            trace.log_http_request(
                request.method().as_str(),
                request.url(),
                request.headers(),
                body_text,
            );
        }

        let response = self.inner.execute(request).await.inspect_err(|err| {
            if let Some(trace) = &self.trace {
                trace.log_http_error(&err.to_string());
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        self.emit_debug(
            Direction::Inbound,
            &format!("HTTP {status}"),
            &headers,
            &body,
        );
        if let Some(trace) = &self.trace {
            trace.log_http_response(status, &headers, &body);
        }

        Ok(HttpResponseData { status, body })
    }

    fn emit_debug(&self, direction: Direction, start_line: &str, headers: &HeaderMap, body: &str) {
        if !self.debug.enabled {
            return;
        }

        let lines = exchange_lines(self.debug, direction, start_line, headers, body);
        match &self.sink {
            DebugSink::Stderr => {
                let mut stderr = io::stderr().lock();
                for line in lines {
                    let _ = writeln!(stderr, "{line}");
                }
            }
            #[cfg(test)]
            DebugSink::Memory(buffer) => {
                if let Ok(mut captured) = buffer.lock() {
                    captured.extend(lines);
                }
            }
        }
    }

    #[cfg(test)]
    fn with_memory_sink(inner: Client, debug: HttpDebugConfig) -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let client = Self {
            inner,
            debug,
            sink: DebugSink::Memory(Arc::clone(&buffer)),
            trace: None,
        };
        (client, buffer)
    }
}

/// Renders one side of an exchange: start line, headers, a bare separator,
/// then the redacted and truncated body.
fn exchange_lines(
    debug: HttpDebugConfig,
    direction: Direction,
    start_line: &str,
    headers: &HeaderMap,
    body: &str,
) -> Vec<String> {
    let marker = direction.marker();
    let body = truncate_for_log(
        &redact_text_body(body, debug.redact_secrets),
        debug.max_body_chars,
    );

    let mut lines = vec![format!("[http-debug] {marker} {start_line}")];
    lines.extend(headers.iter().map(|(name, value)| {
        format!(
            "[http-debug] {marker} {}: {}",
            name.as_str(),
            redact_header_value(name.as_str(), value, debug.redact_secrets)
        )
    }));
    lines.push(format!("[http-debug] {marker}"));
    if body.is_empty() {
        lines.push(format!("[http-debug] {marker} <empty body>"));
    } else {
        lines.extend(body.lines().map(|line| format!("[http-debug] {marker} {line}")));
    }
    lines
}
