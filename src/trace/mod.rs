use anyhow::{Context, Result, bail};
use reqwest::Url;
use reqwest::header::HeaderMap;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

use crate::http::debug::{redact_header_value, redact_text_body, redact_url};

const APP_DIR: &str = "advent-agent";
const KIND_WIDTH: usize = 11;

/// Append-only log of one invocation: stage transitions, the prompt, the
/// generated code, captured output and every HTTP exchange (secrets masked).
#[derive(Clone)]
pub struct RunTrace {
    sink: Arc<TraceSink>,
}

struct TraceSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    warned: AtomicBool,
}

impl RunTrace {
    pub fn create(run_id: &str) -> Result<Self> {
        let dir = trace_dir(
            env::var("XDG_STATE_HOME").ok().as_deref(),
            dirs::home_dir().as_deref(),
        )?;
        Self::open(run_id, &dir)
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn create_in_temp_dir(run_id: &str, dir: &Path) -> Result<Self> {
        Self::open(run_id, dir)
    }

    fn open(run_id: &str, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create trace directory {}", dir.display()))?;

        let started = OffsetDateTime::now_utc().unix_timestamp();
        let path = dir.join(format!("run-{run_id}-{started}.log"));
        let file = open_private(&path)
            .with_context(|| format!("Failed to create trace file {}", path.display()))?;

        Ok(Self {
            sink: Arc::new(TraceSink {
                path,
                writer: Mutex::new(BufWriter::new(file)),
                warned: AtomicBool::new(false),
            }),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.sink.path
    }

    pub fn log_stage(&self, stage: &str) {
        self.append("stage", [stage]);
    }

    /// Logs `text` line by line under `kind`; empty text is recorded as `<empty>`.
    pub fn log_event(&self, kind: &str, text: &str) {
        if text.is_empty() {
            self.append(kind, ["<empty>"]);
        } else {
            self.append(kind, text.lines());
        }
    }

    pub fn log_http_request(&self, method: &str, url: &Url, headers: &HeaderMap, body: &str) {
        let start = format!("{method} {}", redact_url(url, true));
        let mut lines = vec![start];
        lines.extend(header_lines(headers));
        if !body.is_empty() {
            lines.extend(redact_text_body(body, true).lines().map(str::to_string));
        }
        self.append("http.req", lines.iter().map(String::as_str));
    }

    pub fn log_http_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        let mut lines = vec![format!("HTTP {status}")];
        lines.extend(header_lines(headers));
        let body = redact_text_body(body, true);
        if body.is_empty() {
            lines.push("<empty>".to_string());
        } else {
            lines.extend(body.lines().map(str::to_string));
        }
        self.append("http.resp", lines.iter().map(String::as_str));
    }

    pub fn log_http_error(&self, message: &str) {
        self.append("http.err", [message]);
    }

    fn append<'a>(&self, kind: &str, lines: impl IntoIterator<Item = &'a str>) {
        let stamp = timestamp(OffsetDateTime::now_utc());
        let Ok(mut writer) = self.sink.writer.lock() else {
            self.warn("trace writer lock is poisoned");
            return;
        };

        let width = KIND_WIDTH;
        let written = lines
            .into_iter()
            .try_for_each(|line| writeln!(writer, "[{stamp}] [{kind:<width$}] {line}"));
        if written.and_then(|()| writer.flush()).is_err() {
            self.warn("failed to write to trace file");
        }
    }

    fn warn(&self, message: &str) {
        if !self.sink.warned.swap(true, Ordering::Relaxed) {
            eprintln!("advent-agent trace warning: {message}");
        }
    }
}

fn header_lines(headers: &HeaderMap) -> impl Iterator<Item = String> + '_ {
    headers.iter().map(|(name, value)| {
        let value = redact_header_value(name.as_str(), value, true);
        format!("{}: {value}", name.as_str())
    })
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
}

fn timestamp(now: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond()
    )
}

/// `$XDG_STATE_HOME/advent-agent/traces`, else `~/.local/state/advent-agent/traces`.
fn trace_dir(xdg_state_home: Option<&str>, home: Option<&Path>) -> Result<PathBuf> {
    let base = match (xdg_state_home.map(str::trim), home) {
        (Some(""), _) => bail!("Failed to resolve trace path: XDG_STATE_HOME is set but empty"),
        (Some(xdg), _) => PathBuf::from(xdg),
        (None, Some(home)) => home.join(".local").join("state"),
        (None, None) => bail!("Failed to resolve trace path: HOME directory is unavailable"),
    };
    Ok(base.join(APP_DIR).join("traces"))
}

#[cfg(test)]
mod tests {
    use super::{RunTrace, timestamp, trace_dir};
    use reqwest::Url;
    use reqwest::header::{HeaderMap, HeaderValue};
    use std::fs;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::tempdir;
    use time::macros::datetime;

    #[test]
    fn trace_dir_prefers_xdg_state_home() {
        let dir = trace_dir(Some("/tmp/state"), Some(Path::new("/home/fallback")))
            .expect("trace path");
        assert_eq!(dir, Path::new("/tmp/state/advent-agent/traces"));
    }

    #[test]
    fn trace_dir_falls_back_to_home() {
        let dir = trace_dir(None, Some(Path::new("/home/elf"))).expect("trace path");
        assert_eq!(dir, Path::new("/home/elf/.local/state/advent-agent/traces"));
    }

    #[test]
    fn trace_dir_rejects_blank_xdg_state_home() {
        let err = trace_dir(Some("   "), Some(Path::new("/home/elf"))).expect_err("blank");
        assert_eq!(
            err.to_string(),
            "Failed to resolve trace path: XDG_STATE_HOME is set but empty"
        );
    }

    #[test]
    fn trace_dir_needs_some_base() {
        let err = trace_dir(None, None).expect_err("no base");
        assert_eq!(
            err.to_string(),
            "Failed to resolve trace path: HOME directory is unavailable"
        );
    }

    #[test]
    fn timestamp_is_utc_with_millis() {
        let at = datetime!(2024-12-01 05:06:07.089 UTC);
        assert_eq!(timestamp(at), "2024-12-01T05:06:07.089Z");
    }

    #[test]
    fn stage_line_carries_padded_kind() {
        let dir = tempdir().expect("tempdir");
        let trace = RunTrace::create_in_temp_dir("abc", dir.path()).expect("trace");
        trace.log_stage("Fetched");

        let content = fs::read_to_string(trace.file_path()).expect("read trace");
        let first_line = content.lines().next().expect("line");
        assert!(first_line.starts_with("[20"));
        assert!(first_line.ends_with("Z] [stage      ] Fetched"));
    }

    #[test]
    fn multi_line_events_are_split_and_empty_events_marked() {
        let dir = tempdir().expect("tempdir");
        let trace = RunTrace::create_in_temp_dir("abc", dir.path()).expect("trace");
        trace.log_event("code", "a = 1\nresult = a");
        trace.log_event("exec.out", "");

        let content = fs::read_to_string(trace.file_path()).expect("read trace");
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[code       ] a = 1"));
        assert!(lines[1].ends_with("[code       ] result = a"));
        assert!(lines[2].ends_with("[exec.out   ] <empty>"));
    }

    #[test]
    fn http_request_lines_mask_cookie_and_query_key() {
        let dir = tempdir().expect("tempdir");
        let trace = RunTrace::create_in_temp_dir("abc", dir.path()).expect("trace");
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("session=deadbeef"));
        let url = Url::parse("https://example.com/v1?key=abc123").expect("url");

        trace.log_http_request("GET", &url, &headers, "");

        let content = fs::read_to_string(trace.file_path()).expect("read trace");
        assert!(content.contains("[http.req   ] cookie: session=***REDACTED***"));
        assert!(!content.contains("deadbeef"));
        assert!(!content.contains("abc123"));
    }

    #[cfg(unix)]
    #[test]
    fn trace_file_is_owner_only() {
        let dir = tempdir().expect("tempdir");
        let trace = RunTrace::create_in_temp_dir("abc", dir.path()).expect("trace");
        let mode = fs::metadata(trace.file_path())
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
