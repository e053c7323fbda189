use serde::Deserialize;
use std::time::Duration;

use crate::solver::GeneratedSolution;

/// Name of the binding that holds the raw puzzle input inside the sandbox.
pub const INPUT_BINDING: &str = "input_data";
/// Name of the binding inspected after execution to obtain the answer.
pub const RESULT_BINDING: &str = "result";

/// Standard library modules a solution may import. Everything else is refused.
pub const ALLOWED_MODULES: &[&str] = &[
    "array",
    "bisect",
    "collections",
    "copy",
    "dataclasses",
    "decimal",
    "enum",
    "fractions",
    "functools",
    "hashlib",
    "heapq",
    "itertools",
    "math",
    "numbers",
    "operator",
    "re",
    "statistics",
    "string",
    "typing",
];

pub const NO_RESULT_DIAGNOSTIC: &str = "no result produced";

pub(crate) const RUNTIME_SOURCE: &str = include_str!("sandbox_runtime.py");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Success(String),
    Failure(String),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Receives everything a generated program prints while it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSink {
    captured: String,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.captured
    }

    pub fn is_empty(&self) -> bool {
        self.captured.is_empty()
    }

    pub fn into_string(self) -> String {
        self.captured
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.captured.push_str(text);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub wall_clock: Duration,
    pub memory_bytes: Option<u64>,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            wall_clock: Duration::from_secs(10),
            memory_bytes: Some(1024 * 1024 * 1024),
        }
    }
}

/// Runs untrusted generated code against the puzzle input.
///
/// Implementations never fail: every problem raised by the generated program,
/// or by the machinery running it, comes back as [`ExecutionResult::Failure`].
pub trait Sandbox {
    fn execute(
        &self,
        solution: &GeneratedSolution,
        input: &str,
        sink: &mut OutputSink,
    ) -> impl std::future::Future<Output = ExecutionResult> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct RuntimeEnvelope {
    pub ok: bool,
    pub has_result: bool,
    pub result: Option<String>,
    #[serde(default)]
    pub stdout: String,
    pub exception: Option<RuntimeException>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct RuntimeException {
    pub exc_type: String,
    pub message: String,
    #[serde(default)]
    pub traceback: String,
}

impl RuntimeException {
    fn diagnostic(&self) -> String {
        let traceback = self.traceback.trim_end();
        if traceback.is_empty() {
            format!("{}: {}", self.exc_type, self.message)
        } else {
            traceback.to_string()
        }
    }
}

impl RuntimeEnvelope {
    /// Moves captured output into `sink` and decides the outcome: the result
    /// binding wins, captured output is the fallback.
    pub(crate) fn resolve(self, sink: &mut OutputSink) -> ExecutionResult {
        sink.push(&self.stdout);

        if !self.ok {
            return ExecutionResult::Failure(
                self.exception
                    .map(|exc| exc.diagnostic())
                    .unwrap_or_else(|| "solution failed without an exception payload".to_string()),
            );
        }

        match self.result {
            Some(value) if self.has_result => ExecutionResult::Success(value),
            _ => {
                let printed = self.stdout.trim();
                if printed.is_empty() {
                    ExecutionResult::Failure(NO_RESULT_DIAGNOSTIC.to_string())
                } else {
                    ExecutionResult::Success(printed.to_string())
                }
            }
        }
    }
}
