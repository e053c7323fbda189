use serde::Serialize;
use std::env;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::sandbox::{
    ALLOWED_MODULES, ExecutionResult, OutputSink, RUNTIME_SOURCE, RuntimeEnvelope, Sandbox,
    SandboxLimits,
};
use crate::solver::GeneratedSolution;

const KILL_GRACE: Duration = Duration::from_secs(1);
const STDERR_TAIL_CHARS: usize = 2_000;

/// Executes each solution in a fresh `python -I` child process.
///
/// The child lowers its own address-space and CPU limits before running the
/// code; the host kills it once the wall-clock bound (plus a short grace for
/// the in-interpreter deadline to report) has passed.
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    python: String,
    limits: SandboxLimits,
}

#[derive(Debug, Error)]
pub enum ProcessSandboxError {
    #[error("failed to start python interpreter `{python}`: {source}")]
    Spawn {
        python: String,
        source: std::io::Error,
    },
    #[error("failed to talk to the solution process: {0}")]
    Io(#[from] std::io::Error),
    #[error("execution exceeded the {}s wall-clock limit", .0.as_secs_f64())]
    TimedOut(Duration),
    #[error("solution process {status}: {stderr}")]
    Terminated { status: ExitStatus, stderr: String },
    #[error("solution process returned a malformed envelope: {0}")]
    MalformedEnvelope(String),
}

#[derive(Serialize)]
struct ChildRequest<'a> {
    code: &'a str,
    input_data: &'a str,
    timeout_seconds: f64,
    allowed_modules: &'a [&'a str],
    limits: ChildLimits,
}

#[derive(Serialize)]
struct ChildLimits {
    memory_bytes: Option<u64>,
    cpu_seconds: u64,
}

impl ProcessSandbox {
    pub fn new(python: impl Into<String>, limits: SandboxLimits) -> Self {
        Self {
            python: python.into(),
            limits,
        }
    }

    async fn run_child(
        &self,
        code: &str,
        input: &str,
    ) -> Result<RuntimeEnvelope, ProcessSandboxError> {
        let request = serde_json::to_vec(&ChildRequest {
            code,
            input_data: input,
            timeout_seconds: self.limits.wall_clock.as_secs_f64(),
            allowed_modules: ALLOWED_MODULES,
            limits: ChildLimits {
                memory_bytes: self.limits.memory_bytes,
                cpu_seconds: self.limits.wall_clock.as_secs().max(1) + 1,
            },
        })
        .map_err(|err| ProcessSandboxError::MalformedEnvelope(err.to_string()))?;

        let mut command = Command::new(&self.python);
        command
            .arg("-I")
            .arg("-c")
            .arg(RUNTIME_SOURCE)
            .env_clear()
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = env::var_os("PATH") {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(|source| ProcessSandboxError::Spawn {
            python: self.python.clone(),
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&request).await?;
            stdin.shutdown().await?;
        }

        let budget = self.limits.wall_clock + KILL_GRACE;
        let output = match timeout(budget, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => return Err(ProcessSandboxError::TimedOut(self.limits.wall_clock)),
        };

        match serde_json::from_slice::<RuntimeEnvelope>(&output.stdout) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !output.status.success() => Err(ProcessSandboxError::Terminated {
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            }),
            Err(err) => Err(ProcessSandboxError::MalformedEnvelope(err.to_string())),
        }
    }
}

impl Sandbox for ProcessSandbox {
    async fn execute(
        &self,
        solution: &GeneratedSolution,
        input: &str,
        sink: &mut OutputSink,
    ) -> ExecutionResult {
        match self.run_child(solution.code(), input).await {
            Ok(envelope) => envelope.resolve(sink),
            Err(err) => ExecutionResult::Failure(format!("sandbox error: {err}")),
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - STDERR_TAIL_CHARS).collect()
}
