use anyhow::Result;
use pyo3::prelude::*;
use pyo3::types::{PyAnyMethods, PyModule};
use std::ffi::{CStr, CString};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

use super::sandbox::{
    ALLOWED_MODULES, ExecutionResult, OutputSink, RUNTIME_SOURCE, RuntimeEnvelope, Sandbox,
    SandboxLimits,
};
use crate::solver::GeneratedSolution;

const RUNTIME_MODULE_NAME: &CStr = c"_advent_agent_sandbox";
const RUNTIME_FILE_NAME: &CStr = c"sandbox_runtime.py";
const HOST_GRACE: Duration = Duration::from_secs(1);

/// Runs solutions inside the host's embedded interpreter.
///
/// Each call gets a fresh scope on its own thread, but the interpreter is
/// shared with the host and no memory limit applies. A solution that keeps
/// swallowing the in-interpreter timeout is abandoned once the host-side bound
/// expires; its thread runs on until the process exits. Only meant for
/// self-authored, trusted code.
pub struct EmbeddedSandbox {
    runtime: Arc<Py<PyModule>>,
    limits: SandboxLimits,
}

impl EmbeddedSandbox {
    pub fn initialize(limits: SandboxLimits) -> Result<Self> {
        Python::attach(|py| -> Result<Self> {
            let source = CString::new(RUNTIME_SOURCE)?;
            let runtime = PyModule::from_code(
                py,
                source.as_c_str(),
                RUNTIME_FILE_NAME,
                RUNTIME_MODULE_NAME,
            )?;
            Ok(Self {
                runtime: Arc::new(runtime.unbind()),
                limits,
            })
        })
    }
}

fn run_envelope(
    runtime: &Py<PyModule>,
    code: &str,
    input: &str,
    wall_clock: Duration,
) -> Result<RuntimeEnvelope> {
    Python::attach(|py| -> Result<RuntimeEnvelope> {
        let encoded: String = runtime
            .bind(py)
            .getattr("run_json")?
            .call1((code, input, wall_clock.as_secs_f64(), ALLOWED_MODULES.to_vec()))?
            .extract()?;
        Ok(serde_json::from_str(&encoded)?)
    })
}

impl Sandbox for EmbeddedSandbox {
    async fn execute(
        &self,
        solution: &GeneratedSolution,
        input: &str,
        sink: &mut OutputSink,
    ) -> ExecutionResult {
        let wall_clock = self.limits.wall_clock;
        let runtime = Arc::clone(&self.runtime);
        let code = solution.code().to_string();
        let input = input.to_string();
        let (done_tx, done_rx) = oneshot::channel();

        let spawned = thread::Builder::new()
            .name("embedded-solution".to_string())
            .spawn(move || {
                let _ = done_tx.send(run_envelope(&runtime, &code, &input, wall_clock));
            });
        if let Err(err) = spawned {
            return ExecutionResult::Failure(format!(
                "sandbox error: failed to start solution thread: {err}"
            ));
        }

        match timeout(wall_clock + HOST_GRACE, done_rx).await {
            Ok(Ok(Ok(envelope))) => envelope.resolve(sink),
            Ok(Ok(Err(err))) => ExecutionResult::Failure(format!("sandbox error: {err}")),
            Ok(Err(_)) => ExecutionResult::Failure(
                "sandbox error: solution thread ended without reporting".to_string(),
            ),
            Err(_) => ExecutionResult::Failure(format!(
                "TimeoutError: execution exceeded the {}s wall-clock limit",
                wall_clock.as_secs_f64()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EmbeddedSandbox;
    use crate::python::{ExecutionResult, OutputSink, Sandbox, SandboxLimits};
    use crate::solver::GeneratedSolution;
    use pyo3::prelude::Python;
    use pyo3::types::{PyAnyMethods, PyModule};
    use std::time::{Duration, Instant};

    fn sandbox() -> EmbeddedSandbox {
        EmbeddedSandbox::initialize(SandboxLimits::default()).expect("embedded sandbox")
    }

    async fn run(
        sandbox: &EmbeddedSandbox,
        code: &str,
        input: &str,
    ) -> (ExecutionResult, OutputSink) {
        let mut sink = OutputSink::new();
        let outcome = sandbox
            .execute(&GeneratedSolution::new(code), input, &mut sink)
            .await;
        (outcome, sink)
    }

    #[tokio::test]
    async fn constant_result_is_reported() {
        let (outcome, _) = run(&sandbox(), "result = 42", "anything").await;
        assert_eq!(outcome, ExecutionResult::Success("42".to_string()));
    }

    #[tokio::test]
    async fn input_binding_is_visible_as_text() {
        let (outcome, _) = run(&sandbox(), "result = int(input_data) * 2", "21").await;
        assert_eq!(outcome, ExecutionResult::Success("42".to_string()));
    }

    #[tokio::test]
    async fn scope_is_fresh_for_every_call() {
        let sandbox = sandbox();
        let (first, _) = run(&sandbox, "leftover = 1\nresult = leftover", "").await;
        assert_eq!(first, ExecutionResult::Success("1".to_string()));

        let (second, _) = run(&sandbox, "result = leftover", "").await;
        let ExecutionResult::Failure(diagnostic) = second else {
            panic!("expected failure, got {second:?}");
        };
        assert!(diagnostic.contains("NameError"), "{diagnostic}");
    }

    #[tokio::test]
    async fn raising_code_is_contained_and_host_stdout_is_untouched() {
        let sandbox = sandbox();
        let (outcome, sink) = run(&sandbox, "print('before')\nraise ValueError('boom')", "").await;

        let ExecutionResult::Failure(diagnostic) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(diagnostic.contains("ValueError: boom"));
        assert_eq!(sink.as_str(), "before\n");

        Python::attach(|py| {
            let sys = PyModule::import(py, "sys").expect("sys");
            let stdout = sys.getattr("stdout").expect("stdout");
            let original = sys.getattr("__stdout__").expect("__stdout__");
            assert_eq!(
                stdout.as_ptr(),
                original.as_ptr(),
                "host stdout must not stay redirected"
            );
        });
    }

    #[tokio::test]
    async fn printed_output_is_the_fallback_answer() {
        let (outcome, sink) = run(&sandbox(), "print(6 * 7)", "").await;
        assert_eq!(outcome, ExecutionResult::Success("42".to_string()));
        assert_eq!(sink.as_str(), "42\n");
    }

    #[tokio::test]
    async fn silent_code_without_result_reports_no_result() {
        let (outcome, _) = run(&sandbox(), "x = 1", "").await;
        assert_eq!(
            outcome,
            ExecutionResult::Failure(crate::python::NO_RESULT_DIAGNOSTIC.to_string())
        );
    }

    #[tokio::test]
    async fn file_access_builtins_are_removed() {
        let (outcome, _) = run(&sandbox(), "result = open('/etc/hostname').read()", "").await;
        let ExecutionResult::Failure(diagnostic) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(diagnostic.contains("NameError"), "{diagnostic}");
    }

    #[tokio::test]
    async fn allow_listed_imports_work() {
        let code = r#"
from collections import Counter
import math
result = math.prod(Counter(input_data).values())
"#;
        let (outcome, _) = run(&sandbox(), code, "aabbb").await;
        assert_eq!(outcome, ExecutionResult::Success("6".to_string()));
    }

    #[tokio::test]
    async fn syntax_error_becomes_failure() {
        let (outcome, _) = run(&sandbox(), "result = (", "").await;
        let ExecutionResult::Failure(diagnostic) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(diagnostic.contains("SyntaxError"), "{diagnostic}");
    }

    #[tokio::test]
    async fn runaway_loop_hits_deadline() {
        let sandbox = EmbeddedSandbox::initialize(SandboxLimits {
            wall_clock: Duration::from_millis(200),
            memory_bytes: None,
        })
        .expect("embedded sandbox");
        let (outcome, _) = run(&sandbox, "n = 0\nwhile True:\n    n += 1", "").await;
        let ExecutionResult::Failure(diagnostic) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(diagnostic.contains("TimeoutError"), "{diagnostic}");
    }

    #[tokio::test]
    async fn swallowed_timeouts_do_not_hang_the_host() {
        let sandbox = EmbeddedSandbox::initialize(SandboxLimits {
            wall_clock: Duration::from_millis(300),
            memory_bytes: None,
        })
        .expect("embedded sandbox");
        let code = r#"
while True:
    try:
        while True:
            pass
    except BaseException:
        pass
"#;

        let started = Instant::now();
        let (outcome, _) = run(&sandbox, code, "").await;

        assert!(started.elapsed() < Duration::from_secs(5));
        let ExecutionResult::Failure(diagnostic) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(diagnostic.contains("wall-clock limit"), "{diagnostic}");
    }

    #[tokio::test]
    async fn timeout_caught_once_still_fails_the_run() {
        let sandbox = EmbeddedSandbox::initialize(SandboxLimits {
            wall_clock: Duration::from_millis(200),
            memory_bytes: None,
        })
        .expect("embedded sandbox");
        let code = r#"
try:
    while True:
        pass
except BaseException:
    result = "swallowed"
"#;

        let (outcome, _) = run(&sandbox, code, "").await;
        let ExecutionResult::Failure(diagnostic) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(diagnostic.contains("TimeoutError"), "{diagnostic}");
    }

    #[tokio::test]
    async fn imports_outside_the_allow_list_are_refused() {
        let (outcome, _) = run(&sandbox(), "import sys\nresult = 1", "").await;
        let ExecutionResult::Failure(diagnostic) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(
            diagnostic.contains("import of 'sys' is not allowed"),
            "{diagnostic}"
        );
    }
}
