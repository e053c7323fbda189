mod embedded;
mod process;
mod sandbox;

pub use embedded::EmbeddedSandbox;
pub use process::{ProcessSandbox, ProcessSandboxError};
pub use sandbox::{
    ALLOWED_MODULES, ExecutionResult, INPUT_BINDING, NO_RESULT_DIAGNOSTIC, OutputSink,
    RESULT_BINDING, Sandbox, SandboxLimits,
};

use crate::solver::GeneratedSolution;

/// The sandbox backend selected by configuration.
pub enum AnySandbox {
    Process(ProcessSandbox),
    Embedded(EmbeddedSandbox),
}

impl Sandbox for AnySandbox {
    async fn execute(
        &self,
        solution: &GeneratedSolution,
        input: &str,
        sink: &mut OutputSink,
    ) -> ExecutionResult {
        match self {
            Self::Process(sandbox) => sandbox.execute(solution, input, sink).await,
            Self::Embedded(sandbox) => sandbox.execute(solution, input, sink).await,
        }
    }
}
