use std::fmt;

use super::{PipelineError, Solved};
use crate::python::ExecutionResult;

/// Terminal outcome of a run, ready for display.
#[derive(Debug)]
pub enum Report {
    Solved(Solved),
    Aborted(PipelineError),
}

impl Report {
    pub fn from_outcome(outcome: Result<Solved, PipelineError>) -> Self {
        match outcome {
            Ok(solved) => Self::Solved(solved),
            Err(err) => Self::Aborted(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Solved(solved) if solved.result.is_success())
    }

    pub fn solved(&self) -> Option<&Solved> {
        match self {
            Self::Solved(solved) => Some(solved),
            Self::Aborted(_) => None,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solved(solved) => match &solved.result {
                ExecutionResult::Success(value) => write!(f, "Answer: {value}"),
                ExecutionResult::Failure(diagnostic) => {
                    write!(f, "Execution failed: {diagnostic}")
                }
            },
            Self::Aborted(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Report;
    use crate::pipeline::{PipelineError, Solved};
    use crate::puzzle::FormatError;
    use crate::python::{ExecutionResult, OutputSink};
    use crate::solver::{GeneratedSolution, GenerationError};

    fn solved(result: ExecutionResult) -> Report {
        Report::from_outcome(Ok(Solved {
            solution: GeneratedSolution::new("result = 42"),
            output: OutputSink::new(),
            result,
        }))
    }

    #[test]
    fn success_reports_the_answer() {
        let report = solved(ExecutionResult::Success("42".to_string()));
        assert!(report.is_success());
        assert_eq!(report.to_string(), "Answer: 42");
    }

    #[test]
    fn execution_failure_is_a_failed_report_with_diagnostic() {
        let report = solved(ExecutionResult::Failure(
            "ZeroDivisionError: division by zero".to_string(),
        ));
        assert!(!report.is_success());
        assert!(report.solved().is_some());
        assert_eq!(
            report.to_string(),
            "Execution failed: ZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn aborted_runs_surface_the_error_verbatim() {
        let report = Report::from_outcome(Err(PipelineError::Format(FormatError::MissingPartTwo)));
        assert!(!report.is_success());
        assert_eq!(
            report.to_string(),
            "format error: part two is not available for this puzzle"
        );

        let report = Report::from_outcome(Err(PipelineError::Generation(
            GenerationError::NoFunctionCall,
        )));
        assert_eq!(
            report.to_string(),
            "generation error: no function call in model response"
        );
    }
}
