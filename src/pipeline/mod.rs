mod report;

pub use report::Report;

use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::llm::LlmProvider;
use crate::puzzle::{
    FetchError, FormatError, ParseError, Part, PuzzleFetcher, PuzzleStatement, parse_statement,
};
use crate::python::{ExecutionResult, OutputSink, Sandbox};
use crate::solver::{GeneratedSolution, GenerationError, Prompt, SolutionGenerator};
use crate::trace::RunTrace;

/// Forward-only progress of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Fetched,
    Parsed,
    PromptBuilt,
    Generated,
    Executed,
    Reported,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetched => "Fetched",
            Self::Parsed => "Parsed",
            Self::PromptBuilt => "PromptBuilt",
            Self::Generated => "Generated",
            Self::Executed => "Executed",
            Self::Reported => "Reported",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("input error: failed to read {}: {source}", path.display())]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where the puzzle input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Text(String),
    File(PathBuf),
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveRequest {
    pub day: u8,
    pub part: Part,
    pub input: InputSource,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solved {
    pub solution: GeneratedSolution,
    pub output: OutputSink,
    pub result: ExecutionResult,
}

pub struct Pipeline<P, S> {
    fetcher: PuzzleFetcher,
    generator: SolutionGenerator<P>,
    sandbox: S,
    trace: Option<RunTrace>,
}

impl<P: LlmProvider, S: Sandbox> Pipeline<P, S> {
    pub fn new(fetcher: PuzzleFetcher, generator: SolutionGenerator<P>, sandbox: S) -> Self {
        Self {
            fetcher,
            generator,
            sandbox,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: RunTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Runs every stage and always ends in [`Stage::Reported`].
    pub async fn run(&self, request: SolveRequest) -> Report {
        let outcome = self.solve(request).await;
        if let Err(err) = &outcome {
            self.log_event("error", &err.to_string());
        }
        self.enter(Stage::Reported);
        Report::from_outcome(outcome)
    }

    /// Advances Fetched → Executed. The first error aborts the run.
    pub async fn solve(&self, request: SolveRequest) -> Result<Solved, PipelineError> {
        let document = self.fetcher.fetch_puzzle(request.day).await?;
        let input = self.load_input(&request).await?;
        self.enter(Stage::Fetched);

        let text = parse_statement(&document)?;
        let statement = PuzzleStatement::split(&text)?;
        let part_text = statement.part(request.part)?;
        self.enter(Stage::Parsed);

        let prompt = Prompt::for_statement(part_text);
        self.log_event("prompt", prompt.as_str());
        self.enter(Stage::PromptBuilt);

        let solution = self.generator.generate(&prompt).await?;
        self.log_event("code", solution.code());
        self.enter(Stage::Generated);

        let mut output = OutputSink::new();
        let result = self.sandbox.execute(&solution, &input, &mut output).await;
        self.log_event("exec.out", output.as_str());
        match &result {
            ExecutionResult::Success(value) => self.log_event("result", value),
            ExecutionResult::Failure(diagnostic) => {
                self.log_event("result", &format!("failure: {diagnostic}"))
            }
        }
        self.enter(Stage::Executed);

        Ok(Solved {
            solution,
            output,
            result,
        })
    }

    async fn load_input(&self, request: &SolveRequest) -> Result<String, PipelineError> {
        match &request.input {
            InputSource::Text(text) => Ok(text.clone()),
            InputSource::File(path) => {
                fs::read_to_string(path).map_err(|source| PipelineError::Input {
                    path: path.clone(),
                    source,
                })
            }
            InputSource::Download => Ok(self.fetcher.fetch_input(request.day).await?),
        }
    }

    fn enter(&self, stage: Stage) {
        if let Some(trace) = &self.trace {
            trace.log_stage(stage.as_str());
        }
    }

    fn log_event(&self, kind: &str, text: &str) {
        if let Some(trace) = &self.trace {
            trace.log_event(kind, text);
        }
    }
}
