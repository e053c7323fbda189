mod generator;
mod prompt;

pub use generator::{
    CODE_FIELD, GenerationError, SOLUTION_TOOL_NAME, SolutionGenerator, extract_solution,
    solution_tool,
};
pub use prompt::{Prompt, instruction_header};

/// Code returned by the model for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSolution {
    code: String,
}

impl GeneratedSolution {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}
