use std::fmt;

use crate::python::{ALLOWED_MODULES, INPUT_BINDING, RESULT_BINDING};

use super::generator::SOLUTION_TOOL_NAME;

/// Instruction header placed in front of every statement part. It describes
/// the execution context the sandbox actually provides.
pub fn instruction_header() -> String {
    let modules = ALLOWED_MODULES.join(", ");
    format!(
        r#"You are solving an Advent of Code puzzle by writing a Python 3 program.

Rules:
1) The program must be self-contained and runnable as-is inside a provided execution context.
2) The puzzle input is already bound to the string variable `{INPUT_BINDING}`. Read it from there; do not open files, read stdin or use the network.
3) Only these standard library modules can be imported: {modules}. Every other module, including `sys` and `os`, is unavailable, so the recursion limit cannot be raised; prefer iterative algorithms.
4) Assign the final integer answer to the module-level variable `{RESULT_BINDING}`. Functions may be used, but the assignment must end up in global scope.
5) Output only code: no comments, no prose, no print statements or other extraneous output.
6) Submit the program by calling `{SOLUTION_TOOL_NAME}` with the code in the `code` field.

Puzzle statement:"#
    )
}

/// The full text sent to the model for one statement part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
}

impl Prompt {
    pub fn for_statement(part_text: &str) -> Self {
        Self {
            text: format!("{}\n\n{part_text}", instruction_header()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
