use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters_json_schema: Value,
}

/// A single-turn request in which the model must call `tool`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantInput {
    pub user_message: String,
    pub tool: FunctionDeclaration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub name: String,
    pub args_json: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssistantOutput {
    pub function_calls: Vec<FunctionCall>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("missing {0}")]
    MissingApiKey(&'static str),
    #[error("provider request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("provider parse error: {0}")]
    Parse(String),
    #[error("provider did not answer within {}s", .0.as_secs())]
    Timeout(Duration),
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

pub trait LlmProvider {
    fn generate(
        &self,
        input: AssistantInput,
    ) -> impl std::future::Future<Output = LlmResult<AssistantOutput>> + Send;
}

pub(crate) fn error_body(body: &str) -> String {
    body.chars().take(400).collect::<String>()
}
