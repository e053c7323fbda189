use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use super::GeneratedSolution;
use super::prompt::Prompt;
use crate::llm::{AssistantInput, AssistantOutput, FunctionDeclaration, LlmError, LlmProvider};

pub const SOLUTION_TOOL_NAME: &str = "submit_solution";
pub const CODE_FIELD: &str = "code";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Service(#[from] LlmError),
    #[error("no function call in model response")]
    NoFunctionCall,
    #[error("unexpected function call: {0}")]
    UnexpectedCall(String),
    #[error("invalid {SOLUTION_TOOL_NAME} arguments: {0}")]
    SchemaViolation(String),
}

impl GenerationError {
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation(_))
    }
}

/// The single tool the model is forced to call.
pub fn solution_tool() -> FunctionDeclaration {
    FunctionDeclaration {
        name: SOLUTION_TOOL_NAME.to_string(),
        description: "Submit the complete Python program that computes the puzzle answer"
            .to_string(),
        parameters_json_schema: json!({
            "type": "object",
            "properties": {
                CODE_FIELD: {
                    "type": "string",
                    "description": "Python source code assigning the answer to `result`"
                }
            },
            "required": [CODE_FIELD],
            "additionalProperties": false
        }),
    }
}

pub struct SolutionGenerator<P> {
    provider: P,
    timeout: Duration,
}

impl<P: LlmProvider> SolutionGenerator<P> {
    pub fn new(provider: P, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Issues exactly one forced tool call for `prompt`. Never retries.
    pub async fn generate(&self, prompt: &Prompt) -> Result<GeneratedSolution, GenerationError> {
        let input = AssistantInput {
            user_message: prompt.as_str().to_string(),
            tool: solution_tool(),
        };

        let output = timeout(self.timeout, self.provider.generate(input))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))??;

        extract_solution(output)
    }
}

pub fn extract_solution(output: AssistantOutput) -> Result<GeneratedSolution, GenerationError> {
    let mut calls = output.function_calls;
    let call = match calls.len() {
        0 => return Err(GenerationError::NoFunctionCall),
        1 => calls.remove(0),
        n => {
            return Err(GenerationError::UnexpectedCall(format!(
                "expected exactly one call, got {n}"
            )));
        }
    };

    if call.name != SOLUTION_TOOL_NAME {
        return Err(GenerationError::UnexpectedCall(format!(
            "undeclared function `{}`",
            call.name
        )));
    }

    let Value::Object(mut args) = call.args_json else {
        return Err(GenerationError::SchemaViolation(
            "arguments are not a JSON object".to_string(),
        ));
    };

    if let Some(extra) = args.keys().find(|key| key.as_str() != CODE_FIELD) {
        return Err(GenerationError::SchemaViolation(format!(
            "unexpected field `{extra}`"
        )));
    }

    match args.remove(CODE_FIELD) {
        Some(Value::String(code)) => Ok(GeneratedSolution::new(code)),
        Some(other) => Err(GenerationError::SchemaViolation(format!(
            "field `{CODE_FIELD}` must be a string, got {}",
            json_type_name(&other)
        ))),
        None => Err(GenerationError::SchemaViolation(format!(
            "missing required field `{CODE_FIELD}`"
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerationError, SolutionGenerator, extract_solution, solution_tool};
    use crate::llm::{
        AssistantInput, AssistantOutput, FunctionCall, LlmError, LlmProvider, LlmResult,
    };
    use crate::solver::Prompt;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone)]
    struct FakeProvider {
        response: LlmResult<AssistantOutput>,
        delay: Duration,
        seen: Arc<Mutex<Vec<AssistantInput>>>,
    }

    impl FakeProvider {
        fn replying(response: LlmResult<AssistantOutput>) -> Self {
            Self {
                response,
                delay: Duration::ZERO,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl LlmProvider for FakeProvider {
        async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
            self.seen.lock().expect("lock").push(input);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }

    fn call(name: &str, args: Value) -> AssistantOutput {
        AssistantOutput {
            function_calls: vec![FunctionCall {
                id: None,
                name: name.to_string(),
                args_json: args,
            }],
            text: None,
        }
    }

    #[test]
    fn tool_schema_requires_code_string_only() {
        let tool = solution_tool();
        assert_eq!(tool.name, "submit_solution");
        assert_eq!(
            tool.parameters_json_schema["properties"]["code"]["type"],
            json!("string")
        );
        assert_eq!(tool.parameters_json_schema["required"], json!(["code"]));
        assert_eq!(
            tool.parameters_json_schema["additionalProperties"],
            json!(false)
        );
    }

    #[tokio::test]
    async fn generate_sends_one_request_and_returns_code() {
        let provider = FakeProvider::replying(Ok(call(
            "submit_solution",
            json!({"code": "result = 42"}),
        )));
        let seen = provider.seen.clone();
        let generator = SolutionGenerator::new(provider, Duration::from_secs(5));

        let solution = generator
            .generate(&Prompt::for_statement("puzzle"))
            .await
            .expect("solution");

        assert_eq!(solution.code(), "result = 42");
        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].user_message.ends_with("puzzle"));
        assert_eq!(seen[0].tool, solution_tool());
    }

    #[tokio::test]
    async fn missing_code_field_is_schema_violation_not_service_error() {
        let generator = SolutionGenerator::new(
            FakeProvider::replying(Ok(call("submit_solution", json!({})))),
            Duration::from_secs(5),
        );
        let err = generator
            .generate(&Prompt::for_statement("puzzle"))
            .await
            .expect_err("schema violation");

        assert!(err.is_schema_violation());
        assert_eq!(
            err.to_string(),
            "invalid submit_solution arguments: missing required field `code`"
        );
    }

    #[tokio::test]
    async fn transport_failure_is_service_error() {
        let generator = SolutionGenerator::new(
            FakeProvider::replying(Err(LlmError::Transport("connection refused".to_string()))),
            Duration::from_secs(5),
        );
        let err = generator
            .generate(&Prompt::for_statement("puzzle"))
            .await
            .expect_err("transport error");

        assert!(!err.is_schema_violation());
        assert!(matches!(err, GenerationError::Service(LlmError::Transport(_))));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let mut provider =
            FakeProvider::replying(Ok(call("submit_solution", json!({"code": "result = 1"}))));
        provider.delay = Duration::from_secs(5);
        let generator = SolutionGenerator::new(provider, Duration::from_millis(50));

        let err = generator
            .generate(&Prompt::for_statement("puzzle"))
            .await
            .expect_err("timeout");
        assert_eq!(
            err,
            GenerationError::Service(LlmError::Timeout(Duration::from_millis(50)))
        );
    }

    #[test]
    fn free_text_answer_is_no_function_call() {
        let output = AssistantOutput {
            function_calls: Vec::new(),
            text: Some("print(42)".to_string()),
        };
        assert_eq!(
            extract_solution(output),
            Err(GenerationError::NoFunctionCall)
        );
    }

    #[test]
    fn multiple_calls_are_rejected() {
        let mut output = call("submit_solution", json!({"code": "result = 1"}));
        output
            .function_calls
            .push(output.function_calls[0].clone());
        let err = extract_solution(output).expect_err("two calls");
        assert!(matches!(err, GenerationError::UnexpectedCall(_)));
    }

    #[test]
    fn undeclared_function_is_rejected() {
        let err = extract_solution(call("run_shell", json!({"code": "ls"})))
            .expect_err("unknown function");
        assert_eq!(
            err.to_string(),
            "unexpected function call: undeclared function `run_shell`"
        );
    }

    #[test]
    fn non_string_code_and_extra_fields_are_schema_violations() {
        let err = extract_solution(call("submit_solution", json!({"code": 42})))
            .expect_err("number");
        assert!(err.is_schema_violation());
        assert!(err.to_string().contains("got number"));

        let err = extract_solution(call(
            "submit_solution",
            json!({"code": "result = 1", "language": "python"}),
        ))
        .expect_err("extra field");
        assert!(err.is_schema_violation());

        let err = extract_solution(call("submit_solution", json!("{broken")))
            .expect_err("raw string");
        assert!(err.is_schema_violation());
    }
}
