use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{
    AssistantInput, AssistantOutput, FunctionCall, LlmError, LlmProvider, LlmResult, error_body,
};
use crate::http::HttpClient;

/// OpenAI-compatible chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: HttpClient,
    authorization: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(
        http: HttpClient,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> LlmResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(LlmError::MissingApiKey("OPENAI_API_KEY"))?;

        Ok(Self {
            http,
            authorization: format!("Bearer {}", api_key.trim()),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, input: &'a AssistantInput) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &input.user_message,
            }],
            tools: vec![ChatTool {
                kind: "function",
                function: ChatFunction {
                    name: &input.tool.name,
                    description: &input.tool.description,
                    parameters: &input.tool.parameters_json_schema,
                    strict: true,
                },
            }],
            tool_choice: ChatToolChoice {
                kind: "function",
                function: ChatToolChoiceFunction {
                    name: &input.tool.name,
                },
            },
        }
    }

    fn extract_output(resp: ChatResponse) -> AssistantOutput {
        let Some(choice) = resp.choices.into_iter().next() else {
            return AssistantOutput::default();
        };

        let function_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| FunctionCall {
                id: call.id,
                name: call.function.name,
                // Undecodable arguments stay visible as a raw string so the
                // caller can reject them as a schema violation.
                args_json: serde_json::from_str(&call.function.arguments)
                    .unwrap_or(Value::String(call.function.arguments)),
            })
            .collect();

        AssistantOutput {
            function_calls,
            text: choice.message.content.filter(|text| !text.trim().is_empty()),
        }
    }
}

impl LlmProvider for OpenAiProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        let payload = self.build_request(&input);
        let resp = self
            .http
            .post_json(
                &self.endpoint(),
                &[],
                &[("authorization", self.authorization.as_str())],
                &payload,
            )
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        if !resp.is_success() {
            return Err(LlmError::HttpStatus {
                status: resp.status,
                body: error_body(&resp.body),
            });
        }

        let parsed = serde_json::from_str::<ChatResponse>(&resp.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        Ok(Self::extract_output(parsed))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    tools: Vec<ChatTool<'a>>,
    tool_choice: ChatToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ChatFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
    strict: bool,
}

#[derive(Debug, Serialize)]
struct ChatToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ChatToolChoiceFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ChatToolChoiceFunction<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: Option<String>,
    function: ChatToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct ChatToolCallFunction {
    name: String,
    arguments: String,
}
