use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::{
    AssistantInput, AssistantOutput, FunctionCall, LlmError, LlmProvider, LlmResult, error_body,
};
use crate::http::HttpClient;

/// Gemini `functionCallingConfig` mode that forbids free-text answers.
const FORCED_CALLING_MODE: &str = "ANY";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        http: HttpClient,
        api_key: Option<String>,
        model: String,
        base_url: String,
    ) -> LlmResult<Self> {
        let api_key = api_key
            .filter(|v| !v.trim().is_empty())
            .ok_or(LlmError::MissingApiKey("GEMINI_API_KEY"))?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_request(input: &AssistantInput) -> GeminiGenerateRequest {
        GeminiGenerateRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiTextPart {
                    text: input.user_message.clone(),
                }],
            }],
            tools: vec![GeminiTool {
                function_declarations: vec![GeminiFunctionDeclaration {
                    name: input.tool.name.clone(),
                    description: input.tool.description.clone(),
                    parameters_json_schema: input.tool.parameters_json_schema.clone(),
                }],
            }],
            tool_config: GeminiToolConfig {
                function_calling_config: GeminiFunctionCallingConfig {
                    mode: FORCED_CALLING_MODE,
                    allowed_function_names: vec![input.tool.name.clone()],
                },
            },
        }
    }

    fn extract_output(resp: GeminiGenerateResponse) -> AssistantOutput {
        let Some(content) = resp
            .candidates
            .into_iter()
            .find_map(|candidate| candidate.content)
        else {
            return AssistantOutput::default();
        };

        let mut output = AssistantOutput::default();
        let mut texts = Vec::new();
        for part in content.parts {
            if let Some(call) = part.function_call {
                output.function_calls.push(FunctionCall {
                    id: call.id,
                    name: call.name,
                    args_json: call.args,
                });
            }
            if let Some(text) = part.text.filter(|text| !text.trim().is_empty()) {
                texts.push(text);
            }
        }
        if !texts.is_empty() {
            output.text = Some(texts.join("\n"));
        }
        output
    }
}

impl LlmProvider for GeminiProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        let payload = Self::build_request(&input);
        let resp = self
            .http
            .post_json(
                &self.endpoint(),
                &[("key", self.api_key.as_str())],
                &[],
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

        let parsed = serde_json::from_str::<GeminiGenerateResponse>(&resp.body)
            .map_err(|err| LlmError::Parse(err.to_string()))?;
        Ok(Self::extract_output(parsed))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    tools: Vec<GeminiTool>,
    tool_config: GeminiToolConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiTextPart>,
}

#[derive(Debug, Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters_json_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionCallingConfig {
    mode: &'static str,
    allowed_function_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}
