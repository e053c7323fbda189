pub mod gemini;
pub mod openai;
pub mod provider;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    AssistantInput, AssistantOutput, FunctionCall, FunctionDeclaration, LlmError, LlmProvider,
    LlmResult,
};

/// The provider selected by configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    Gemini(GeminiProvider),
}

impl LlmProvider for AnyProvider {
    async fn generate(&self, input: AssistantInput) -> LlmResult<AssistantOutput> {
        match self {
            Self::OpenAi(provider) => provider.generate(input).await,
            Self::Gemini(provider) => provider.generate(input).await,
        }
    }
}
