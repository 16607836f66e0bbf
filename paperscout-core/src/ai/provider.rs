use crate::ai::error::CompletionError;

/// A single text-completion request. The subsystem prompts are plain text;
/// `json_response` asks the backend for a JSON-typed response body where the
/// API supports it (the scorer and query parser contracts).
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.7,
            max_tokens: 2048,
            json_response: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}
