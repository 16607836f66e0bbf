use std::time::Duration;

use anyhow::anyhow;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::error::CompletionError;
use crate::ai::provider::{CompletionProvider, CompletionRequest};

const MAX_RETRIES: u32 = 3;

/// Gemini-style `generateContent` HTTP client. The system prompt is folded
/// into the first user part because the API has no system role in this
/// request shape. Rate limits are retried with exponential backoff; all
/// other failures map directly onto the error taxonomy.
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        // Callers sometimes configure an OpenAI-style base URL; the Gemini
        // path segment already carries the version.
        let base_url = base_url
            .strip_suffix("/v1")
            .unwrap_or(&base_url)
            .trim_end_matches('/')
            .to_string();

        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn build_payload(&self, request: &CompletionRequest) -> GenerateContentPayload {
        let text = if request.system_prompt.trim().is_empty() {
            request.user_prompt.clone()
        } else {
            format!("{}\n\n{}", request.system_prompt, request.user_prompt)
        };

        GenerateContentPayload {
            contents: vec![ContentPayload {
                role: "user".to_string(),
                parts: vec![PartPayload { text }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request
                    .json_response
                    .then(|| "application/json".to_string()),
            },
        }
    }
}

#[async_trait::async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        // The key is only checked at call time so that offline operations
        // (showing preferences, clearing memory) work unconfigured.
        if self.api_key.is_empty() {
            return Err(CompletionError::Auth(anyhow!(
                "API key is not set. Configure api.api_key in settings or export OPENAI_API_KEY"
            )));
        }

        let url = self.request_url();
        let payload = self.build_payload(&request);

        for attempt in 0..=MAX_RETRIES {
            debug!(model = %self.model, attempt, "Sending completion request");

            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        CompletionError::Network(anyhow!("completion request timed out"))
                    } else {
                        CompletionError::Network(anyhow!(
                            "failed to reach completion API at {}: {e}",
                            self.base_url
                        ))
                    }
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < MAX_RETRIES {
                    let backoff = Duration::from_secs(1 << attempt);
                    warn!(?backoff, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                return Err(CompletionError::RateLimit(anyhow!(
                    "rate limit exceeded after {MAX_RETRIES} retries"
                )));
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(CompletionError::Auth(anyhow!(
                    "authentication failed ({status}), check your API key"
                )));
            }

            if status == StatusCode::NOT_FOUND {
                return Err(CompletionError::Network(anyhow!(
                    "model not found or invalid URL (404): {}",
                    self.base_url
                )));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CompletionError::Server(anyhow!("HTTP {status}: {body}")));
            }

            let body: GenerateContentResponse = response
                .json()
                .await
                .map_err(|e| CompletionError::InvalidResponse(anyhow!(e)))?;

            let candidates = match body.candidates {
                Some(candidates) if !candidates.is_empty() => candidates,
                _ => {
                    if let Some(error) = body.error {
                        return Err(CompletionError::Server(anyhow!(
                            "API error: {}",
                            error.message.unwrap_or_else(|| "unknown".to_string())
                        )));
                    }
                    return Ok(String::new());
                }
            };

            let text: String = candidates[0]
                .content
                .as_ref()
                .map(|content| {
                    content
                        .parts
                        .iter()
                        .filter_map(|part| part.text.as_deref())
                        .collect()
                })
                .unwrap_or_default();

            return Ok(text.trim().to_string());
        }

        Err(CompletionError::RateLimit(anyhow!(
            "rate limit exceeded after {MAX_RETRIES} retries"
        )))
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentPayload {
    contents: Vec<ContentPayload>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ContentPayload {
    role: String,
    parts: Vec<PartPayload>,
}

#[derive(Debug, Serialize)]
struct PartPayload {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "response_mime_type", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(api_key: &str, base_url: &str) -> GeminiProvider {
        GeminiProvider::new(
            api_key.to_string(),
            base_url.to_string(),
            "gemini-2.0-flash".to_string(),
        )
    }

    #[test]
    fn test_base_url_normalization() {
        let provider = provider("key", "https://api.example.com/v1");
        assert_eq!(provider.base_url, "https://api.example.com");
        assert!(provider
            .request_url()
            .starts_with("https://api.example.com/v1/models/gemini-2.0-flash:generateContent"));
    }

    #[tokio::test]
    async fn test_empty_api_key_is_auth_error_at_call_time() {
        let provider = provider("", "https://api.example.com");
        let result = provider.complete(CompletionRequest::new("s", "u")).await;
        assert!(matches!(result, Err(CompletionError::Auth(_))));
    }

    #[test]
    fn test_system_prompt_folded_into_user_part() {
        let provider = provider("key", "https://api.example.com");

        let payload =
            provider.build_payload(&CompletionRequest::new("You are a test.", "Hello"));
        assert_eq!(payload.contents.len(), 1);
        assert_eq!(payload.contents[0].role, "user");
        assert_eq!(payload.contents[0].parts[0].text, "You are a test.\n\nHello");
    }

    #[test]
    fn test_json_response_sets_mime_type() {
        let provider = provider("key", "https://api.example.com");

        let payload = provider.build_payload(&CompletionRequest::new("s", "u").json());
        assert_eq!(
            payload.generation_config.response_mime_type.as_deref(),
            Some("application/json")
        );
    }
}
