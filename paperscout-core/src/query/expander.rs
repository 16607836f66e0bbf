//! Topic expansion for keyword-mode search: a short or abbreviated topic is
//! turned into a cleaned core subject plus related search keywords.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::ai::error::CompletionError;
use crate::ai::json::extract_json;
use crate::ai::provider::{CompletionProvider, CompletionRequest};

const MAX_KEYWORDS: usize = 10;

const EXPANDER_SYSTEM_PROMPT: &str = "\
You are an academic search assistant. Given a research topic, your task is to:
1. Clean the topic (remove filler words like \"papers\", \"articles\", \"recent\")
2. Expand it into comprehensive search keywords

CRITICAL: First identify the CORE research subject, then expand.

Rules:
1. Clean ALL filler/time words: recent, past, find, papers, articles
2. Include the cleaned core term(s)
3. Include full forms of acronyms
4. Include related technical terms and synonyms
5. Include common variations and spellings
6. Keep keywords concise (1-4 words each)
7. Return 5-10 keywords maximum
8. Focus on distinguishing terms

Return JSON:
{
    \"cleaned_topic\": \"<pure research subject>\",
    \"keywords\": [\"keyword1\", \"keyword2\", ...]
}

Examples:
- \"RL\" -> {\"cleaned_topic\": \"RL\", \"keywords\": [\"reinforcement learning\", \"RL\", \"policy gradient\", \"Q-learning\"]}
- \"LLM\" -> {\"cleaned_topic\": \"LLM\", \"keywords\": [\"large language model\", \"LLM\", \"language model\", \"transformer\"]}
- \"transformer papers\" -> {\"cleaned_topic\": \"transformer\", \"keywords\": [\"transformer\", \"attention mechanism\", \"self-attention\"]}
- \"recent RAG\" -> {\"cleaned_topic\": \"RAG\", \"keywords\": [\"retrieval augmented generation\", \"RAG\", \"retrieval-augmented\"]}
";

pub struct TopicExpander {
    provider: Arc<dyn CompletionProvider>,
}

impl TopicExpander {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Expand a topic into `(cleaned_topic, keywords)`. Network and auth
    /// failures propagate; anything else falls back to the raw topic.
    pub async fn expand(
        &self,
        topic: &str,
        language: Option<&str>,
    ) -> Result<(String, Vec<String>), CompletionError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let user_prompt = format!(
            "Topic: {topic}\nLanguage hint: {}",
            language.unwrap_or("en")
        );
        let request = CompletionRequest::new(EXPANDER_SYSTEM_PROMPT, user_prompt)
            .with_temperature(0.3)
            .json();

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(error @ (CompletionError::Network(_) | CompletionError::Auth(_))) => {
                return Err(error)
            }
            Err(error) => {
                warn!(%error, "Keyword expansion failed, using topic as-is");
                return Ok((topic.to_string(), vec![topic.to_string()]));
            }
        };

        let Some(value) = extract_json(&response) else {
            warn!("Keyword expansion returned unusable output, using topic as-is");
            return Ok((topic.to_string(), vec![topic.to_string()]));
        };

        let cleaned_topic = value
            .get("cleaned_topic")
            .and_then(Value::as_str)
            .unwrap_or(topic)
            .to_string();

        let mut keywords: Vec<String> = value
            .get("keywords")
            .and_then(Value::as_array)
            .map(|keywords| {
                keywords
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        if keywords.is_empty() {
            keywords.push(cleaned_topic.clone());
        }
        keywords.truncate(MAX_KEYWORDS);

        Ok((cleaned_topic, keywords))
    }
}
