//! Natural-language feedback parsing.
//!
//! Free-text reactions to a result list ("loved 2 and 3, skip the diffusion
//! ones") are mapped onto per-paper feedback records plus extracted
//! interest keywords, which in turn become preference memory fragments.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::ai::json::extract_json;
use crate::ai::provider::{CompletionProvider, CompletionRequest};
use crate::arxiv::paper::Paper;
use crate::scoring::scorer::InterestScorer;

#[derive(Debug, Clone, Deserialize)]
pub struct PaperFeedback {
    #[serde(default)]
    pub paper_index: usize,
    #[serde(default)]
    pub feedback_type: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedKeywords {
    #[serde(default)]
    pub interested: Vec<String>,
    #[serde(default)]
    pub not_interested: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedFeedback {
    #[serde(default)]
    pub feedbacks: Vec<PaperFeedback>,
    #[serde(default)]
    pub general_feedback: String,
    #[serde(default)]
    pub extracted_keywords: ExtractedKeywords,
}

const FEEDBACK_SYSTEM_PROMPT: &str = "\
You are a feedback parsing assistant. Users will describe their thoughts on certain papers.
Please parse the user's feedback, identifying the paper indices they mentioned and the \
corresponding feedback type and reason.

Feedback Types:
- not_interested: Not interested
- interested: Interested
- neutral: Neutral

Please return in JSON format:
{
    \"feedbacks\": [
        {
            \"paper_index\": <int index starting from 1>,
            \"feedback_type\": \"<feedback_type>\",
            \"reason\": \"<reason in English>\"
        },
        ...
    ],
    \"general_feedback\": \"<overall feedback description, if any>\",
    \"extracted_keywords\": {
        \"interested\": [\"<interested keywords in English>\"],
        \"not_interested\": [\"<not interested keywords in English>\"]
    }
}
";

impl InterestScorer {
    /// Parse free-text feedback against the displayed paper list. Never
    /// fails: an unusable response yields an empty parse.
    pub async fn parse_feedback(&self, feedback_text: &str, papers: &[Paper]) -> ParsedFeedback {
        let paper_list = papers
            .iter()
            .enumerate()
            .map(|(i, paper)| format!("{}. [{}] {}", i + 1, paper.arxiv_id, paper.title))
            .collect::<Vec<_>>()
            .join("\n");

        let user_prompt =
            format!("Current Paper List:\n{paper_list}\n\nUser Feedback: {feedback_text}\n");

        let request = CompletionRequest::new(FEEDBACK_SYSTEM_PROMPT, user_prompt)
            .with_temperature(0.3)
            .json();

        let response = match self.provider().complete(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "Feedback parsing failed");
                return ParsedFeedback {
                    general_feedback: error.to_string(),
                    ..Default::default()
                };
            }
        };

        match extract_json(&response).map(parse_feedback_value) {
            Some(parsed) => parsed,
            None => {
                warn!("Feedback response was not valid JSON");
                ParsedFeedback::default()
            }
        }
    }
}

fn parse_feedback_value(value: Value) -> ParsedFeedback {
    serde_json::from_value(value).unwrap_or_default()
}

/// Turn parsed feedback into preference memory fragments. Raw feedback is
/// only carried through when nothing structured was extracted, so the merge
/// always has at least one fragment to work with.
pub fn fragments_from_feedback(parsed: &ParsedFeedback, raw_feedback: &str) -> Vec<String> {
    let mut fragments = Vec::new();

    for feedback in &parsed.feedbacks {
        if feedback.reason.is_empty() {
            continue;
        }
        match feedback.feedback_type.as_str() {
            "interested" => {
                fragments.push(format!(
                    "User is interested in papers about: {}",
                    feedback.reason
                ));
            }
            "not_interested" => {
                fragments.push(format!("User is NOT interested in: {}", feedback.reason));
            }
            _ => {}
        }
    }

    for keyword in &parsed.extracted_keywords.interested {
        fragments.push(format!("User is interested in: {keyword}"));
    }
    for keyword in &parsed.extracted_keywords.not_interested {
        fragments.push(format!("User is NOT interested in: {keyword}"));
    }

    if fragments.is_empty() && !raw_feedback.trim().is_empty() {
        fragments.push(format!("User feedback: {}", raw_feedback.trim()));
    }

    fragments
}
