//! LLM-backed parsing of natural-language search queries into a time range
//! and a topic.

use std::sync::Arc;

use chrono::Local;
use serde::Deserialize;
use tracing::warn;

use crate::ai::error::CompletionError;
use crate::ai::json::extract_json;
use crate::ai::provider::{CompletionProvider, CompletionRequest};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedQuery {
    #[serde(default)]
    pub time_range: Option<String>,
    /// YYYY-MM-DD
    #[serde(default)]
    pub start_date: Option<String>,
    /// YYYY-MM-DD
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub has_time: bool,
    #[serde(default)]
    pub has_topic: bool,
    #[serde(skip)]
    pub original_query: String,
}

pub struct QueryParser {
    provider: Arc<dyn CompletionProvider>,
}

impl QueryParser {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Parse a query, using earlier queries as context so follow-ups like
    /// "and the last 3 days?" inherit the missing topic.
    pub async fn parse(
        &self,
        query: &str,
        history: &[String],
    ) -> Result<ParsedQuery, CompletionError> {
        let now = Local::now();
        let current_date = now.format("%Y-%m-%d").to_string();
        let current_day = now.format("%A").to_string();

        let system_prompt = format!(
            "You are an intelligent query parser for academic paper search.\n\
             Today's date is: {current_date} ({current_day}).\n\n\
             Your task is to extract THREE separate pieces:\n\
             1. TIME: The original temporal expression (e.g., \"last week\", \"past 3 days\").\n\
             2. START/END DATES: Calculate the exact dates based on \"Today's date\" in YYYY-MM-DD format.\n\
             3. TOPIC: Pure research subject (remove ALL non-research words).\n\n\
             CRITICAL FOR DATES:\n\
             - \"today\" -> start and end are both today's date ({current_date}).\n\
             - \"last 3 days\" -> end is today, start is 2 days ago.\n\
             - \"last week\" -> start is 7 days ago, end is today.\n\
             - \"yesterday\" -> start and end are both yesterday's date.\n\
             - If only a month is mentioned, use the full month range.\n\n\
             CRITICAL FOR CONTEXT:\n\
             - If the current query is incomplete (e.g., just a new time range or a \
             new topic), use the CONTEXT from previous queries to fill in missing pieces.\n\n\
             Return JSON:\n\
             {{\n\
                 \"time_range\": \"<time expression or null>\",\n\
                 \"start_date\": \"YYYY-MM-DD\",\n\
                 \"end_date\": \"YYYY-MM-DD\",\n\
                 \"topic\": \"<pure research keywords or null>\",\n\
                 \"has_time\": <bool>,\n\
                 \"has_topic\": <bool>\n\
             }}\n"
        );

        let mut user_prompt = String::new();
        if !history.is_empty() {
            user_prompt.push_str("Context (previous queries):\n");
            for entry in history {
                user_prompt.push_str(&format!("- {entry}\n"));
            }
            user_prompt.push('\n');
        }
        if query.trim().is_empty() {
            user_prompt.push_str("Empty query");
        } else {
            user_prompt.push_str(&format!("Current query to parse: {query}"));
        }

        let request = CompletionRequest::new(system_prompt, user_prompt)
            .with_temperature(0.1)
            .json();

        let response = self.provider.complete(request).await?;

        let mut parsed = match extract_json(&response)
            .and_then(|value| serde_json::from_value::<ParsedQuery>(value).ok())
        {
            Some(parsed) => parsed,
            None => {
                warn!("Query parser returned unusable output, passing query through");
                ParsedQuery::default()
            }
        };
        parsed.original_query = query.to_string();
        Ok(parsed)
    }
}
