use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::ai::error::CompletionError;
use crate::ai::json::extract_json;
use crate::ai::provider::{CompletionProvider, CompletionRequest};
use crate::arxiv::paper::Paper;
use crate::preferences::store::PreferenceStore;

/// Score given to a paper when the model's answer cannot be parsed.
const NEUTRAL_SCORE: f64 = 5.0;

pub type ScoreProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Evaluates how well papers match the user's interests via the completion
/// provider. Network and auth failures propagate so the caller can abort
/// the run; everything else degrades to a neutral score.
pub struct InterestScorer {
    provider: Arc<dyn CompletionProvider>,
    store: PreferenceStore,
}

impl InterestScorer {
    pub fn new(provider: Arc<dyn CompletionProvider>, store: PreferenceStore) -> Self {
        Self { provider, store }
    }

    pub(crate) fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    fn scoring_system_prompt(&self, topic: Option<&str>, preference_context: &str) -> String {
        let language = self.store.language();
        let (reason_language, language_instruction) = match language.as_deref() {
            Some("zh") => ("Chinese", "Provide explanation in Chinese (简体中文)."),
            _ => ("English", "Provide explanation in English."),
        };

        let mut prompt = format!(
            "You are an expert AI research paper evaluator. Your task is to evaluate \
             the attractiveness of a paper to a user based on their interest preferences.\n\n\
             Scoring Criteria (0-10):\n\
             - 9-10: Perfect fit, a must-read for the user.\n\
             - 7-8: Relevant and worth paying attention to.\n\
             - 5-6: Some relevance, can be used as a reference.\n\
             - 3-4: Low relevance, not a primary focus.\n\
             - 0-2: Irrelevant or explicitly stated as not interested.\n\n\
             Please return the scoring result in JSON format:\n\
             {{\n\
                 \"score\": <float 0-10>,\n\
                 \"reason\": \"<short explanation in {reason_language}>\"\n\
             }}\n\n\
             {language_instruction}\n"
        );

        if let Some(topic) = topic {
            prompt.push_str(&format!("\n\nUser's current focus topic: {topic}"));
        }
        if !preference_context.is_empty() {
            prompt.push_str(&format!(
                "\n\nUser's historical preferences:\n{preference_context}"
            ));
        }

        prompt
    }

    fn scoring_user_prompt(paper: &Paper) -> String {
        let mut authors = paper
            .authors
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if paper.authors.len() > 5 {
            authors.push_str("...");
        }

        format!(
            "Please evaluate the following paper:\n\n\
             Title: {}\n\n\
             Abstract: {}\n\n\
             Categories: {}\n\n\
             Authors: {}\n",
            paper.title,
            paper.abstract_text,
            paper.categories.join(", "),
            authors
        )
    }

    /// Score a single paper in place.
    pub async fn score_paper(
        &self,
        paper: &mut Paper,
        topic: Option<&str>,
        use_preferences: bool,
    ) -> Result<(), CompletionError> {
        let preference_context = if use_preferences {
            self.store.context()
        } else {
            String::new()
        };
        let system_prompt = Arc::new(self.scoring_system_prompt(topic, &preference_context));

        let scored = score_single(self.provider.clone(), paper.clone(), system_prompt).await?;
        *paper = scored;
        Ok(())
    }

    /// Score papers in parallel with bounded concurrency, preserving input
    /// order in the result.
    pub async fn score_papers(
        &self,
        papers: Vec<Paper>,
        topic: Option<&str>,
        use_preferences: bool,
        max_workers: usize,
        on_progress: Option<&ScoreProgressFn>,
    ) -> Result<Vec<Paper>, CompletionError> {
        let total = papers.len();
        if total == 0 {
            return Ok(papers);
        }

        let preference_context = if use_preferences {
            self.store.context()
        } else {
            String::new()
        };
        let system_prompt = Arc::new(self.scoring_system_prompt(topic, &preference_context));
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));

        let mut join_set = JoinSet::new();
        for (index, paper) in papers.into_iter().enumerate() {
            let provider = self.provider.clone();
            let system_prompt = system_prompt.clone();
            let semaphore = semaphore.clone();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("scoring semaphore closed");
                let result = score_single(provider, paper, system_prompt).await;
                (index, result)
            });
        }

        let mut scored: Vec<Option<Paper>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.expect("scoring task panicked");
            match result {
                Ok(paper) => scored[index] = Some(paper),
                Err(error) => {
                    join_set.abort_all();
                    return Err(error);
                }
            }

            completed += 1;
            if let Some(progress) = on_progress {
                progress(completed, total);
            }
        }

        Ok(scored.into_iter().flatten().collect())
    }

    /// Coarse filter by title before full scoring. Inclusive by design: a
    /// failed batch keeps all of its papers.
    pub async fn filter_by_title(
        &self,
        papers: Vec<Paper>,
        topic: &str,
        batch_size: usize,
        max_workers: usize,
        on_progress: Option<&ScoreProgressFn>,
    ) -> Vec<Paper> {
        if papers.is_empty() || topic.is_empty() {
            return papers;
        }

        let system_prompt: Arc<str> = Arc::from(
            "You are a paper screening assistant.\n\
             Given a topic and a list of paper titles, select the titles that are likely relevant.\n\
             Be inclusive: prefer to keep borderline cases rather than exclude them.\n\n\
             Return JSON:\n\
             {\n\
               \"keep_indices\": [1, 2, 5, ...]  // 1-based indices from the provided list\n\
             }\n",
        );

        let batch_size = batch_size.max(1);
        let total = papers.len();
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut join_set = JoinSet::new();

        for (batch_index, batch) in papers.chunks(batch_size).enumerate() {
            let titles = batch
                .iter()
                .enumerate()
                .map(|(i, paper)| format!("{}. {}", i + 1, paper.title))
                .collect::<Vec<_>>()
                .join("\n");
            let user_prompt = format!("Topic: {topic}\n\nTitles:\n{titles}");

            let provider = self.provider.clone();
            let system_prompt = system_prompt.clone();
            let semaphore = semaphore.clone();
            let batch_start = batch_index * batch_size;
            let batch_len = batch.len();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("filter semaphore closed");

                let request = CompletionRequest::new(system_prompt.as_ref(), user_prompt)
                    .with_temperature(0.2)
                    .json();

                let kept: Vec<usize> = match provider.complete(request).await {
                    Ok(response) => match extract_json(&response) {
                        Some(value) => keep_indices(&value, batch_len)
                            .into_iter()
                            .map(|i| batch_start + i - 1)
                            .collect(),
                        None => (batch_start..batch_start + batch_len).collect(),
                    },
                    Err(error) => {
                        warn!(%error, "Title filter batch failed, keeping all titles");
                        (batch_start..batch_start + batch_len).collect()
                    }
                };
                (batch_len, kept)
            });
        }

        let mut kept_indices = BTreeSet::new();
        let mut processed = 0;
        while let Some(joined) = join_set.join_next().await {
            let (batch_len, kept) = joined.expect("filter task panicked");
            kept_indices.extend(kept);
            processed += batch_len;
            if let Some(progress) = on_progress {
                progress(processed.min(total), total);
            }
        }

        papers
            .into_iter()
            .enumerate()
            .filter(|(index, _)| kept_indices.contains(index))
            .map(|(_, paper)| paper)
            .collect()
    }

    /// Generate a research overview of the top-scored papers. Failures come
    /// back as an error string rather than propagating; the overview is
    /// decoration, not data.
    pub async fn summarize(&self, papers: &[Paper], topic: &str, max_papers: usize) -> String {
        let mut sorted: Vec<&Paper> = papers.iter().collect();
        sorted.sort_by(|a, b| b.interest_score.total_cmp(&a.interest_score));
        sorted.truncate(max_papers);

        let mut papers_context = String::new();
        for (i, paper) in sorted.iter().enumerate() {
            let abstract_snippet: String = paper.abstract_text.chars().take(400).collect();
            papers_context.push_str(&format!(
                "\n{}. **{}** (Score: {})\n   ArXiv: {}\n   Abstract: {}...\n",
                i + 1,
                paper.title,
                paper.interest_score,
                paper.arxiv_id,
                abstract_snippet
            ));
        }

        let language_instruction = match self.store.language().as_deref() {
            Some("zh") => "Respond in Chinese (简体中文).",
            _ => "Respond in English.",
        };

        let system_prompt = format!(
            "You are an expert at writing research paper summaries.\n\
             Write a concise yet comprehensive summary of the following papers on \"{topic}\".\n\n\
             The summary should:\n\
             1. Provide an overview of the main research themes and directions\n\
             2. Highlight the most significant or innovative papers\n\
             3. Identify common approaches and methodologies\n\
             4. Note any emerging trends or open problems\n\
             5. Be well-structured with clear sections\n\n\
             {language_instruction}\n"
        );

        let user_prompt = format!(
            "Papers to summarize:\n{papers_context}\n\n\
             Write a summary (approximately 500-800 words) that a researcher could read \
             to quickly understand the state of this topic."
        );

        let request = CompletionRequest::new(system_prompt, user_prompt)
            .with_temperature(0.5)
            .with_max_tokens(2000);

        match self.provider.complete(request).await {
            Ok(summary) => summary,
            Err(error) => format!("Error generating summary: {error}"),
        }
    }
}

async fn score_single(
    provider: Arc<dyn CompletionProvider>,
    mut paper: Paper,
    system_prompt: Arc<String>,
) -> Result<Paper, CompletionError> {
    let request = CompletionRequest::new(
        system_prompt.as_str(),
        InterestScorer::scoring_user_prompt(&paper),
    )
    .with_temperature(0.3)
    .json();

    match provider.complete(request).await {
        Ok(response) => {
            apply_score(&mut paper, &response);
            Ok(paper)
        }
        // The run cannot proceed without connectivity or credentials
        Err(error @ (CompletionError::Network(_) | CompletionError::Auth(_))) => Err(error),
        Err(error) => {
            paper.interest_score = NEUTRAL_SCORE;
            paper.interest_reason = format!("Scoring failed: {error}");
            Ok(paper)
        }
    }
}

fn apply_score(paper: &mut Paper, response: &str) {
    match extract_json(response) {
        Some(value) => {
            paper.interest_score = value
                .get("score")
                .and_then(Value::as_f64)
                .unwrap_or(NEUTRAL_SCORE);
            paper.interest_reason = value
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }
        None => {
            paper.interest_score = NEUTRAL_SCORE;
            paper.interest_reason = "Scoring failed: unparseable response".to_string();
        }
    }
}

fn keep_indices(value: &Value, batch_len: usize) -> Vec<usize> {
    value
        .get("keep_indices")
        .and_then(Value::as_array)
        .map(|indices| {
            indices
                .iter()
                .filter_map(Value::as_u64)
                .map(|i| i as usize)
                .filter(|&i| i >= 1 && i <= batch_len)
                .collect()
        })
        .unwrap_or_else(|| (1..=batch_len).collect())
}

/// Sort papers by interest score, highest first.
pub fn sort_by_interest(mut papers: Vec<Paper>) -> Vec<Paper> {
    papers.sort_by(|a, b| b.interest_score.total_cmp(&a.interest_score));
    papers
}

/// Drop papers scoring below the threshold.
pub fn filter_by_threshold(papers: Vec<Paper>, threshold: f64) -> Vec<Paper> {
    papers
        .into_iter()
        .filter(|paper| paper.interest_score >= threshold)
        .collect()
}
