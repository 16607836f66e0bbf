use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveTime, Utc};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::warn;

use paperscout_core::ai::provider::CompletionProvider;
use paperscout_core::arxiv::paper::Paper;
use paperscout_core::preferences::store::PreferenceStore;
use paperscout_core::query::parser::{ParsedQuery, QueryParser};
use paperscout_core::query::time::{parse_date, TimeParser};
use paperscout_core::scoring::feedback::fragments_from_feedback;
use paperscout_core::scoring::scorer::InterestScorer;
use paperscout_core::settings::SettingsManager;

use crate::commands::{handle_local_command, LocalCommandResult};
use crate::display;
use crate::search::{execute_search, is_auth_error, to_utc, SearchRequest};

/// Queries kept as context for follow-up parsing
const QUERY_CONTEXT_LIMIT: usize = 5;

pub struct InteractiveApp {
    pub settings: SettingsManager,
    pub store: PreferenceStore,
    provider: Arc<dyn CompletionProvider>,
    scorer: InterestScorer,
    query_parser: QueryParser,
    notify_tx: mpsc::UnboundedSender<String>,
    notify_rx: mpsc::UnboundedReceiver<String>,
    query_history: Vec<String>,
    current_papers: Vec<Paper>,
}

impl InteractiveApp {
    pub fn new(settings: SettingsManager) -> Result<Self> {
        let provider = crate::build_provider(&settings);
        let store = crate::build_store(provider.clone())?;
        let scorer = InterestScorer::new(provider.clone(), store.clone());
        let query_parser = QueryParser::new(provider.clone());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        Ok(Self {
            settings,
            store,
            provider,
            scorer,
            query_parser,
            notify_tx,
            notify_rx,
            query_history: Vec::new(),
            current_papers: Vec::new(),
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;
        display::print_welcome();

        loop {
            self.drain_notifications();

            let line = match rl.readline("\x1b[35m>\x1b[0m ") {
                Ok(line) => line,
                Err(err) => match err {
                    ReadlineError::Interrupted => continue,
                    _ => break,
                },
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match handle_local_command(self, input) {
                LocalCommandResult::Handled { msg } => {
                    display::print_system(&msg);
                    continue;
                }
                LocalCommandResult::Exit => break,
                LocalCommandResult::Unhandled => (),
            }

            rl.add_history_entry(&line)?;
            self.handle_query(input, &mut rl).await;
        }

        println!("\nGoodbye!");
        Ok(())
    }

    /// Background merge notifications, printed between prompts so they never
    /// interrupt input.
    fn drain_notifications(&mut self) {
        while let Ok(notification) = self.notify_rx.try_recv() {
            display::print_notification(&notification);
        }
    }

    async fn handle_query(&mut self, query: &str, rl: &mut DefaultEditor) {
        let parsed = match self.query_parser.parse(query, &self.query_history).await {
            Ok(parsed) => parsed,
            Err(error) => {
                if error.is_auth() {
                    crate::print_auth_hint(&self.settings);
                } else {
                    display::print_error(&format!("Query parsing failed: {error}"));
                }
                return;
            }
        };

        self.query_history.push(query.to_string());
        if self.query_history.len() > QUERY_CONTEXT_LIMIT {
            self.query_history.remove(0);
        }

        let (start, end, time_label) = resolve_window(&parsed);
        let request = SearchRequest {
            topic: parsed.topic.as_deref(),
            start,
            end,
            time_label: &time_label,
            mode: self.settings.settings().search.mode,
        };

        let outcome = match execute_search(
            &self.settings,
            &self.provider,
            &self.store,
            &self.scorer,
            request,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                if is_auth_error(&error) {
                    crate::print_auth_hint(&self.settings);
                } else {
                    display::print_error(&format!("Search failed: {error}"));
                }
                return;
            }
        };

        if let Some(summary) = &outcome.summary {
            display::print_summary(summary);
        }
        display::print_papers(
            &outcome.papers,
            self.settings.settings().display.max_display,
        );
        if let Some(path) = &outcome.exported {
            display::print_system(&format!("\nResults saved to {}", path.display()));
        }

        self.current_papers = outcome.papers;
        if !self.current_papers.is_empty() {
            self.prompt_feedback(rl).await;
        }
    }

    async fn prompt_feedback(&mut self, rl: &mut DefaultEditor) {
        display::print_system(
            "\nFeedback? e.g. \"more like 2, not interested in diffusion\" (Enter to skip)",
        );
        let line = match rl.readline("\x1b[35mfeedback>\x1b[0m ") {
            Ok(line) => line,
            Err(_) => return,
        };
        let feedback = line.trim();
        if feedback.is_empty() {
            return;
        }

        let parsed = self
            .scorer
            .parse_feedback(feedback, &self.current_papers)
            .await;

        let save_to_local = self.settings.settings().display.save_to_local;
        if save_to_local {
            for entry in &parsed.feedbacks {
                let index = entry.paper_index.wrapping_sub(1);
                let Some(paper) = self.current_papers.get(index) else {
                    continue;
                };
                if let Err(error) = self.store.add_feedback(
                    &paper.arxiv_id,
                    &paper.title,
                    &entry.feedback_type,
                    &entry.reason,
                ) {
                    warn!(%error, "Failed to record feedback");
                }
            }
        }

        let fragments = fragments_from_feedback(&parsed, feedback);
        if !fragments.is_empty() && save_to_local {
            self.store
                .schedule_merge(&fragments.join("\n"), self.notify_tx.clone());
            display::print_system("Feedback saved; memory updates in the background.");
        }
    }
}

/// Turn a parsed query into a concrete UTC window plus a label for the
/// query record. Exact dates win over the phrase, which wins over the
/// one-day default.
fn resolve_window(
    parsed: &ParsedQuery,
) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>, String) {
    if let (Some(start), Some(end)) = (
        parsed.start_date.as_deref().and_then(parse_date),
        parsed.end_date.as_deref().and_then(parse_date),
    ) {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        let label = parsed
            .time_range
            .clone()
            .unwrap_or_else(|| format!("{start} to {end}"));
        return (
            to_utc(start.and_time(NaiveTime::MIN)),
            to_utc(end.and_time(end_of_day)),
            label,
        );
    }

    let time_parser = TimeParser::new(Utc::now().naive_utc());
    let label = parsed
        .time_range
        .clone()
        .unwrap_or_else(|| "last day".to_string());
    let (start, end) = time_parser.parse(&label);
    (to_utc(start), to_utc(end), label)
}
