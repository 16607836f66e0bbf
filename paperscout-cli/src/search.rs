//! The search pipeline shared by the interactive loop and the one-shot
//! `search` subcommand: fetch -> (filter) -> score -> threshold -> sort ->
//! summarize -> export.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use paperscout_core::ai::error::CompletionError;
use paperscout_core::ai::provider::CompletionProvider;
use paperscout_core::arxiv::fetcher::ArxivFetcher;
use paperscout_core::arxiv::paper::Paper;
use paperscout_core::output::markdown::export_results;
use paperscout_core::preferences::store::PreferenceStore;
use paperscout_core::query::expander::TopicExpander;
use paperscout_core::query::time::TimeParser;
use paperscout_core::scoring::scorer::{filter_by_threshold, sort_by_interest, InterestScorer};
use paperscout_core::settings::config::SearchMode;
use paperscout_core::settings::SettingsManager;

use crate::display;

/// Title-filter batch size in exhaustive mode
const TITLE_FILTER_BATCH: usize = 20;

pub struct SearchRequest<'a> {
    pub topic: Option<&'a str>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub time_label: &'a str,
    pub mode: SearchMode,
}

pub struct SearchOutcome {
    pub papers: Vec<Paper>,
    pub summary: Option<String>,
    pub exported: Option<PathBuf>,
}

pub fn to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(naive, Utc)
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn progress_bar(total: usize, message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
            .expect("invalid progress template"),
    );
    bar.set_message(message);
    bar
}

pub async fn execute_search(
    settings: &SettingsManager,
    provider: &Arc<dyn CompletionProvider>,
    store: &PreferenceStore,
    scorer: &InterestScorer,
    request: SearchRequest<'_>,
) -> Result<SearchOutcome> {
    let config = settings.settings();
    let fetcher = ArxivFetcher::new(config.search.categories.clone())?;

    // Keyword mode refines the topic during expansion; track the refined
    // form for scoring, summaries, and the query record.
    let mut topic = request.topic.map(String::from);

    let fetch_bar = spinner("Fetching papers...");
    let on_fetch = {
        let fetch_bar = fetch_bar.clone();
        move |count: usize| fetch_bar.set_message(format!("Fetched {count} papers"))
    };

    let papers = match request.mode {
        SearchMode::Exhaustive => {
            let (papers, diag) = fetcher
                .fetch_all(
                    request.start,
                    request.end,
                    true,
                    config.search.exhaustive_max_results,
                    Some(&on_fetch),
                )
                .await?;
            fetch_bar.finish_and_clear();

            if papers.is_empty() {
                display::print_system(&format!(
                    "No papers in this window (scanned {} listings).",
                    diag.raw_count
                ));
                papers
            } else if let Some(topic) = topic.as_deref() {
                let filter_bar = progress_bar(papers.len(), "Filtering titles");
                let on_filter = {
                    let filter_bar = filter_bar.clone();
                    move |current: usize, _total: usize| filter_bar.set_position(current as u64)
                };
                let kept = scorer
                    .filter_by_title(
                        papers,
                        topic,
                        TITLE_FILTER_BATCH,
                        config.search.max_workers,
                        Some(&on_filter),
                    )
                    .await;
                filter_bar.finish_and_clear();
                kept
            } else {
                papers
            }
        }
        SearchMode::Keyword => {
            let keywords = match request.topic {
                Some(raw_topic) => {
                    let expander = TopicExpander::new(provider.clone());
                    let (cleaned, keywords) =
                        expander.expand(raw_topic, store.language().as_deref()).await?;
                    if !cleaned.is_empty() {
                        topic = Some(cleaned);
                    }
                    Some(keywords)
                }
                None => None,
            };

            let papers = fetcher
                .fetch_window(
                    request.start,
                    request.end,
                    config.search.max_results,
                    keywords.as_deref(),
                    false,
                    Some(&on_fetch),
                )
                .await?;
            fetch_bar.finish_and_clear();
            papers
        }
    };

    if papers.is_empty() {
        return Ok(SearchOutcome {
            papers,
            summary: None,
            exported: None,
        });
    }

    let score_bar = progress_bar(papers.len(), "Scoring papers");
    let on_score = {
        let score_bar = score_bar.clone();
        move |current: usize, _total: usize| score_bar.set_position(current as u64)
    };
    let scored = scorer
        .score_papers(
            papers,
            topic.as_deref(),
            true,
            config.search.max_workers,
            Some(&on_score),
        )
        .await?;
    score_bar.finish_and_clear();

    let papers = sort_by_interest(filter_by_threshold(
        scored,
        config.search.interest_threshold,
    ));

    let summary = if config.display.auto_summary && !papers.is_empty() {
        let summary_bar = spinner("Generating summary...");
        let summary = scorer
            .summarize(
                &papers,
                topic.as_deref().unwrap_or("General"),
                config.display.summary_top_papers,
            )
            .await;
        summary_bar.finish_and_clear();
        Some(summary)
    } else {
        None
    };

    let exported = if config.display.save_results && !papers.is_empty() {
        let output_dir = config
            .display
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("outputs"));
        match export_results(&output_dir, &papers, topic.as_deref(), summary.as_deref()) {
            Ok(path) => Some(path),
            Err(error) => {
                warn!(%error, "Failed to export results");
                None
            }
        }
    } else {
        None
    };

    if config.display.save_to_local {
        if let Err(error) =
            store.add_query_record(topic.as_deref().unwrap_or(""), request.time_label, papers.len())
        {
            warn!(%error, "Failed to record query");
        }
    }

    Ok(SearchOutcome {
        papers,
        summary,
        exported,
    })
}

/// One-shot `paperscout search` entry point.
pub async fn run_search(
    settings: SettingsManager,
    time: String,
    topic: Option<String>,
    mode: Option<String>,
) -> Result<()> {
    let provider = crate::build_provider(&settings);
    let store = crate::build_store(provider.clone())?;
    let scorer = InterestScorer::new(provider.clone(), store.clone());

    let mode = match mode.as_deref() {
        Some("keyword") => SearchMode::Keyword,
        Some("exhaustive") => SearchMode::Exhaustive,
        Some(other) => {
            display::print_error(&format!("Unknown mode {other:?}, using configured default"));
            settings.settings().search.mode
        }
        None => settings.settings().search.mode,
    };

    let parser = TimeParser::new(Utc::now().naive_utc());
    let (start, end) = parser.parse(&time);

    let request = SearchRequest {
        topic: topic.as_deref(),
        start: to_utc(start),
        end: to_utc(end),
        time_label: &time,
        mode,
    };

    let outcome = match execute_search(&settings, &provider, &store, &scorer, request).await {
        Ok(outcome) => outcome,
        Err(error) => {
            if is_auth_error(&error) {
                crate::print_auth_hint(&settings);
                return Ok(());
            }
            return Err(error);
        }
    };

    if let Some(summary) = &outcome.summary {
        display::print_summary(summary);
    }
    display::print_papers(&outcome.papers, settings.settings().display.max_display);
    if let Some(path) = &outcome.exported {
        display::print_system(&format!("\nResults saved to {}", path.display()));
    }

    // Fold any fragments left over from previous sessions while we are here
    if store.pending_count() > 0 {
        match store.merge_now().await {
            Ok(_) => display::print_system("Preference memory updated."),
            Err(error) if error.is_auth() => crate::print_auth_hint(&settings),
            Err(error) => warn!(%error, "Deferred preference merge failed"),
        }
    }

    Ok(())
}

pub fn is_auth_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<CompletionError>()
        .is_some_and(CompletionError::is_auth)
}
