use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::ai::error::CompletionError;
use crate::ai::provider::CompletionProvider;
use crate::preferences::compression::parse_compression_response;
use crate::preferences::data::{FeedbackRecord, PreferenceMemory, QueryRecord};
use crate::preferences::file::PreferenceFile;
use crate::preferences::prompt;

/// Hard ceiling on the memory text after any completed update.
pub const MAX_MEMORY_LEN: usize = 2000;

/// Length the compression protocol aims for. Deliberately below the ceiling;
/// the slack keeps back-to-back merges from re-triggering compression.
pub const COMPRESS_TARGET_LEN: usize = 1500;

const NO_RECORDS_SENTINEL: &str = "No preference records found";

/// Outcome of a merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing was pending; no completion call was made.
    NoUpdates,
    /// Pending fragments were folded into the memory text. `notification`
    /// is set when the merge triggered a compression.
    Merged { notification: Option<String> },
}

/// Owner of the preference memory and its mutation lock.
///
/// The drain and commit steps of a merge each take the lock; the completion
/// call runs without it, so enqueues keep working while a merge is in
/// flight. Fragments enqueued after a drain are left for the next merge.
/// Racing merges are allowed (last committer wins) - the lock only
/// guarantees no fragment is lost or duplicated.
#[derive(Clone)]
pub struct PreferenceStore {
    state: Arc<Mutex<PreferenceMemory>>,
    file: Arc<PreferenceFile>,
    provider: Arc<dyn CompletionProvider>,
}

impl PreferenceStore {
    /// Construct the store, loading the persisted snapshot if one exists.
    pub fn new(file: PreferenceFile, provider: Arc<dyn CompletionProvider>) -> Self {
        let state = file.load().unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(state)),
            file: Arc::new(file),
            provider,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PreferenceMemory> {
        self.state.lock().expect("preference store lock poisoned")
    }

    /// Stamp and persist the current state. In-memory state stays
    /// authoritative when the write fails; the next save retries.
    fn persist(&self) -> Result<()> {
        let snapshot = {
            let mut state = self.lock();
            state.last_updated = Utc::now().to_rfc3339();
            state.clone()
        };
        self.file.save(&snapshot)
    }

    fn persist_logged(&self) {
        if let Err(error) = self.persist() {
            warn!(?error, "Failed to persist preference memory");
        }
    }

    /// Append a fragment to the pending queue and persist synchronously.
    /// Duplicates are allowed; reconciling them is the merge's job. An I/O
    /// error is surfaced but the fragment stays queued in memory.
    pub fn enqueue_update(&self, fragment: &str) -> Result<()> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(());
        }

        self.lock().pending_updates.push(fragment.to_string());
        self.persist()
    }

    /// Durably enqueue a fragment, then run the merge protocol as a
    /// fire-and-forget background task. At most one notification is sent,
    /// and only when the merge triggered a compression; failures are logged
    /// and the fragments stay queued for a later attempt.
    pub fn schedule_merge(&self, fragment: &str, notify: UnboundedSender<String>) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }

        if let Err(error) = self.enqueue_update(fragment) {
            warn!(?error, "Failed to persist pending preference update");
        }

        let store = self.clone();
        tokio::spawn(async move {
            match store.merge_now().await {
                Ok(MergeOutcome::Merged {
                    notification: Some(notification),
                }) => {
                    let _ = notify.send(notification);
                }
                Ok(MergeOutcome::Merged { notification: None }) => {
                    info!("Background preference merge completed");
                }
                Ok(MergeOutcome::NoUpdates) => {}
                Err(error) => warn!(%error, "Background preference merge failed"),
            }
        });
    }

    /// Merge all currently pending fragments into the memory text.
    ///
    /// On provider failure the drained fragments are restored to the front
    /// of the queue, ahead of anything enqueued during the call, and the
    /// memory text is left untouched.
    pub async fn merge_now(&self) -> Result<MergeOutcome, CompletionError> {
        let (current_memory, pending, language) = {
            let mut state = self.lock();
            if state.pending_updates.is_empty() {
                return Ok(MergeOutcome::NoUpdates);
            }
            let pending = std::mem::take(&mut state.pending_updates);
            (state.memory.clone(), pending, state.language.clone())
        };

        let request = prompt::merge_request(&current_memory, &pending, language.as_deref());
        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(error) => {
                let mut state = self.lock();
                let enqueued_during_call = std::mem::take(&mut state.pending_updates);
                state.pending_updates = pending;
                state.pending_updates.extend(enqueued_during_call);
                return Err(error);
            }
        };

        let mut new_memory = response.trim().to_string();
        let mut notification = None;

        if new_memory.chars().count() > MAX_MEMORY_LEN {
            let (compressed, note) = self.compress(&new_memory).await;
            new_memory = compressed;
            notification = note;
        }

        {
            let mut state = self.lock();
            state.memory = new_memory;
        }
        self.persist_logged();

        Ok(MergeOutcome::Merged { notification })
    }

    /// Shrink an over-length memory text toward the target length. Never
    /// fails: a provider error degrades to hard truncation.
    pub async fn compress(&self, text: &str) -> (String, Option<String>) {
        let language = self.lock().language.clone();
        let request = prompt::compress_request(text, language.as_deref());

        match self.provider.complete(request).await {
            Ok(response) => {
                let parsed = parse_compression_response(&response);
                let mut compressed = parsed.memory;
                if compressed.chars().count() > MAX_MEMORY_LEN {
                    // The model overshot the ceiling; the size bound wins.
                    compressed = truncate_chars(&compressed, COMPRESS_TARGET_LEN);
                }

                let notification = match parsed.removed {
                    Some(removed) => format!("Memory compressed. Removed: {removed}"),
                    None => "Memory compressed to fit size limit.".to_string(),
                };
                (compressed, Some(notification))
            }
            Err(error) => {
                warn!(%error, "Memory compression failed, truncating");
                (
                    truncate_chars(text, COMPRESS_TARGET_LEN),
                    Some("Memory truncated due to size limit.".to_string()),
                )
            }
        }
    }

    /// The memory text, or a sentinel when nothing is recorded yet.
    pub fn summary(&self) -> String {
        let state = self.lock();
        if state.memory.is_empty() {
            NO_RECORDS_SENTINEL.to_string()
        } else {
            state.memory.clone()
        }
    }

    /// Preference block for scoring prompts; empty when no memory exists.
    pub fn context(&self) -> String {
        let state = self.lock();
        if state.memory.is_empty() {
            String::new()
        } else {
            format!("User Preferences:\n{}", state.memory)
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending_updates.len()
    }

    pub fn language(&self) -> Option<String> {
        self.lock().language.clone()
    }

    pub fn set_language(&self, language: &str) -> Result<()> {
        self.lock().language = Some(language.to_string());
        self.persist()
    }

    /// Reset the memory text and drop pending fragments without merging.
    pub fn clear_memory(&self) -> Result<()> {
        {
            let mut state = self.lock();
            state.memory.clear();
            state.pending_updates.clear();
        }
        self.persist()
    }

    pub fn clear_history(&self) -> Result<()> {
        {
            let mut state = self.lock();
            state.query_history.clear();
            state.feedback_history.clear();
        }
        self.persist()
    }

    pub fn clear_all(&self) -> Result<()> {
        *self.lock() = PreferenceMemory::default();
        self.persist()
    }

    pub fn add_query_record(
        &self,
        topic: &str,
        time_range: &str,
        results_count: usize,
    ) -> Result<()> {
        self.lock().push_query(QueryRecord {
            timestamp: Utc::now().to_rfc3339(),
            topic: topic.to_string(),
            time_range: time_range.to_string(),
            results_count,
        });
        self.persist()
    }

    pub fn add_feedback(
        &self,
        paper_id: &str,
        paper_title: &str,
        feedback_type: &str,
        feedback_reason: &str,
    ) -> Result<()> {
        self.lock().push_feedback(FeedbackRecord {
            timestamp: Utc::now().to_rfc3339(),
            paper_id: paper_id.to_string(),
            paper_title: paper_title.to_string(),
            feedback_type: feedback_type.to_string(),
            feedback_reason: feedback_reason.to_string(),
        });
        self.persist()
    }

    /// Snapshot of the current state, for display and tests.
    pub fn snapshot(&self) -> PreferenceMemory {
        self.lock().clone()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
