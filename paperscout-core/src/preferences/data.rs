use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query history entries kept before the oldest are dropped.
pub const QUERY_HISTORY_CAP: usize = 50;

/// Feedback history entries kept before the oldest are dropped.
pub const FEEDBACK_HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub timestamp: String,
    pub topic: String,
    pub time_range: String,
    pub results_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: String,
    pub paper_id: String,
    pub paper_title: String,
    pub feedback_type: String,
    pub feedback_reason: String,
}

/// The persisted preference state. `memory` is the canonical natural-language
/// description of the user's interests; `pending_updates` holds fragments
/// that have not been merged into it yet, in arrival order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceMemory {
    #[serde(default)]
    pub memory: String,

    #[serde(default)]
    pub pending_updates: Vec<String>,

    #[serde(default)]
    pub query_history: Vec<QueryRecord>,

    #[serde(default)]
    pub feedback_history: Vec<FeedbackRecord>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub last_updated: String,
}

impl PreferenceMemory {
    /// Deserialize a stored snapshot, migrating the legacy keyword-list
    /// schema when no memory text is present.
    pub fn from_json(value: Value) -> Result<Self> {
        let mut memory: PreferenceMemory =
            serde_json::from_value(value.clone()).context("Failed to parse preference file")?;

        if memory.memory.is_empty() {
            if let Some(text) = migrate_legacy_fields(&value) {
                memory.memory = text;
            }
        }

        Ok(memory)
    }

    pub fn push_query(&mut self, record: QueryRecord) {
        self.query_history.push(record);
        truncate_front(&mut self.query_history, QUERY_HISTORY_CAP);
    }

    pub fn push_feedback(&mut self, record: FeedbackRecord) {
        self.feedback_history.push(record);
        truncate_front(&mut self.feedback_history, FEEDBACK_HISTORY_CAP);
    }
}

fn truncate_front<T>(entries: &mut Vec<T>, cap: usize) {
    if entries.len() > cap {
        entries.drain(..entries.len() - cap);
    }
}

/// One-shot migration from the schema that stored discrete keyword lists.
/// Renders each legacy list in a fixed order and joins them into the initial
/// memory text. Returns None when no legacy data is present.
fn migrate_legacy_fields(value: &Value) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(joined) = join_legacy_list(value, "interested_keywords") {
        parts.push(format!("Interested in: {joined}"));
    }
    if let Some(joined) = join_legacy_list(value, "not_interested_keywords") {
        parts.push(format!("Not interested in: {joined}"));
    }
    if let Some(joined) = join_legacy_list(value, "interested_topics") {
        parts.push(format!("Interested topics: {joined}"));
    }
    if let Some(joined) = join_legacy_list(value, "not_interested_topics") {
        parts.push(format!("Topics to avoid: {joined}"));
    }
    if let Some(custom) = value.get("custom_preferences").and_then(Value::as_str) {
        if !custom.is_empty() {
            parts.push(custom.to_string());
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn join_legacy_list(value: &Value, field: &str) -> Option<String> {
    let items: Vec<&str> = value
        .get(field)?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_migrates_legacy_fields_in_order() {
        let legacy = json!({
            "interested_keywords": ["RAG", "agents"],
            "not_interested_keywords": ["GANs"],
            "interested_topics": ["multimodal learning"],
            "not_interested_topics": ["quantum computing"],
            "custom_preferences": "Prefers practical papers."
        });

        let memory = PreferenceMemory::from_json(legacy).unwrap();
        assert_eq!(
            memory.memory,
            "Interested in: RAG, agents Not interested in: GANs \
             Interested topics: multimodal learning Topics to avoid: quantum computing \
             Prefers practical papers."
        );
    }

    #[test]
    fn test_migration_skipped_when_memory_present() {
        let stored = json!({
            "memory": "Likes reinforcement learning.",
            "interested_keywords": ["RAG"]
        });

        let memory = PreferenceMemory::from_json(stored).unwrap();
        assert_eq!(memory.memory, "Likes reinforcement learning.");
    }

    #[test]
    fn test_migration_with_partial_legacy_data() {
        let legacy = json!({ "not_interested_topics": ["theory"] });
        let memory = PreferenceMemory::from_json(legacy).unwrap();
        assert_eq!(memory.memory, "Topics to avoid: theory");
    }

    #[test]
    fn test_empty_file_yields_default() {
        let memory = PreferenceMemory::from_json(json!({})).unwrap();
        assert!(memory.memory.is_empty());
        assert!(memory.pending_updates.is_empty());
    }

    #[test]
    fn test_query_history_cap() {
        let mut memory = PreferenceMemory::default();
        for i in 0..QUERY_HISTORY_CAP + 5 {
            memory.push_query(QueryRecord {
                timestamp: String::new(),
                topic: format!("topic-{i}"),
                time_range: "last week".to_string(),
                results_count: i,
            });
        }

        assert_eq!(memory.query_history.len(), QUERY_HISTORY_CAP);
        // Oldest dropped first
        assert_eq!(memory.query_history[0].topic, "topic-5");
    }

    #[test]
    fn test_feedback_history_cap() {
        let mut memory = PreferenceMemory::default();
        for i in 0..FEEDBACK_HISTORY_CAP + 3 {
            memory.push_feedback(FeedbackRecord {
                timestamp: String::new(),
                paper_id: format!("2401.{i:05}"),
                paper_title: String::new(),
                feedback_type: "interested".to_string(),
                feedback_reason: String::new(),
            });
        }

        assert_eq!(memory.feedback_history.len(), FEEDBACK_HISTORY_CAP);
        assert_eq!(memory.feedback_history[0].paper_id, "2401.00003");
    }
}
