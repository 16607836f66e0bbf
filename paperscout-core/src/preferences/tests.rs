use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::ai::error::CompletionError;
use crate::ai::mock::{MockBehavior, MockProvider};
use crate::preferences::file::PreferenceFile;
use crate::preferences::store::{
    MergeOutcome, PreferenceStore, COMPRESS_TARGET_LEN, MAX_MEMORY_LEN,
};

fn test_store(behavior: MockBehavior) -> (PreferenceStore, Arc<MockProvider>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let file = PreferenceFile::new(temp_dir.path().join("preferences.json"));
    let provider = Arc::new(MockProvider::new(behavior));
    let store = PreferenceStore::new(file, provider.clone());
    (store, provider, temp_dir)
}

fn pending(store: &PreferenceStore) -> Vec<String> {
    store.snapshot().pending_updates
}

// The compression prompt targets 1500 but the enforced ceiling is 2000.
// The slack is intentional; neither constant may absorb the other.
#[test]
fn test_target_and_ceiling_are_distinct_constants() {
    assert_eq!(MAX_MEMORY_LEN, 2000);
    assert_eq!(COMPRESS_TARGET_LEN, 1500);
    assert!(COMPRESS_TARGET_LEN < MAX_MEMORY_LEN);
}

// P1/P4: failed merges never lose fragments, and re-queued fragments keep
// their position ahead of later arrivals.
#[tokio::test]
async fn test_failed_merges_preserve_fragments_and_order() {
    let (store, provider, _dir) = test_store(MockBehavior::AlwaysNetworkError);

    store.enqueue_update("a").unwrap();
    store.enqueue_update("b").unwrap();

    let result = store.merge_now().await;
    assert!(matches!(result, Err(CompletionError::Network(_))));
    assert_eq!(pending(&store), vec!["a", "b"]);

    store.enqueue_update("c").unwrap();
    assert!(store.merge_now().await.is_err());
    assert_eq!(pending(&store), vec!["a", "b", "c"]);

    // Next successful merge folds everything in, nothing left behind
    provider.set_behavior(MockBehavior::EchoUserPrompt);
    let outcome = store.merge_now().await.unwrap();
    assert!(matches!(outcome, MergeOutcome::Merged { .. }));
    assert!(pending(&store).is_empty());

    let memory = store.snapshot().memory;
    for fragment in ["a", "b", "c"] {
        assert!(memory.contains(fragment));
    }
}

// P2: a completed merge never leaves the memory above the ceiling.
#[tokio::test]
async fn test_oversized_merge_result_is_compressed() {
    let (store, provider, _dir) = test_store(MockBehavior::BehaviorQueue {
        behaviors: vec![
            MockBehavior::Respond("x".repeat(2500)),
            MockBehavior::Respond(format!("COMPRESSED_MEMORY:\n{}", "y".repeat(1200))),
        ],
    });

    store.enqueue_update("likes transformers").unwrap();
    let outcome = store.merge_now().await.unwrap();

    assert_eq!(provider.call_count(), 2);
    assert!(matches!(
        outcome,
        MergeOutcome::Merged {
            notification: Some(_)
        }
    ));
    assert!(store.snapshot().memory.chars().count() <= MAX_MEMORY_LEN);
}

// P2, hostile model: even a compression result above the ceiling is clamped.
#[tokio::test]
async fn test_overshooting_compression_is_clamped() {
    let (store, _provider, _dir) = test_store(MockBehavior::BehaviorQueue {
        behaviors: vec![
            MockBehavior::Respond("x".repeat(2500)),
            MockBehavior::Respond("z".repeat(2600)),
        ],
    });

    store.enqueue_update("anything").unwrap();
    store.merge_now().await.unwrap();

    let memory = store.snapshot().memory;
    assert_eq!(memory.chars().count(), COMPRESS_TARGET_LEN);
}

// P3: merging with nothing pending is a no-op with no external call.
#[tokio::test]
async fn test_merge_with_no_pending_updates_is_noop() {
    let (store, provider, _dir) = test_store(MockBehavior::Respond("Likes RL.".to_string()));

    store.enqueue_update("likes RL").unwrap();
    store.merge_now().await.unwrap();
    let before = store.snapshot();
    let calls_before = provider.call_count();

    let outcome = store.merge_now().await.unwrap();

    assert_eq!(outcome, MergeOutcome::NoUpdates);
    assert_eq!(provider.call_count(), calls_before);
    let after = store.snapshot();
    assert_eq!(after.memory, before.memory);
    assert_eq!(after.last_updated, before.last_updated);
}

// P5: compression runs exactly when the merge result exceeds the ceiling.
#[tokio::test]
async fn test_result_at_ceiling_is_not_compressed() {
    let (store, provider, _dir) =
        test_store(MockBehavior::Respond("x".repeat(MAX_MEMORY_LEN)));

    store.enqueue_update("anything").unwrap();
    let outcome = store.merge_now().await.unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(outcome, MergeOutcome::Merged { notification: None });
    assert_eq!(store.snapshot().memory.chars().count(), MAX_MEMORY_LEN);
}

#[tokio::test]
async fn test_result_one_over_ceiling_is_compressed() {
    let (store, provider, _dir) = test_store(MockBehavior::BehaviorQueue {
        behaviors: vec![
            MockBehavior::Respond("x".repeat(MAX_MEMORY_LEN + 1)),
            MockBehavior::Respond("COMPRESSED_MEMORY:\nshort".to_string()),
        ],
    });

    store.enqueue_update("anything").unwrap();
    let outcome = store.merge_now().await.unwrap();

    assert_eq!(provider.call_count(), 2);
    assert!(matches!(
        outcome,
        MergeOutcome::Merged {
            notification: Some(_)
        }
    ));
    assert_eq!(store.snapshot().memory, "short");
}

// Scenario A: first fragment lands in an empty memory.
#[tokio::test]
async fn test_first_merge_into_empty_memory() {
    let (store, _provider, _dir) = test_store(MockBehavior::EchoUserPrompt);

    store
        .enqueue_update("User likes reinforcement learning")
        .unwrap();
    store.merge_now().await.unwrap();

    let snapshot = store.snapshot();
    assert!(!snapshot.memory.is_empty());
    assert!(snapshot.memory.contains("User likes reinforcement learning"));
    assert!(snapshot.pending_updates.is_empty());
}

// Scenario B: compression of a 2100-char memory.
#[tokio::test]
async fn test_compress_success_reports_removed_topics() {
    let (store, _provider, _dir) = test_store(MockBehavior::Respond(
        "COMPRESSED_MEMORY:\nLikes RL.\nREMOVED_TOPICS:\nGAN interests".to_string(),
    ));

    let input: String = "abcdefghij".repeat(210);
    let (compressed, notification) = store.compress(&input).await;

    assert!(compressed.chars().count() <= MAX_MEMORY_LEN);
    assert_eq!(compressed, "Likes RL.");
    assert!(notification.unwrap().contains("GAN interests"));
}

#[tokio::test]
async fn test_compress_failure_truncates() {
    let (store, _provider, _dir) = test_store(MockBehavior::AlwaysNetworkError);

    let input: String = "abcdefghij".repeat(210);
    let (compressed, notification) = store.compress(&input).await;

    let expected: String = input.chars().take(COMPRESS_TARGET_LEN).collect();
    assert_eq!(compressed, expected);
    assert!(notification.unwrap().contains("truncated"));
}

// Scenario C: concurrent enqueues all land in a single merge, undoubled.
#[tokio::test]
async fn test_concurrent_enqueues_drained_by_single_merge() {
    let (store, provider, _dir) = test_store(MockBehavior::EchoUserPrompt);

    let store_a = store.clone();
    let store_b = store.clone();
    let thread_a = std::thread::spawn(move || store_a.enqueue_update("fragment-one").unwrap());
    let thread_b = std::thread::spawn(move || store_b.enqueue_update("fragment-two").unwrap());
    thread_a.join().unwrap();
    thread_b.join().unwrap();

    store.merge_now().await.unwrap();

    assert!(pending(&store).is_empty());
    let request = provider.last_captured_request().unwrap();
    assert_eq!(request.user_prompt.matches("fragment-one").count(), 1);
    assert_eq!(request.user_prompt.matches("fragment-two").count(), 1);
}

// Scenario D: auth failures are distinguished and change nothing.
#[tokio::test]
async fn test_auth_error_surfaced_with_state_unchanged() {
    let (store, _provider, _dir) = test_store(MockBehavior::AlwaysAuthError);

    store.enqueue_update("a").unwrap();
    store.enqueue_update("b").unwrap();

    let error = store.merge_now().await.unwrap_err();
    assert!(error.is_auth());
    assert_eq!(pending(&store), vec!["a", "b"]);
    assert_eq!(store.snapshot().memory, "");
}

#[tokio::test]
async fn test_pending_updates_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("preferences.json");
    let provider = Arc::new(MockProvider::new(MockBehavior::EchoUserPrompt));

    {
        let store = PreferenceStore::new(PreferenceFile::new(path.clone()), provider.clone());
        store.enqueue_update("queued before exit").unwrap();
    }

    let store = PreferenceStore::new(PreferenceFile::new(path.clone()), provider.clone());
    assert_eq!(pending(&store), vec!["queued before exit"]);

    store.merge_now().await.unwrap();

    let store = PreferenceStore::new(PreferenceFile::new(path), provider);
    assert!(store.snapshot().memory.contains("queued before exit"));
    assert!(pending(&store).is_empty());
}

#[tokio::test]
async fn test_schedule_merge_notifies_on_compression() {
    let (store, _provider, _dir) = test_store(MockBehavior::BehaviorQueue {
        behaviors: vec![
            MockBehavior::Respond("x".repeat(2500)),
            MockBehavior::Respond(
                "COMPRESSED_MEMORY:\nLikes RL.\nREMOVED_TOPICS:\nOld topics".to_string(),
            ),
        ],
    });
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    store.schedule_merge("likes RL", tx);

    let notification = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification should arrive")
        .expect("channel should not close before notifying");
    assert!(notification.contains("Old topics"));
    assert!(pending(&store).is_empty());
}

#[tokio::test]
async fn test_schedule_merge_is_silent_on_failure() {
    let (store, provider, _dir) = test_store(MockBehavior::AlwaysNetworkError);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    store.schedule_merge("likes RL", tx);

    // The channel closes without a message once the background task drops
    // its sender; the fragment stays queued for the next attempt.
    assert!(
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("background task should finish")
            .is_none()
    );
    assert_eq!(provider.call_count(), 1);
    assert_eq!(pending(&store), vec!["likes RL"]);
    assert_eq!(store.snapshot().memory, "");
}

#[tokio::test]
async fn test_clear_memory_drops_pending_without_merging() {
    let (store, provider, _dir) = test_store(MockBehavior::EchoUserPrompt);

    store.enqueue_update("soon to be cleared").unwrap();
    store.clear_memory().unwrap();

    assert_eq!(store.merge_now().await.unwrap(), MergeOutcome::NoUpdates);
    assert_eq!(provider.call_count(), 0);
    assert_eq!(store.summary(), "No preference records found");
}

#[tokio::test]
async fn test_clear_history_and_clear_all() {
    let (store, _provider, _dir) = test_store(MockBehavior::EchoUserPrompt);

    store.set_language("zh").unwrap();
    store.add_query_record("RAG", "last week", 12).unwrap();
    store
        .add_feedback("2401.00001", "A Paper", "interested", "likes RAG")
        .unwrap();
    store.enqueue_update("likes RAG").unwrap();
    store.merge_now().await.unwrap();

    store.clear_history().unwrap();
    let snapshot = store.snapshot();
    assert!(snapshot.query_history.is_empty());
    assert!(snapshot.feedback_history.is_empty());
    // History clearing leaves the memory itself alone
    assert!(!snapshot.memory.is_empty());

    store.clear_all().unwrap();
    let snapshot = store.snapshot();
    assert!(snapshot.memory.is_empty());
    assert_eq!(snapshot.language, None);
}

#[tokio::test]
async fn test_blank_fragments_are_ignored() {
    let (store, _provider, _dir) = test_store(MockBehavior::Success);

    store.enqueue_update("").unwrap();
    store.enqueue_update("   ").unwrap();

    assert_eq!(store.pending_count(), 0);
}

#[tokio::test]
async fn test_merge_prompt_receives_memory_and_fragments() {
    let (store, provider, _dir) = test_store(MockBehavior::Respond("Updated memory.".to_string()));

    store.enqueue_update("first fragment").unwrap();
    store.merge_now().await.unwrap();

    let request = provider.last_captured_request().unwrap();
    assert!(request.user_prompt.contains("(empty)"));
    assert!(request.user_prompt.contains("first fragment"));

    store.enqueue_update("second fragment").unwrap();
    store.merge_now().await.unwrap();

    let request = provider.last_captured_request().unwrap();
    assert!(request.user_prompt.contains("Updated memory."));
    assert!(request.user_prompt.contains("second fragment"));
}
