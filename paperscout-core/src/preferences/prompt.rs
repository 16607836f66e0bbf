//! Prompt contracts for the merge and compression protocols.

use crate::ai::provider::CompletionRequest;
use crate::preferences::store::COMPRESS_TARGET_LEN;

fn language_instruction(language: Option<&str>) -> &'static str {
    match language {
        Some("zh") => "Provide output in Chinese (简体中文).",
        _ => "Provide output in English.",
    }
}

/// Merge request: fold the pending fragments into the current memory text.
/// Newer fragments override older information on contradiction.
pub fn merge_request(
    current_memory: &str,
    pending: &[String],
    language: Option<&str>,
) -> CompletionRequest {
    let system_prompt = format!(
        "You are a preference memory manager. Your task is to maintain a concise \
         natural language description of a user's research interests and preferences.\n\n\
         RULES:\n\
         1. Integrate new information into existing memory\n\
         2. Resolve contradictions: newer info overrides older (e.g., if user now \
         likes RAG but memory says they don't, update to like RAG)\n\
         3. Keep the description natural and readable\n\
         4. Be concise but comprehensive\n\
         5. Focus on: topics of interest, topics to avoid, preferred paper types, \
         research areas\n\n\
         {}\n\
         Output ONLY the updated preference description, nothing else.",
        language_instruction(language)
    );

    let user_prompt = format!(
        "Current memory:\n{}\n\nNew information to integrate:\n{}\n\n\
         Output the updated preference description:",
        if current_memory.is_empty() {
            "(empty)"
        } else {
            current_memory
        },
        pending.join("\n")
    );

    CompletionRequest::new(system_prompt, user_prompt).with_temperature(0.3)
}

/// Compression request: shrink an over-length memory text toward the target
/// length, reporting removed topics in a structured trailer.
pub fn compress_request(memory: &str, language: Option<&str>) -> CompletionRequest {
    let system_prompt = format!(
        "You are a memory compression assistant. The user's preference memory is \
         too long and needs to be compressed.\n\n\
         RULES:\n\
         1. Keep the most important and recent preferences\n\
         2. Remove redundant or less important details\n\
         3. Maintain natural language flow\n\
         4. Target length: around {target} characters\n\
         5. If you must remove something significant, note what category was trimmed\n\n\
         {lang}\n\n\
         Current length: {len} characters\n\
         Target: {target} characters\n\n\
         Output format:\n\
         COMPRESSED_MEMORY:\n\
         <the compressed memory>\n\n\
         REMOVED_TOPICS (if any were removed):\n\
         <brief description of what was removed, or \"None\">",
        target = COMPRESS_TARGET_LEN,
        lang = language_instruction(language),
        len = memory.chars().count(),
    );

    let user_prompt = format!("Memory to compress:\n{memory}");

    CompletionRequest::new(system_prompt, user_prompt).with_temperature(0.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_request_marks_empty_memory() {
        let request = merge_request("", &["User likes RL".to_string()], None);
        assert!(request.user_prompt.contains("(empty)"));
        assert!(request.user_prompt.contains("User likes RL"));
    }

    #[test]
    fn test_merge_request_joins_fragments_in_order() {
        let pending = vec!["first".to_string(), "second".to_string()];
        let request = merge_request("memory", &pending, None);
        assert!(request.user_prompt.contains("first\nsecond"));
    }

    #[test]
    fn test_language_instruction_follows_configured_language() {
        let request = merge_request("", &["x".to_string()], Some("zh"));
        assert!(request.system_prompt.contains("Chinese"));

        let request = merge_request("", &["x".to_string()], Some("en"));
        assert!(request.system_prompt.contains("English"));
    }

    #[test]
    fn test_compress_request_states_target() {
        let request = compress_request("some long memory", None);
        assert!(request
            .system_prompt
            .contains(&COMPRESS_TARGET_LEN.to_string()));
        assert!(request.system_prompt.contains("COMPRESSED_MEMORY:"));
    }
}
