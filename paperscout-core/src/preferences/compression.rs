//! Parsing of the compression protocol's marker-structured response.
//!
//! The model is asked to answer with a `COMPRESSED_MEMORY:` section followed
//! by an optional `REMOVED_TOPICS` section. Responses that ignore the format
//! are taken whole as the compressed text with no removal note.

/// Parsed compression response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResponse {
    pub memory: String,
    /// Description of removed topics, when the model reported a meaningful one
    pub removed: Option<String>,
}

pub fn parse_compression_response(response: &str) -> CompressionResponse {
    let Some((_, after_marker)) = response.split_once("COMPRESSED_MEMORY:") else {
        return CompressionResponse {
            memory: response.trim().to_string(),
            removed: None,
        };
    };

    match after_marker.split_once("REMOVED_TOPICS") {
        Some((compressed, removed_part)) => {
            let removed = removed_part
                .split_once(':')
                .map(|(_, text)| text.trim().to_string())
                .filter(|text| !text.is_empty() && !text.eq_ignore_ascii_case("none"));

            CompressionResponse {
                memory: compressed.trim().to_string(),
                removed,
            }
        }
        None => CompressionResponse {
            memory: after_marker.trim().to_string(),
            removed: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_markers_present() {
        let response = "COMPRESSED_MEMORY:\nLikes RL and agents.\n\n\
                        REMOVED_TOPICS (if any were removed):\nOld GAN interests";

        let parsed = parse_compression_response(response);
        assert_eq!(parsed.memory, "Likes RL and agents.");
        assert_eq!(parsed.removed.as_deref(), Some("Old GAN interests"));
    }

    #[test]
    fn test_removed_topics_none_literal() {
        let response = "COMPRESSED_MEMORY:\nLikes RL.\n\nREMOVED_TOPICS:\nNone";

        let parsed = parse_compression_response(response);
        assert_eq!(parsed.memory, "Likes RL.");
        assert_eq!(parsed.removed, None);
    }

    #[test]
    fn test_markers_absent_takes_whole_response() {
        let parsed = parse_compression_response("  Just the compressed text.  ");
        assert_eq!(parsed.memory, "Just the compressed text.");
        assert_eq!(parsed.removed, None);
    }

    #[test]
    fn test_partial_markers_compressed_only() {
        let parsed = parse_compression_response("COMPRESSED_MEMORY:\nLikes RL.");
        assert_eq!(parsed.memory, "Likes RL.");
        assert_eq!(parsed.removed, None);
    }

    #[test]
    fn test_removed_section_without_colon() {
        let parsed = parse_compression_response("COMPRESSED_MEMORY:\nLikes RL.\nREMOVED_TOPICS");
        assert_eq!(parsed.memory, "Likes RL.");
        assert_eq!(parsed.removed, None);
    }

    #[test]
    fn test_empty_removed_description() {
        let parsed =
            parse_compression_response("COMPRESSED_MEMORY:\nLikes RL.\nREMOVED_TOPICS:\n  ");
        assert_eq!(parsed.memory, "Likes RL.");
        assert_eq!(parsed.removed, None);
    }
}
