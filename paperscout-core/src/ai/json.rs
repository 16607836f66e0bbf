use serde_json::Value;

/// Extract a JSON object from a model response. Models occasionally wrap the
/// object in code fences or prose even when asked for bare JSON, so a direct
/// parse is tried first and then the outermost brace span.
pub fn extract_json(response: &str) -> Option<Value> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(|value| value.is_object())
}
