//! Shared utility functions.

/// Extract the JSON object embedded in a free-form model response.
///
/// 1. The body of the first fenced code block (```` ```json ````,
///    ```` ```plan ```` or a bare fence) that holds a `{...}` object.
/// 2. Otherwise the span from the first `{` to the last `}`.
///
/// Returns `None` when neither is present. The returned slice is not
/// guaranteed to parse; callers report parse failures separately.
pub fn extract_json_object(response: &str) -> Option<&str> {
    if let Some(body) = fenced_object(response) {
        return Some(body);
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

fn fenced_object(response: &str) -> Option<&str> {
    let mut rest = response;
    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        // Skip the info string (`json`, `plan`, ...) up to the end of the line.
        let body_start = after_fence.find('\n').map(|i| i + 1)?;
        let body_and_tail = &after_fence[body_start..];
        let close = body_and_tail.find("```")?;
        let body = body_and_tail[..close].trim();
        if body.starts_with('{') && body.ends_with('}') {
            return Some(body);
        }
        rest = &body_and_tail[close + 3..];
    }
    None
}
