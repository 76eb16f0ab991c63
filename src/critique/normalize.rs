use serde_json::Value;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Removes the markdown code fence some models wrap around JSON output even
/// when told not to. Text without a fence is only trimmed.
pub fn strip_markdown_fence(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix(JSON_FENCE) {
        text = rest;
    } else if let Some(rest) = text.strip_prefix(FENCE) {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

pub fn parse_reply(reply: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(strip_markdown_fence(reply))
}
