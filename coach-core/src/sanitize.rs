//! Markdown fence stripping for model output.
//!
//! Models asked for JSON still like to wrap it in a fenced block. This removes
//! a leading `` ```json `` opener and every bare `` ``` `` marker, nothing more.

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Trim `raw` and remove code-fence markers. Idempotent.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix(JSON_FENCE).unwrap_or(trimmed);
    body.replace(FENCE, "").trim().to_string()
}
