use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```(?:json)?\s*\n?").unwrap());

static TRAILING_FENCE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n?```\s*$").unwrap());

/// Strips a markdown code fence the model sometimes wraps its JSON in,
/// despite being asked for a bare object.
pub fn strip_code_fence(response: &str) -> &str {
    let mut cleaned = response;
    if let Some(m) = LEADING_FENCE_PATTERN.find(cleaned) {
        cleaned = &cleaned[m.end()..];
    }
    if let Some(m) = TRAILING_FENCE_PATTERN.find(cleaned) {
        cleaned = &cleaned[..m.start()];
    }
    cleaned
}
