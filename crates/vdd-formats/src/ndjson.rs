//! Newline-delimited JSON: one JSON value per non-blank line.

use serde_json::Value;

/// True if `content_type` names NDJSON/JSON-lines.
#[must_use]
pub fn is_ndjson(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("x-ndjson") || ct.contains("jsonl")
}

/// Sniff a body with no declared content-type: true if at least two
/// successive non-blank lines each parse as valid JSON.
#[must_use]
pub fn sniff(body: &str) -> bool {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .take(2)
        .filter(|line| serde_json::from_str::<Value>(line).is_ok())
        .count()
        >= 2
}

/// Parse an NDJSON body, skipping blank lines and any line that fails to
/// parse as JSON (failure-safe: never errors).
#[must_use]
pub fn parse(body: &str) -> Vec<Value> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_by_content_type() {
        assert!(is_ndjson("application/x-ndjson"));
        assert!(is_ndjson("application/jsonl; charset=utf-8"));
        assert!(!is_ndjson("application/json"));
    }

    #[test]
    fn sniffs_two_successive_json_lines() {
        assert!(sniff("{\"a\":1}\n{\"b\":2}\n"));
        assert!(!sniff("{\"a\":1}\nnot json\n"));
    }

    #[test]
    fn parse_skips_blank_and_invalid_lines() {
        let body = "{\"a\":1}\n\nnot json\n{\"b\":2}\n";
        let values = parse(body);
        assert_eq!(values, vec![json!({"a": 1}), json!({"b": 2})]);
    }
}
