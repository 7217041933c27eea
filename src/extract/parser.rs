//! Tolerant parsing of raw extractor responses.
//!
//! The extractor is instructed to reply with JSON only, but nothing
//! enforces that: responses come wrapped in prose, markdown fences, or
//! arrive truncated. This module treats the response as probably-structured
//! text and recovers what it can. It never fails; the worst outcome is an
//! empty batch tagged [`ParseStatus::Failed`].

use serde_json::Value;
use tracing::{debug, warn};

/// How much repair the response needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The whole response was valid JSON
    Clean,
    /// JSON was recovered from inside surrounding prose
    Repaired,
    /// Nothing structured could be recovered
    Failed,
}

/// Ordered candidate records recovered from one extractor response.
///
/// Candidates are raw JSON values; type and shape checks happen in the
/// validator, per candidate, so one malformed entry can't sink the rest.
#[derive(Debug, Clone)]
pub struct ExtractionBatch {
    pub candidates: Vec<Value>,
    pub status: ParseStatus,
}

impl ExtractionBatch {
    fn new(candidates: Vec<Value>, status: ParseStatus) -> Self {
        Self { candidates, status }
    }

    fn failed() -> Self {
        Self::new(Vec::new(), ParseStatus::Failed)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Parse a raw extractor response into candidate records.
///
/// A top-level object becomes a batch of one; a top-level array contributes
/// one candidate per element. Scalars and unrecoverable input yield an
/// empty batch, never an error.
pub fn parse_response(raw: &str) -> ExtractionBatch {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        if let Some(candidates) = candidates_from_value(value) {
            return ExtractionBatch::new(candidates, ParseStatus::Clean);
        }
    }

    if let Some(value) = first_balanced_fragment(raw) {
        if let Some(candidates) = candidates_from_value(value) {
            debug!("Recovered JSON fragment from prose-wrapped response");
            return ExtractionBatch::new(candidates, ParseStatus::Repaired);
        }
    }

    warn!(
        "No structured fragment recoverable from extractor response ({} bytes)",
        raw.len()
    );
    ExtractionBatch::failed()
}

fn candidates_from_value(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Object(_) => Some(vec![value]),
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Scan for the first balanced `{...}` or `[...]` fragment that parses as
/// JSON, tolerating leading and trailing prose.
fn first_balanced_fragment(raw: &str) -> Option<Value> {
    let mut search_from = 0;

    while let Some(offset) = raw[search_from..].find(|c| c == '{' || c == '[') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(raw, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&raw[start..end]) {
                return Some(value);
            }
        }
        // Fragment didn't close or didn't parse; resume after its opener
        search_from = start + 1;
    }

    None
}

/// Find the byte offset one past the bracket matching `raw[start]`.
/// String- and escape-aware so braces inside JSON strings don't count.
fn balanced_end(raw: &str, start: usize) -> Option<usize> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(start + i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_object_is_batch_of_one() {
        let batch = parse_response(r#"{"amount": 500, "merchant": "Domino's"}"#);
        assert_eq!(batch.status, ParseStatus::Clean);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_clean_array_one_candidate_per_element() {
        let batch = parse_response(r#"[{"amount": 80}, {"amount": 250}]"#);
        assert_eq!(batch.status, ParseStatus::Clean);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.candidates[0]["amount"], 80);
        assert_eq!(batch.candidates[1]["amount"], 250);
    }

    #[test]
    fn test_empty_array_is_clean_empty_batch() {
        let batch = parse_response("[]");
        assert_eq!(batch.status, ParseStatus::Clean);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_prose_wrapped_object_is_repaired() {
        let raw = "Sure! Here are the extracted details:\n{\"amount\": 500}\nLet me know if you need anything else.";
        let batch = parse_response(raw);
        assert_eq!(batch.status, ParseStatus::Repaired);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.candidates[0]["amount"], 500);
    }

    #[test]
    fn test_markdown_fenced_json_is_repaired() {
        let raw = "```json\n{\"amount\": 42, \"merchant\": \"Zomato\"}\n```";
        let batch = parse_response(raw);
        assert_eq!(batch.status, ParseStatus::Repaired);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_scan() {
        let raw = r#"note: {"merchant": "weird {name}", "amount": 7} done"#;
        let batch = parse_response(raw);
        assert_eq!(batch.status, ParseStatus::Repaired);
        assert_eq!(batch.candidates[0]["merchant"], "weird {name}");
    }

    #[test]
    fn test_skips_invalid_fragment_for_later_valid_one() {
        let raw = r#"{oops} then {"amount": 5}"#;
        let batch = parse_response(raw);
        assert_eq!(batch.status, ParseStatus::Repaired);
        assert_eq!(batch.candidates[0]["amount"], 5);
    }

    #[test]
    fn test_unrecoverable_input_fails_without_panicking() {
        for raw in ["", "no json here", "{\"truncated\": ", "42", "\"just a string\""] {
            let batch = parse_response(raw);
            assert_eq!(batch.status, ParseStatus::Failed, "input: {:?}", raw);
            assert!(batch.is_empty());
        }
    }

    #[test]
    fn test_prose_wrapped_array() {
        let raw = "Found two purchases: [{\"amount\": 80}, {\"amount\": 250}] as requested";
        let batch = parse_response(raw);
        assert_eq!(batch.status, ParseStatus::Repaired);
        assert_eq!(batch.len(), 2);
    }
}
