//! Resilient parsing of LLM text output.
//!
//! Model output is adversarial: JSON wrapped in prose, markdown code
//! fences, smart quotes, trailing commas, bare keys. The parser applies
//! an ordered cascade of strategies and returns the first one that
//! yields a structurally valid record:
//!
//! 1. Direct structural parse of the full text.
//! 2. Strip markdown code fences, retry.
//! 3. Scan for the largest bracket-delimited block, retry on the slice.
//! 4. Heuristic repair (quotes, trailing commas, bare keys), retry.
//! 5. Line-oriented `key: value` extraction. Never fails on non-empty
//!    text, so it is the terminal fallback.
//!
//! Parsing is pure. The only declared failure is empty or whitespace
//! input.

pub mod schema;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ErrorCode, GraftError, GraftResult};
use crate::types::ParseStrategy;

pub use schema::RecordSchema;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:[a-zA-Z0-9]*)\s*\n?([\s\S]*?)\n?```").unwrap());
static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());
static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)"#).unwrap());
static KEY_VALUE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*[-*]?\s*"?([A-Za-z_][A-Za-z0-9 _]*?)"?\s*(?::|\s-\s)\s*(.+?)\s*,?\s*$"#).unwrap());

/// Parse raw model output into a structured record.
///
/// Returns the parsed value together with the cascade strategy that
/// produced it. Fails only for empty or whitespace input.
pub fn parse(raw: &str) -> GraftResult<(Value, ParseStrategy)> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(GraftError::Parse {
            message: "cannot parse empty input".to_string(),
            code: ErrorCode::ParseEmptyInput,
        });
    }

    if let Some(value) = try_direct(text) {
        return Ok((value, ParseStrategy::Direct));
    }
    if let Some(value) = try_code_fence(text) {
        tracing::debug!(strategy = "code_fence", "direct parse failed, fence strip succeeded");
        return Ok((value, ParseStrategy::CodeFence));
    }
    if let Some(value) = try_bracket_scan(text) {
        tracing::debug!(strategy = "bracket_scan", "recovered structural block from prose");
        return Ok((value, ParseStrategy::BracketScan));
    }
    if let Some(value) = try_repair(text) {
        tracing::debug!(strategy = "repair", "heuristic repair succeeded");
        return Ok((value, ParseStrategy::Repair));
    }

    // Terminal fallback: degrades to an empty record rather than failing.
    tracing::debug!(strategy = "line_scan", "falling back to line-oriented extraction");
    Ok((line_scan(text), ParseStrategy::LineScan))
}

/// Strategy 1: parse the trimmed text as-is.
fn try_direct(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok().filter(is_structural)
}

/// Strategy 2: strip code fences (and `<think>` blocks) and retry.
fn try_code_fence(text: &str) -> Option<Value> {
    let cleaned = THINK_BLOCK.replace_all(text, "");
    for caps in CODE_FENCE.captures_iter(&cleaned) {
        if let Some(m) = caps.get(1) {
            if let Some(value) = try_direct(m.as_str().trim()) {
                return Some(value);
            }
        }
    }
    // A fence may also wrap the whole response with nothing outside it.
    let stripped = cleaned.trim().trim_start_matches("```json").trim_start_matches("```");
    let stripped = stripped.trim_end_matches("```").trim();
    if stripped != cleaned.trim() {
        return try_direct(stripped);
    }
    None
}

/// Strategy 3: extract the largest bracket-delimited block and retry.
fn try_bracket_scan(text: &str) -> Option<Value> {
    let block = largest_bracket_block(text)?;
    try_direct(block)
}

/// Strategy 4: repair common structural damage and retry.
fn try_repair(text: &str) -> Option<Value> {
    let candidate = largest_bracket_block(text).unwrap_or(text);
    let repaired = repair(candidate);
    serde_json::from_str(&repaired).ok().filter(is_structural)
}

/// Find the largest `{...}` or `[...]` span in the text.
fn largest_bracket_block(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let close_char = if text.as_bytes()[open] == b'{' { '}' } else { ']' };
    let close = text.rfind(close_char)?;
    if close <= open {
        return None;
    }
    Some(&text[open..=close])
}

/// Normalize quote characters, drop trailing commas, quote bare keys.
fn repair(text: &str) -> String {
    let mut fixed = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{201C}' | '\u{201D}' | '\u{301D}' | '\u{301E}' => fixed.push('"'),
            '\u{2018}' | '\u{2019}' => fixed.push('\''),
            _ => fixed.push(c),
        }
    }

    // Single-quoted strings to double-quoted. Naive, but model output
    // that mixes both conventions inside one document is rare.
    if !fixed.contains('"') {
        fixed = fixed.replace('\'', "\"");
    }

    let fixed = TRAILING_COMMA.replace_all(&fixed, "$1");
    BARE_KEY.replace_all(&fixed, "${1}\"${2}\"${3}").into_owned()
}

/// Strategy 5: scan `key: value` / `key - value` lines into a flat record.
///
/// Never fails structurally; input with no matching lines yields an
/// empty record.
fn line_scan(text: &str) -> Value {
    let mut record = Map::new();
    for line in text.lines() {
        // Skip fence delimiters and obvious structural noise.
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("```") {
            continue;
        }
        if let Some(caps) = KEY_VALUE_LINE.captures(line) {
            let key = caps[1].trim().to_string();
            let value = caps[2].trim().trim_matches(['"', '\'']).to_string();
            if !key.is_empty() && !value.is_empty() {
                record.insert(key, Value::String(value));
            }
        }
    }
    Value::Object(record)
}

/// Only objects and arrays count as structurally valid records. A bare
/// string or number parsed out of prose is a false positive.
fn is_structural(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_uses_direct_strategy() {
        let (value, strategy) = parse(r#"{"entities": [], "relationships": []}"#).unwrap();
        assert_eq!(strategy, ParseStrategy::Direct);
        assert!(value["entities"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_code_fence_strategy() {
        let raw = "```json\n{\"entities\": [{\"id\": \"a\", \"label\": \"A\", \"type\": \"X\"}], \"relationships\": []}\n```";
        let (value, strategy) = parse(raw).unwrap();
        assert_eq!(strategy, ParseStrategy::CodeFence);
        assert_eq!(value["entities"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_code_fence_with_surrounding_prose() {
        let raw = "Here is the extraction:\n```json\n{\"a\": 1}\n```\nLet me know if you need more.";
        let (value, strategy) = parse(raw).unwrap();
        assert_eq!(strategy, ParseStrategy::CodeFence);
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_bracket_scan_strategy() {
        let raw = "Sure! The result is {\"entities\": [], \"relationships\": []} as requested.";
        let (value, strategy) = parse(raw).unwrap();
        assert_eq!(strategy, ParseStrategy::BracketScan);
        assert!(value.is_object());
    }

    #[test]
    fn test_repair_trailing_commas_and_bare_keys() {
        let raw = r#"{entities: [{id: "a", label: "A",},], relationships: [],}"#;
        let (value, strategy) = parse(raw).unwrap();
        assert_eq!(strategy, ParseStrategy::Repair);
        assert_eq!(value["entities"][0]["id"], "a");
    }

    #[test]
    fn test_repair_smart_quotes() {
        let raw = "{\u{201C}label\u{201D}: \u{201C}Python\u{201D}}";
        let (value, strategy) = parse(raw).unwrap();
        assert_eq!(strategy, ParseStrategy::Repair);
        assert_eq!(value["label"], "Python");
    }

    #[test]
    fn test_line_scan_terminal_fallback() {
        let raw = "name: Aspirin\nformula - C9H8O4\nplain prose without any shape";
        let (value, strategy) = parse(raw).unwrap();
        assert_eq!(strategy, ParseStrategy::LineScan);
        assert_eq!(value["name"], "Aspirin");
        assert_eq!(value["formula"], "C9H8O4");
    }

    #[test]
    fn test_line_scan_no_matches_yields_empty_record() {
        let (value, strategy) = parse("just words here").unwrap();
        assert_eq!(strategy, ParseStrategy::LineScan);
        assert!(value.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_empty_input_is_the_only_failure() {
        assert!(parse("").is_err());
        assert!(parse("   \n\t ").is_err());
    }

    #[test]
    fn test_bare_scalar_is_not_a_record() {
        // "42" parses as JSON but is not a structured record; the
        // cascade should fall through to line scan instead.
        let (_, strategy) = parse("42").unwrap();
        assert_eq!(strategy, ParseStrategy::LineScan);
    }

    #[test]
    fn test_think_block_stripped_before_fence_parse() {
        let raw = "<think>reasoning about entities</think>\n```json\n{\"x\": 1}\n```";
        let (value, _) = parse(raw).unwrap();
        assert_eq!(value["x"], 1);
    }
}
