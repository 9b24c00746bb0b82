//! Post-processing for parsed records.
//!
//! Two repairs are applied to any successfully parsed record: fuzzy
//! field-name matching against an expected schema (models misname keys
//! in predictable ways), and filtering of placeholder sentinel values
//! out of attribute maps.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Sentinel values that carry no information and are dropped from
/// attribute maps.
const PLACEHOLDER_VALUES: &[&str] = &[
    "null",
    "none",
    "n/a",
    "na",
    "unknown",
    "not available",
    "not specified",
    "unspecified",
    "-",
    "",
];

/// Expected field names for a structured record, in declaration order.
///
/// Declaration order is the tie-break: when a fuzzy match is equally
/// close to two expected fields, the first-declared one wins.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    fields: Vec<String>,
    /// synonym (normalized) -> canonical field name
    synonyms: HashMap<String, String>,
}

impl RecordSchema {
    /// Create a schema from expected field names.
    pub fn new(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            synonyms: HashMap::new(),
        }
    }

    /// Schema for the extraction result envelope.
    pub fn extraction() -> Self {
        Self::new(&["entities", "relationships"])
            .with_synonym("nodes", "entities")
            .with_synonym("entity_list", "entities")
            .with_synonym("edges", "relationships")
            .with_synonym("relations", "relationships")
            .with_synonym("links", "relationships")
    }

    /// Schema for one entity record.
    pub fn entity() -> Self {
        Self::new(&["id", "label", "type", "attributes"])
            .with_synonym("name", "label")
            .with_synonym("entity", "label")
            .with_synonym("entity_type", "type")
            .with_synonym("category", "type")
            .with_synonym("properties", "attributes")
            .with_synonym("attrs", "attributes")
    }

    /// Schema for one relationship record.
    pub fn relationship() -> Self {
        Self::new(&["source", "target", "relation"])
            .with_synonym("from", "source")
            .with_synonym("subject", "source")
            .with_synonym("to", "target")
            .with_synonym("object", "target")
            .with_synonym("relationship", "relation")
            .with_synonym("relation_type", "relation")
            .with_synonym("predicate", "relation")
            .with_synonym("rel", "relation")
    }

    /// Register a synonym for a canonical field.
    pub fn with_synonym(mut self, synonym: &str, field: &str) -> Self {
        self.synonyms
            .insert(normalize_key(synonym), field.to_string());
        self
    }

    /// The expected fields in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Resolve a raw key to an expected field, tolerating case,
    /// whitespace, and underscore differences plus registered synonyms.
    pub fn match_field(&self, raw_key: &str) -> Option<&str> {
        let normalized = normalize_key(raw_key);

        // Exact normalized match, first-declared field wins.
        for field in &self.fields {
            if normalize_key(field) == normalized {
                return Some(field);
            }
        }

        if let Some(canonical) = self.synonyms.get(&normalized) {
            return Some(canonical);
        }

        // Singular/plural slack: "entity" -> "entities", "relation" -> "relations".
        for field in &self.fields {
            let field_norm = normalize_key(field);
            if field_norm.starts_with(&normalized) || normalized.starts_with(&field_norm) {
                return Some(field);
            }
        }

        None
    }

    /// Rewrite the top-level keys of an object to their matched schema
    /// fields. Unmatched keys are kept as-is.
    pub fn repair_keys(&self, value: Value) -> Value {
        let Value::Object(map) = value else {
            return value;
        };
        let mut repaired = Map::with_capacity(map.len());
        for (key, val) in map {
            match self.match_field(&key) {
                // Do not clobber an already-present canonical key.
                Some(field) if !repaired.contains_key(field) => {
                    repaired.insert(field.to_string(), val);
                }
                _ => {
                    repaired.entry(key).or_insert(val);
                }
            }
        }
        Value::Object(repaired)
    }
}

/// Lowercase and strip everything but letters and digits.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Whether a scalar value is an information-free placeholder.
pub fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            PLACEHOLDER_VALUES.contains(&lowered.as_str())
        }
        _ => false,
    }
}

/// Drop placeholder entries from an attribute map, recursing into
/// nested objects. Arrays are filtered element-wise.
pub fn filter_placeholders(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let filtered: Map<String, Value> = map
                .into_iter()
                .filter(|(_, v)| !is_placeholder(v))
                .map(|(k, v)| (k, filter_placeholders(v)))
                .collect();
            Value::Object(filtered)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !is_placeholder(v))
                .map(filter_placeholders)
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_field_case_and_whitespace() {
        let schema = RecordSchema::entity();
        assert_eq!(schema.match_field("Label"), Some("label"));
        assert_eq!(schema.match_field(" TYPE "), Some("type"));
        assert_eq!(schema.match_field("entity_type"), Some("type"));
    }

    #[test]
    fn test_match_field_synonyms() {
        let schema = RecordSchema::relationship();
        assert_eq!(schema.match_field("from"), Some("source"));
        assert_eq!(schema.match_field("to"), Some("target"));
        assert_eq!(schema.match_field("predicate"), Some("relation"));
    }

    #[test]
    fn test_match_field_tie_breaks_to_first_declared() {
        // Both fields normalize to a prefix-compatible shape for "e";
        // the first-declared field must win.
        let schema = RecordSchema::new(&["entry", "entries"]);
        assert_eq!(schema.match_field("entr"), Some("entry"));
    }

    #[test]
    fn test_repair_keys() {
        let schema = RecordSchema::extraction();
        let raw = json!({"nodes": [1], "relations": [2], "comment": "extra"});
        let repaired = schema.repair_keys(raw);
        assert!(repaired["entities"].is_array());
        assert!(repaired["relationships"].is_array());
        assert_eq!(repaired["comment"], "extra");
    }

    #[test]
    fn test_repair_keys_does_not_clobber_canonical() {
        let schema = RecordSchema::extraction();
        let raw = json!({"entities": [1, 2], "nodes": [3]});
        let repaired = schema.repair_keys(raw);
        assert_eq!(repaired["entities"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_filter_placeholders() {
        let raw = json!({
            "label": "Python",
            "creator": "N/A",
            "year": null,
            "paradigm": "unknown",
            "nested": {"keep": "yes", "drop": ""}
        });
        let filtered = filter_placeholders(raw);
        let obj = filtered.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(filtered["label"], "Python");
        assert_eq!(filtered["nested"]["keep"], "yes");
        assert!(filtered["nested"].get("drop").is_none());
    }
}
