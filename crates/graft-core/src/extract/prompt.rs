//! Domain-aware prompt construction for extraction calls.

use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Prompt phrasing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Short instructions; relies on the model following the format.
    #[default]
    Concise,
    /// Spelled-out rules and an inline example shape.
    Verbose,
}

/// Options recognized by the prompt builder.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    /// Domain tag selecting the entity-type vocabulary.
    pub domain: String,
    /// Expected attribute fields, if the caller wants attributes.
    pub schema: Vec<String>,
    /// Prompt phrasing.
    pub strictness: Strictness,
}

/// Entity-type vocabulary for a domain tag. Unrecognized domains get
/// the general vocabulary.
fn domain_vocabulary(domain: &str) -> &'static [&'static str] {
    match domain {
        "medical" => &[
            "Disease", "Symptom", "Treatment", "Drug", "Anatomy", "Procedure", "Organism",
        ],
        "finance" => &[
            "Company", "Instrument", "Market", "Currency", "Metric", "Regulator", "Person",
        ],
        "technology" => &[
            "Language", "Framework", "Library", "Tool", "Protocol", "Company", "Person", "Concept",
        ],
        "science" => &[
            "Theory", "Phenomenon", "Element", "Compound", "Organism", "Instrument", "Person",
        ],
        "legal" => &[
            "Statute", "Case", "Court", "Party", "Jurisdiction", "Obligation", "Person",
        ],
        "education" => &[
            "Institution", "Course", "Subject", "Degree", "Person", "Concept",
        ],
        _ => &[
            "Person", "Organization", "Location", "Event", "Concept", "Object",
        ],
    }
}

/// Builds the system/user message pair for an extraction call.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    options: PromptOptions,
}

impl PromptBuilder {
    /// Create a builder with the given options.
    pub fn new(options: PromptOptions) -> Self {
        Self { options }
    }

    /// Build the system and user messages for the given input text.
    pub fn build(&self, text: &str) -> (Message, Message) {
        let domain = if self.options.domain.is_empty() {
            "general"
        } else {
            &self.options.domain
        };
        let vocabulary = domain_vocabulary(domain).join(", ");

        let schema_clause = if self.options.schema.is_empty() {
            String::new()
        } else {
            format!(
                "\nFor each entity, include these attributes when the text states them: {}.",
                self.options.schema.join(", ")
            )
        };

        let system = match self.options.strictness {
            Strictness::Concise => format!(
                "You are an entity extraction system for the {domain} domain. \
                 Extract entities and relationships from text. \
                 Prefer entity types from: {vocabulary}.{schema_clause}\n\
                 Return ONLY a JSON object with \"entities\" and \"relationships\" arrays. \
                 Each entity: {{\"id\", \"label\", \"type\"}}. \
                 Each relationship: {{\"source\", \"target\", \"relation\"}}."
            ),
            Strictness::Verbose => format!(
                "You are an entity extraction system for the {domain} domain.\n\n\
                 ENTITY TYPES: {vocabulary}\n\
                 {schema_clause}\n\
                 Output JSON in this exact format:\n\
                 {{\n\
                 \x20 \"entities\": [\n\
                 \x20   {{\"id\": \"entity_id\", \"label\": \"Entity Name\", \"type\": \"type\"}}\n\
                 \x20 ],\n\
                 \x20 \"relationships\": [\n\
                 \x20   {{\"source\": \"entity_id\", \"target\": \"entity_id\", \"relation\": \"relation_label\"}}\n\
                 \x20 ]\n\
                 }}\n\n\
                 Rules:\n\
                 1. Only extract explicitly mentioned entities\n\
                 2. Use the most specific entity type that applies\n\
                 3. Normalize entity labels (proper capitalization)\n\
                 4. If no entities are found, return empty arrays\n\n\
                 Return ONLY valid JSON, no other text."
            ),
        };

        let user = Message::user(format!(
            "Extract entities and relationships from this text:\n\n{text}"
        ));

        (Message::system(system), user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_selects_vocabulary() {
        let builder = PromptBuilder::new(PromptOptions {
            domain: "medical".to_string(),
            ..Default::default()
        });
        let (system, _) = builder.build("Aspirin treats headaches.");
        assert!(system.content.contains("Disease"));
        assert!(system.content.contains("medical"));
    }

    #[test]
    fn test_unknown_domain_falls_back_to_general_vocabulary() {
        let builder = PromptBuilder::new(PromptOptions {
            domain: "numismatics".to_string(),
            ..Default::default()
        });
        let (system, _) = builder.build("text");
        assert!(system.content.contains("Organization"));
    }

    #[test]
    fn test_schema_fields_appear_in_prompt() {
        let builder = PromptBuilder::new(PromptOptions {
            domain: "technology".to_string(),
            schema: vec!["version".to_string(), "license".to_string()],
            strictness: Strictness::Verbose,
        });
        let (system, _) = builder.build("text");
        assert!(system.content.contains("version"));
        assert!(system.content.contains("license"));
    }

    #[test]
    fn test_user_message_carries_input_text() {
        let builder = PromptBuilder::default();
        let (_, user) = builder.build("Python is a programming language.");
        assert!(user.content.contains("Python is a programming language."));
    }
}
