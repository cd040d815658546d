//! Turns raw LLM output into an [`ExtractionResult`].
//!
//! Decoding runs in two stages:
//!
//! 1. **Strict decode.** The span from the first `{` to the last `}` is parsed
//!    as one JSON document and its `entities` / `relations` arrays are coerced
//!    into the result shape.
//! 2. **Fallback recovery.** Only when the strict decode fails. The response is
//!    split into an entity partition (after `"entities":`, cut at
//!    `"relations":`) and a relation partition (after `"relations":`). Each
//!    partition is scanned for flat `{...}` spans that are decoded one by one;
//!    spans that fail to decode or miss required keys are dropped.
//!
//! The flat-span scan cannot see objects that contain nested objects. This is a
//! known limitation: extraction records are expected to be flat, and a nested
//! record is lost rather than repaired.

use crate::models::{Entity, EntityType, ExtractionResult, Relation};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

const ENTITIES_KEY: &str = "\"entities\":";
const RELATIONS_KEY: &str = "\"relations\":";

static FLAT_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("flat object pattern is valid"));

/// Which stage produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Strict,
    Recovered,
    Failed,
}

pub fn parse_extraction_response(raw: &str) -> ExtractionResult {
    parse_with_stage(raw).0
}

pub fn parse_with_stage(raw: &str) -> (ExtractionResult, ParseStage) {
    let Some(span) = bounded_span(raw) else {
        debug!(len = raw.len(), "response has no json object span");
        return (ExtractionResult::unparsed(raw), ParseStage::Failed);
    };

    match serde_json::from_str::<Value>(span) {
        Ok(payload) => (from_payload(&payload), ParseStage::Strict),
        Err(error) => {
            debug!(error = %error, "strict decode failed, attempting fallback recovery");
            let entities = recover_entities(raw);
            let relations = recover_relations(raw);

            if entities.is_empty() && relations.is_empty() {
                debug!("fallback recovery found nothing usable");
                return (ExtractionResult::unparsed(raw), ParseStage::Failed);
            }

            debug!(
                entities = entities.len(),
                relations = relations.len(),
                "fallback recovery salvaged records"
            );
            (
                ExtractionResult::recovered(entities, relations),
                ParseStage::Recovered,
            )
        }
    }
}

/// Slice from the first `{` through the last `}`, if both exist in that order.
fn bounded_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn from_payload(payload: &Value) -> ExtractionResult {
    let entities = array_objects(payload, "entities")
        .map(entity_from_object)
        .collect();
    let relations = array_objects(payload, "relations")
        .map(relation_from_object)
        .collect();
    ExtractionResult::recovered(entities, relations)
}

fn array_objects<'a>(
    payload: &'a Value,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
    payload
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn recover_entities(raw: &str) -> Vec<Entity> {
    let Some(partition) = after_key(raw, ENTITIES_KEY) else {
        return Vec::new();
    };
    let partition = match partition.find(RELATIONS_KEY) {
        Some(cut) => &partition[..cut],
        None => partition,
    };

    flat_objects(partition)
        .filter(|object| object.contains_key("name") && object.contains_key("type"))
        .map(|object| entity_from_object(&object))
        .collect()
}

fn recover_relations(raw: &str) -> Vec<Relation> {
    let Some(partition) = after_key(raw, RELATIONS_KEY) else {
        return Vec::new();
    };

    flat_objects(partition)
        .filter(|object| object.contains_key("source") && object.contains_key("target"))
        .map(|object| relation_from_object(&object))
        .collect()
}

fn after_key<'a>(raw: &'a str, key: &str) -> Option<&'a str> {
    raw.find(key).map(|at| &raw[at + key.len()..])
}

/// Every non-nested `{...}` span in `text` that decodes to a JSON object.
fn flat_objects(text: &str) -> impl Iterator<Item = Map<String, Value>> + '_ {
    FLAT_OBJECT
        .find_iter(text)
        .filter_map(|span| match serde_json::from_str::<Value>(span.as_str()) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        })
}

fn entity_from_object(object: &Map<String, Value>) -> Entity {
    Entity {
        name: text_field(object, "name").unwrap_or_else(|| "Unknown".to_string()),
        entity_type: text_field(object, "type")
            .map(|label| EntityType::from_label(&label))
            .unwrap_or_default(),
        aliases: aliases_field(object),
        description: text_field(object, "description").unwrap_or_default(),
    }
}

fn relation_from_object(object: &Map<String, Value>) -> Relation {
    Relation {
        source: text_field(object, "source").unwrap_or_default(),
        target: text_field(object, "target").unwrap_or_default(),
        relation_type: text_field(object, "type").unwrap_or_else(|| "unknown".to_string()),
        description: text_field(object, "description").unwrap_or_default(),
        evidence: text_field(object, "evidence").unwrap_or_default(),
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    scalar_text(object.get(key)?)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn aliases_field(object: &Map<String, Value>) -> Vec<String> {
    match object.get("aliases") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(alias)) if !alias.trim().is_empty() => vec![alias.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, entity_type: EntityType) -> Entity {
        Entity {
            name: name.to_string(),
            entity_type,
            aliases: Vec::new(),
            description: String::new(),
        }
    }

    fn relation(source: &str, target: &str, relation_type: &str) -> Relation {
        Relation {
            source: source.to_string(),
            target: target.to_string(),
            relation_type: relation_type.to_string(),
            description: String::new(),
            evidence: String::new(),
        }
    }

    #[test]
    fn strict_decode_ignores_surrounding_prose() {
        let raw = r#"Here: {"entities":[{"name":"TP53","type":"gene"}],"relations":[]}"#;
        let (result, stage) = parse_with_stage(raw);

        assert_eq!(stage, ParseStage::Strict);
        assert_eq!(result.entities, vec![entity("TP53", EntityType::Gene)]);
        assert!(result.relations.is_empty());
        assert!(!result.parse_error);
        assert_eq!(result.raw_response, None);
    }

    #[test]
    fn prose_does_not_change_the_result() {
        let body = r#"{"entities":[{"name":"EGFR","type":"protein","aliases":["ERBB1"]}],"relations":[{"source":"EGFR","target":"KRAS","type":"activation","evidence":"EGFR activates KRAS"}]}"#;
        let wrapped = format!("Sure, here is the JSON you asked for:\n{body}\nLet me know if you need more.");

        assert_eq!(parse_extraction_response(body), parse_extraction_response(&wrapped));
    }

    #[test]
    fn strict_decode_keeps_every_field() {
        let raw = r#"{
            "entities": [
                {"name": "MDM2", "type": "protein", "aliases": ["HDM2"], "description": "E3 ubiquitin ligase"}
            ],
            "relations": [
                {"source": "MDM2", "target": "TP53", "type": "degradation",
                 "description": "MDM2 targets p53 for degradation", "evidence": "MDM2 ubiquitinates p53"}
            ]
        }"#;
        let result = parse_extraction_response(raw);

        assert_eq!(
            result.entities,
            vec![Entity {
                name: "MDM2".to_string(),
                entity_type: EntityType::Protein,
                aliases: vec!["HDM2".to_string()],
                description: "E3 ubiquitin ligase".to_string(),
            }]
        );
        assert_eq!(
            result.relations,
            vec![Relation {
                source: "MDM2".to_string(),
                target: "TP53".to_string(),
                relation_type: "degradation".to_string(),
                description: "MDM2 targets p53 for degradation".to_string(),
                evidence: "MDM2 ubiquitinates p53".to_string(),
            }]
        );
    }

    #[test]
    fn strict_decode_applies_defaults() {
        let raw = r#"{"entities":[{"name":"KRAS"}, "stray string", 7],"relations":[{"source":"KRAS","target":"BRAF"}]}"#;
        let result = parse_extraction_response(raw);

        assert_eq!(result.entities, vec![entity("KRAS", EntityType::Unknown)]);
        assert_eq!(result.relations, vec![relation("KRAS", "BRAF", "unknown")]);
        assert!(!result.parse_error);
    }

    #[test]
    fn strict_decode_without_arrays_is_an_empty_success() {
        let result = parse_extraction_response(r#"{"entities": "none found"}"#);
        assert!(result.entities.is_empty());
        assert!(result.relations.is_empty());
        assert!(!result.parse_error);
    }

    #[test]
    fn relation_types_outside_the_vocabulary_are_kept() {
        let raw = r#"{"entities":[],"relations":[{"source":"A","target":"B","type":"sumoylation"}]}"#;
        let result = parse_extraction_response(raw);
        assert_eq!(result.relations[0].relation_type, "sumoylation");
    }

    #[test]
    fn fallback_drops_entities_missing_type() {
        let raw = r#"{"entities": [{"name":"TP53","type":"gene"} {"name":"MDM2"} ], "relations": [{"source":"TP53","target":"MDM2","type":"binding"}]}"#;
        let (result, stage) = parse_with_stage(raw);

        assert_eq!(stage, ParseStage::Recovered);
        assert_eq!(result.entities, vec![entity("TP53", EntityType::Gene)]);
        assert_eq!(result.relations, vec![relation("TP53", "MDM2", "binding")]);
        assert!(!result.parse_error);
        assert_eq!(result.raw_response, None);
    }

    #[test]
    fn fallback_recovers_records_before_truncation() {
        let raw = r#"{"entities":[{"name":"BRCA1","type":"gene"},{"name":"BRC"#;
        let result = parse_extraction_response(raw);

        assert_eq!(result.entities, vec![entity("BRCA1", EntityType::Gene)]);
        assert!(result.relations.is_empty());
        assert!(!result.parse_error);
    }

    #[test]
    fn relations_alone_count_as_success() {
        let raw = r#"{"entities": [ oops ], "relations": [{"source":"AKT1","target":"MTOR","type":"activation"}"#;
        let result = parse_extraction_response(raw);

        assert!(result.entities.is_empty());
        assert_eq!(result.relations, vec![relation("AKT1", "MTOR", "activation")]);
        assert!(!result.parse_error);
    }

    #[test]
    fn entity_partition_stops_at_relations_key() {
        let raw = r#"{"entities": [], "relations": [{"source":"A","target":"B","name":"A-B","type":"binding"},]}"#;
        let result = parse_extraction_response(raw);

        assert!(result.entities.is_empty());
        assert_eq!(result.relations.len(), 1);
    }

    #[test]
    fn undecodable_spans_are_discarded() {
        let raw = r#"{"entities": [{"name": 'PTEN', "type": "gene"}, {"name":"PIK3CA","type":"gene"}"#;
        let result = parse_extraction_response(raw);
        assert_eq!(result.entities, vec![entity("PIK3CA", EntityType::Gene)]);
    }

    #[test]
    fn nested_records_are_not_recovered() {
        let raw = r#"{"entities": [{"name":"MYC","type":"gene","meta":{"score":1}} {"name":"MAX","type":"protein"}]"#;
        let result = parse_extraction_response(raw);
        assert_eq!(result.entities, vec![entity("MAX", EntityType::Protein)]);
    }

    #[test]
    fn response_without_braces_is_a_parse_error() {
        let raw = "I could not find any genes in this text.";
        let (result, stage) = parse_with_stage(raw);

        assert_eq!(stage, ParseStage::Failed);
        assert!(result.parse_error);
        assert_eq!(result.raw_response.as_deref(), Some(raw));
        assert!(result.entities.is_empty());
        assert!(result.relations.is_empty());
    }

    #[test]
    fn malformed_json_without_keys_is_a_parse_error() {
        let raw = r#"Result: {"genes": [{"name":"TP53","type":"gene"} {"name":"MDM2"}]}"#;
        let result = parse_extraction_response(raw);

        assert!(result.parse_error);
        assert_eq!(result.raw_response.as_deref(), Some(raw));
    }

    #[test]
    fn reversed_braces_are_a_parse_error() {
        let raw = "} nothing here {";
        let result = parse_extraction_response(raw);
        assert!(result.parse_error);
        assert_eq!(result.raw_response.as_deref(), Some(raw));
    }

    #[test]
    fn string_aliases_and_numeric_names_are_coerced() {
        let raw = r#"{"entities":[{"name":53,"type":"Gene","aliases":"p53"}],"relations":[]}"#;
        let result = parse_extraction_response(raw);

        assert_eq!(result.entities[0].name, "53");
        assert_eq!(result.entities[0].entity_type, EntityType::Gene);
        assert_eq!(result.entities[0].aliases, vec!["p53".to_string()]);
    }
}
