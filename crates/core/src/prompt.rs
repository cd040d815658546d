/// Relationship vocabulary offered to the model. Labels outside this list are
/// still accepted from responses.
pub const RELATION_TYPES: [(&str, &str); 10] = [
    ("phosphorylation", "one entity phosphorylates another"),
    ("methylation", "one entity methylates another"),
    ("transcription", "transcriptional regulation"),
    ("binding", "physical binding/interaction"),
    ("activation", "one entity activates another"),
    ("inhibition", "one entity inhibits another"),
    ("expression", "expression regulation"),
    ("degradation", "one entity degrades another"),
    ("localization", "affects cellular localization"),
    ("modification", "other post-translational modifications"),
];

const EXTRACTION_PREAMBLE: &str = r#"You are an expert biomedical text mining system. Extract all genes, proteins, and their biological relationships from scientific text.

Output a valid JSON object with this exact structure:
{
  "entities": [
    {
      "name": "gene/protein name",
      "type": "gene" or "protein",
      "aliases": ["alternative names if mentioned"],
      "description": "brief description from text"
    }
  ],
  "relations": [
    {
      "source": "entity1 name",
      "target": "entity2 name",
      "type": "relationship type",
      "description": "brief description of the relationship",
      "evidence": "quote from text supporting this relationship"
    }
  ]
}

Relationship types to look for:"#;

const EXTRACTION_CLOSING: &str = "Be thorough and extract ALL mentioned genes/proteins and their relationships.
Only output the JSON, no additional text.";

const QA_INSTRUCTIONS: &str = r#"Answer the question based ONLY on the information in the documents above. If the answer is not found in the documents, say "I could not find this information in the provided documents."

Be precise, cite relevant sections, and maintain scientific accuracy."#;

pub fn base_extraction_prompt() -> String {
    let vocabulary = RELATION_TYPES
        .iter()
        .map(|(label, meaning)| format!("- {label}: {meaning}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{EXTRACTION_PREAMBLE}\n{vocabulary}\n\n{EXTRACTION_CLOSING}")
}

/// System prompt for extraction, narrowed by the optional targets.
///
/// Directives are appended in a fixed order: entity names first, then
/// relation types. Blank target names are ignored.
pub fn build_extraction_prompt(
    target_entities: Option<&[String]>,
    target_relations: Option<&[String]>,
) -> String {
    let mut prompt = base_extraction_prompt();

    if let Some(entities) = non_empty_targets(target_entities) {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: Focus ONLY on relationships involving these specific entities: {entities}. Do not extract other unrelated entities."
        ));
    }

    if let Some(relations) = non_empty_targets(target_relations) {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: Extract ONLY these specific relationship types: {relations}."
        ));
    }

    prompt
}

fn non_empty_targets(targets: Option<&[String]>) -> Option<String> {
    let names = targets?
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();

    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

pub fn extraction_user_message(text: &str) -> String {
    format!(
        "Extract all genes, proteins, and their relationships from the following scientific text:\n\n{text}"
    )
}

/// QA system prompt with the combined document text embedded verbatim.
pub fn build_qa_prompt(context: &str) -> String {
    format!(
        "Based on the following scientific document(s), answer the user's question.\n\nDOCUMENTS:\n{context}\n\n---\n\n{QA_INSTRUCTIONS}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn base_prompt_lists_every_relation_type() {
        let prompt = base_extraction_prompt();
        for (label, _) in RELATION_TYPES {
            assert!(prompt.contains(&format!("- {label}:")), "missing {label}");
        }
        assert!(prompt.contains("\"aliases\""));
        assert!(prompt.contains("\"evidence\""));
    }

    #[test]
    fn no_targets_yields_base_prompt() {
        assert_eq!(build_extraction_prompt(None, None), base_extraction_prompt());
        assert_eq!(
            build_extraction_prompt(Some(&[]), Some(&[])),
            base_extraction_prompt()
        );
    }

    #[test]
    fn entity_directive_joins_names() {
        let entities = strings(&["TP53", "MDM2"]);
        let prompt = build_extraction_prompt(Some(&entities), None);
        assert!(prompt.ends_with(
            "involving these specific entities: TP53, MDM2. Do not extract other unrelated entities."
        ));
    }

    #[test]
    fn entity_directive_precedes_relation_directive() {
        let entities = strings(&["TP53"]);
        let relations = strings(&["binding", "inhibition"]);
        let prompt = build_extraction_prompt(Some(&entities), Some(&relations));

        let entity_at = prompt.find("specific entities: TP53").expect("entity directive");
        let relation_at = prompt
            .find("relationship types: binding, inhibition.")
            .expect("relation directive");
        assert!(entity_at < relation_at);
    }

    #[test]
    fn blank_target_names_are_ignored() {
        let entities = strings(&["  ", ""]);
        assert_eq!(
            build_extraction_prompt(Some(&entities), None),
            base_extraction_prompt()
        );
    }

    #[test]
    fn qa_prompt_embeds_context_verbatim() {
        let context = "=== Document: a.txt ===\nTP53 binds MDM2.";
        let prompt = build_qa_prompt(context);
        assert!(prompt.contains(&format!("DOCUMENTS:\n{context}\n\n---")));
    }
}
