use crate::{Document, DocumentStore, ExtractionError};

pub const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    pub documents_used: usize,
}

pub fn render_document_block(document: &Document) -> String {
    format!(
        "=== Document: {} ===\n{}",
        document.filename, document.raw_text
    )
}

pub fn combine_documents(documents: &[&Document]) -> String {
    documents
        .iter()
        .map(|document| render_document_block(document))
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Builds the prompt context for the selected documents.
///
/// `None` or an empty id list selects every stored document. Unknown ids are
/// skipped; an empty selection is an input error.
pub fn assemble_context(
    store: &DocumentStore,
    ids: Option<&[String]>,
) -> Result<AssembledContext, ExtractionError> {
    let context = store.with_selected(ids, |documents| AssembledContext {
        text: combine_documents(documents),
        documents_used: documents.len(),
    });

    if context.documents_used == 0 || context.text.is_empty() {
        return Err(ExtractionError::NoDocuments);
    }

    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_names_the_document_before_its_text() {
        let store = DocumentStore::new();
        let summary = store.insert_text("paper.txt", "TP53 binds MDM2.".to_string());
        let document = store.get(&summary.id).expect("document should exist");

        assert_eq!(
            render_document_block(&document),
            "=== Document: paper.txt ===\nTP53 binds MDM2."
        );
    }

    #[test]
    fn empty_store_is_an_input_error() {
        let store = DocumentStore::new();
        let result = assemble_context(&store, None);
        assert!(matches!(result, Err(ExtractionError::NoDocuments)));
    }

    #[test]
    fn unknown_ids_only_is_an_input_error() {
        let store = DocumentStore::new();
        store.insert_text("a.txt", "alpha".to_string());

        let ids = vec!["missing".to_string()];
        let result = assemble_context(&store, Some(&ids));
        assert!(matches!(result, Err(ExtractionError::NoDocuments)));
    }

    #[test]
    fn context_counts_contributing_documents() -> Result<(), Box<dyn std::error::Error>> {
        let store = DocumentStore::new();
        let first = store.insert_text("a.txt", "alpha".to_string());
        store.insert_text("b.txt", "beta".to_string());

        let ids = vec![first.id.clone(), "missing".to_string()];
        let context = assemble_context(&store, Some(&ids))?;
        assert_eq!(context.documents_used, 1);
        assert_eq!(context.text, "=== Document: a.txt ===\nalpha");

        let everything = assemble_context(&store, None)?;
        assert_eq!(everything.documents_used, 2);
        assert_eq!(
            everything.text,
            "=== Document: a.txt ===\nalpha\n\n=== Document: b.txt ===\nbeta"
        );
        Ok(())
    }
}
