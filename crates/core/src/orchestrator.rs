use crate::context::assemble_context;
use crate::parser::{parse_with_stage, ParseStage};
use crate::prompt::{build_extraction_prompt, build_qa_prompt, extraction_user_message};
use crate::traits::ChatCompletion;
use crate::{
    ChatMessage, CompletionRequest, DocumentStore, ExtractionError, ExtractionOptions,
    ExtractionReport, ExtractionResult, ExtractionTargets, LlmError, QaOptions, QaReport,
};
use std::borrow::Cow;
use tracing::{info, warn};

const DEFAULT_MODEL_LABEL: &str = "default";

/// Cuts `text` to `max_chars` characters and appends `marker` when it was longer.
pub fn truncate_context<'a>(text: &'a str, max_chars: usize, marker: &str) -> Cow<'a, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{marker}", &text[..cut])),
    }
}

/// Runs extraction and QA round trips against a chat completion collaborator.
///
/// Each call makes exactly one completion request. Collaborator errors are
/// returned as-is; malformed model output is never an error and is reported
/// through [`ExtractionResult::parse_error`].
pub struct BioExtractor<L>
where
    L: ChatCompletion,
{
    llm: L,
    extraction: ExtractionOptions,
    qa: QaOptions,
}

impl<L> BioExtractor<L>
where
    L: ChatCompletion + Send + Sync,
{
    pub fn new(llm: L) -> Self {
        Self::with_options(llm, ExtractionOptions::default(), QaOptions::default())
    }

    pub fn with_options(llm: L, extraction: ExtractionOptions, qa: QaOptions) -> Self {
        Self { llm, extraction, qa }
    }

    pub fn llm(&self) -> &L {
        &self.llm
    }

    pub async fn extract(
        &self,
        text: &str,
        model: Option<&str>,
        targets: &ExtractionTargets,
    ) -> Result<ExtractionResult, LlmError> {
        let text = truncate_context(
            text,
            self.extraction.max_context_chars,
            self.extraction.truncation_marker,
        );
        let system_prompt = build_extraction_prompt(
            Some(targets.entities.as_slice()),
            Some(targets.relations.as_slice()),
        );
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(extraction_user_message(&text)),
        ];
        let request = CompletionRequest {
            model: model.map(str::to_string),
            temperature: self.extraction.temperature,
            max_output_tokens: self.extraction.max_output_tokens,
        };

        let raw = self.llm.complete(&messages, &request).await?;
        let (result, stage) = parse_with_stage(&raw);

        match stage {
            ParseStage::Failed => warn!(
                response_chars = raw.chars().count(),
                "extraction response could not be parsed"
            ),
            _ => info!(
                stage = ?stage,
                entities = result.entities.len(),
                relations = result.relations.len(),
                "extraction parsed"
            ),
        }

        Ok(result)
    }

    pub async fn answer(
        &self,
        question: &str,
        combined_text: &str,
        model: Option<&str>,
    ) -> Result<String, LlmError> {
        let messages = [
            ChatMessage::system(build_qa_prompt(combined_text)),
            ChatMessage::user(question),
        ];
        let request = CompletionRequest {
            model: model.map(str::to_string),
            temperature: self.qa.temperature,
            max_output_tokens: self.qa.max_output_tokens,
        };

        self.llm.complete(&messages, &request).await
    }

    /// Extracts from the selected stored documents (all of them for `None`).
    pub async fn extract_documents(
        &self,
        store: &DocumentStore,
        ids: Option<&[String]>,
        model: Option<&str>,
        targets: &ExtractionTargets,
    ) -> Result<ExtractionReport, ExtractionError> {
        let context = assemble_context(store, ids)?;
        let result = self.extract(&context.text, model, targets).await?;

        Ok(ExtractionReport {
            result,
            model_used: model_label(model),
            documents_used: context.documents_used,
        })
    }

    pub async fn ask_documents(
        &self,
        store: &DocumentStore,
        question: &str,
        ids: Option<&[String]>,
        model: Option<&str>,
    ) -> Result<QaReport, ExtractionError> {
        let context = assemble_context(store, ids)?;
        let answer = self.answer(question, &context.text, model).await?;
        info!(
            documents = context.documents_used,
            answer_chars = answer.chars().count(),
            "question answered"
        );

        Ok(QaReport {
            answer,
            model_used: model_label(model),
            documents_used: context.documents_used,
        })
    }
}

fn model_label(model: Option<&str>) -> String {
    model.unwrap_or(DEFAULT_MODEL_LABEL).to_string()
}
