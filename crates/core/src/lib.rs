pub mod context;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod pdf;
pub mod prompt;
pub mod store;
pub mod traits;

pub use context::{assemble_context, combine_documents, render_document_block, AssembledContext};
pub use error::{ExtractionError, IngestError, LlmError};
pub use ingest::{
    discover_documents, document_text, ingest_file, ingest_paths, is_supported_upload,
    IngestionReport, SkippedFile,
};
pub use llm::{LlmClientConfig, OpenAiCompatibleClient};
pub use models::{
    ChatMessage, CompletionRequest, Document, DocumentSummary, Entity, EntityType,
    ExtractionOptions, ExtractionReport, ExtractionResult, ExtractionTargets, ModelInfo, QaOptions,
    QaReport, Relation, Role, MAX_UPLOAD_BYTES,
};
pub use orchestrator::{truncate_context, BioExtractor};
pub use parser::{parse_extraction_response, parse_with_stage, ParseStage};
pub use pdf::{extract_pdf_text, PageText, PdfTextExtractor};
pub use prompt::{build_extraction_prompt, build_qa_prompt, RELATION_TYPES};
pub use store::{ArtifactCleanup, DeleteOutcome, DocumentStore};
pub use traits::ChatCompletion;
