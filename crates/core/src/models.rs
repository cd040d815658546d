use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upload size cap applied by [`crate::DocumentStore::put`].
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub raw_text: String,
    pub char_count: usize,
    pub word_count: usize,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip)]
    pub artifact_path: Option<PathBuf>,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            char_count: self.char_count,
            word_count: self.word_count,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub char_count: usize,
    pub word_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Gene,
    Protein,
    #[default]
    Unknown,
}

impl EntityType {
    /// Maps a free-text label onto the vocabulary. Anything that is not
    /// `gene` or `protein` (case-insensitive) becomes `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "gene" => Self::Gene,
            "protein" => Self::Protein,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gene => "gene",
            Self::Protein => "protein",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub source: String,
    pub target: String,
    /// Kept verbatim, including labels outside [`crate::prompt::RELATION_TYPES`].
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExtractionResult {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default)]
    pub parse_error: bool,
}

impl ExtractionResult {
    pub fn recovered(entities: Vec<Entity>, relations: Vec<Relation>) -> Self {
        Self {
            entities,
            relations,
            raw_response: None,
            parse_error: false,
        }
    }

    /// Terminal failure: nothing usable could be decoded or recovered.
    pub fn unparsed(raw_response: &str) -> Self {
        Self {
            entities: Vec::new(),
            relations: Vec::new(),
            raw_response: Some(raw_response.to_string()),
            parse_error: true,
        }
    }
}

/// Optional narrowing of an extraction to named entities and relation types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExtractionTargets {
    pub entities: Vec<String>,
    pub relations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    #[serde(flatten)]
    pub result: ExtractionResult,
    pub model_used: String,
    pub documents_used: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    pub answer: String,
    pub model_used: String,
    pub documents_used: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters for a single completion round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub max_context_chars: usize,
    pub truncation_marker: &'static str,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            max_context_chars: 15_000,
            truncation_marker: "...[truncated]",
            temperature: 0.1,
            max_output_tokens: 4_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QaOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for QaOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 2_000,
        }
    }
}
