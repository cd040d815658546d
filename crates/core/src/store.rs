use crate::context::combine_documents;
use crate::ingest::{document_text, is_supported_upload};
use crate::models::{Document, DocumentSummary, MAX_UPLOAD_BYTES};
use crate::IngestError;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// What happened to the file backing a deleted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactCleanup {
    NotApplicable,
    Removed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Logical deletion; independent of artifact cleanup.
    pub removed: bool,
    pub artifact: ArtifactCleanup,
}

impl DeleteOutcome {
    fn not_found() -> Self {
        Self {
            removed: false,
            artifact: ArtifactCleanup::NotApplicable,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    order: Vec<String>,
    documents: HashMap<String, Document>,
    reserved: HashSet<String>,
}

impl StoreInner {
    fn is_taken(&self, id: &str) -> bool {
        self.documents.contains_key(id) || self.reserved.contains(id)
    }
}

/// In-memory document store, shared by reference between callers.
///
/// Reads run concurrently; every mutation takes the write lock for the
/// duration of a single map update, so ids never collide and a second delete
/// of the same id simply reports "not found".
#[derive(Default)]
pub struct DocumentStore {
    inner: RwLock<StoreInner>,
    upload_dir: Option<PathBuf>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that keeps each uploaded file under `dir` as `{id}_{filename}`.
    pub fn with_upload_dir(dir: impl Into<PathBuf>) -> Result<Self, IngestError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            inner: RwLock::default(),
            upload_dir: Some(dir),
        })
    }

    pub fn upload_dir(&self) -> Option<&Path> {
        self.upload_dir.as_deref()
    }

    /// Converts an uploaded file to text and records it.
    pub fn put(&self, filename: &str, bytes: &[u8]) -> Result<DocumentSummary, IngestError> {
        let filename = upload_file_name(filename)?;
        if !is_supported_upload(&filename) {
            return Err(IngestError::UnsupportedFile(filename));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(IngestError::InvalidArgument(format!(
                "{filename} is {} bytes, uploads are limited to {MAX_UPLOAD_BYTES}",
                bytes.len()
            )));
        }

        let text = document_text(&filename, bytes)?;
        let id = self.reserve_id();

        let artifact_path = match self.write_artifact(&id, &filename, bytes) {
            Ok(path) => path,
            Err(error) => {
                self.inner.write().reserved.remove(&id);
                return Err(error);
            }
        };

        Ok(self.commit(id, filename, text, artifact_path))
    }

    /// Records already-extracted text with no backing artifact.
    pub fn insert_text(&self, filename: &str, text: String) -> DocumentSummary {
        let id = self.reserve_id();
        self.commit(id, filename.to_string(), text, None)
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.inner.read().documents.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().documents.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summaries in insertion order, without document text.
    pub fn list(&self) -> Vec<DocumentSummary> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.documents.get(id))
            .map(Document::summary)
            .collect()
    }

    /// First `max_chars` characters of a document, with `...` appended when cut.
    pub fn preview(&self, id: &str, max_chars: usize) -> Option<String> {
        let inner = self.inner.read();
        let document = inner.documents.get(id)?;
        if document.char_count <= max_chars {
            return Some(document.raw_text.clone());
        }
        let head: String = document.raw_text.chars().take(max_chars).collect();
        Some(format!("{head}..."))
    }

    pub fn delete(&self, id: &str) -> DeleteOutcome {
        let removed = {
            let mut inner = self.inner.write();
            let removed = inner.documents.remove(id);
            if removed.is_some() {
                inner.order.retain(|existing| existing != id);
            }
            removed
        };

        let Some(document) = removed else {
            return DeleteOutcome::not_found();
        };

        let artifact = match &document.artifact_path {
            None => ArtifactCleanup::NotApplicable,
            Some(path) => match fs::remove_file(path) {
                Ok(()) => ArtifactCleanup::Removed,
                Err(error) => {
                    warn!(id, path = %path.display(), error = %error, "artifact cleanup failed");
                    ArtifactCleanup::Failed(error.to_string())
                }
            },
        };

        debug!(id, "document deleted");
        DeleteOutcome {
            removed: true,
            artifact,
        }
    }

    /// Labeled text of the selected documents; see [`Self::with_selected`].
    pub fn combined_text(&self, ids: Option<&[String]>) -> String {
        self.with_selected(ids, combine_documents)
    }

    /// Runs `f` over the selected documents under a single read lock.
    ///
    /// `None` or an empty slice selects every document in store order.
    /// Otherwise documents follow the requested order, unknown ids are
    /// skipped and repeated ids count once.
    pub fn with_selected<R>(
        &self,
        ids: Option<&[String]>,
        f: impl FnOnce(&[&Document]) -> R,
    ) -> R {
        let inner = self.inner.read();
        let selected: Vec<&Document> = match ids {
            Some(ids) if !ids.is_empty() => {
                let mut seen = HashSet::new();
                let mut selected = Vec::new();
                for id in ids {
                    if !seen.insert(id.as_str()) {
                        continue;
                    }
                    if let Some(document) = inner.documents.get(id) {
                        selected.push(document);
                    }
                }
                selected
            }
            _ => inner
                .order
                .iter()
                .filter_map(|id| inner.documents.get(id))
                .collect(),
        };
        f(&selected)
    }

    fn reserve_id(&self) -> String {
        let mut inner = self.inner.write();
        loop {
            let candidate = Uuid::new_v4().simple().to_string();
            if !inner.is_taken(&candidate) {
                inner.reserved.insert(candidate.clone());
                return candidate;
            }
        }
    }

    fn write_artifact(
        &self,
        id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Option<PathBuf>, IngestError> {
        let Some(dir) = &self.upload_dir else {
            return Ok(None);
        };
        let path = dir.join(format!("{id}_{filename}"));
        fs::write(&path, bytes)?;
        Ok(Some(path))
    }

    fn commit(
        &self,
        id: String,
        filename: String,
        raw_text: String,
        artifact_path: Option<PathBuf>,
    ) -> DocumentSummary {
        let document = Document {
            char_count: raw_text.chars().count(),
            word_count: raw_text.split_whitespace().count(),
            id: id.clone(),
            filename,
            raw_text,
            uploaded_at: Utc::now(),
            artifact_path,
        };
        let summary = document.summary();

        let mut inner = self.inner.write();
        inner.reserved.remove(&id);
        inner.order.push(id.clone());
        inner.documents.insert(id, document);

        debug!(
            id = %summary.id,
            filename = %summary.filename,
            char_count = summary.char_count,
            "document stored"
        );
        summary
    }
}

/// Final path component of an uploaded name, so uploads cannot escape the upload dir.
fn upload_file_name(filename: &str) -> Result<String, IngestError> {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| IngestError::InvalidArgument(format!("upload has no file name: {filename}")))
}
