use crate::pdf::extract_pdf_text;
use crate::{DocumentStore, DocumentSummary, IngestError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "text"];

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn is_supported_upload(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Converts uploaded bytes into document text based on the file extension.
///
/// PDFs go through lopdf, `.txt`/`.text` must be valid UTF-8, anything else
/// is decoded lossily.
pub fn document_text(filename: &str, bytes: &[u8]) -> Result<String, IngestError> {
    match extension_of(filename).as_deref() {
        Some("pdf") => extract_pdf_text(bytes),
        Some("txt") | Some("text") => Ok(String::from_utf8(bytes.to_vec())?),
        _ => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_supported_upload);

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub documents: Vec<DocumentSummary>,
    pub skipped_files: Vec<SkippedFile>,
}

pub fn ingest_file(store: &DocumentStore, path: &Path) -> Result<DocumentSummary, IngestError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::InvalidArgument(format!("path missing filename: {}", path.display()))
        })?;
    let bytes = fs::read(path)?;
    store.put(name, &bytes)
}

/// Loads every path into the store, recording failures instead of aborting.
pub fn ingest_paths(store: &DocumentStore, paths: &[PathBuf]) -> Result<IngestionReport, IngestError> {
    if paths.is_empty() {
        return Err(IngestError::InvalidArgument(
            "no documents given to ingest".to_string(),
        ));
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in paths {
        match ingest_file(store, path) {
            Ok(summary) => documents.push(summary),
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped document");
                skipped_files.push(SkippedFile {
                    path: path.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(IngestionReport {
        documents,
        skipped_files,
    })
}
