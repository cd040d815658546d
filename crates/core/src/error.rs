use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("text upload is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("unsupported file type: {0} (only pdf and txt files are supported)")]
    UnsupportedFile(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("completion returned no content")]
    EmptyCompletion,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Nothing matched the requested document ids, or the store is empty.
    #[error("no documents available, upload documents first")]
    NoDocuments,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
