use thiserror::Error;

use crate::types::SourceEngine;

#[derive(Debug, Error)]
pub enum Error {
    /// OCR succeeded but produced no usable text.
    #[error("No extractable text in OCR result for '{0}'")]
    EmptyContent(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Query text is empty")]
    EmptyQuery,

    #[error("OCR failed: {0}")]
    OcrFailure(String),

    #[error("Collection '{collection}' exists with a different schema")]
    SchemaMismatch { collection: String },

    #[error("Engine mismatch: expected {expected}, found {found}")]
    EngineMismatch { expected: SourceEngine, found: SourceEngine },

    #[error("Chunk '{chunk_id}' does not belong to document '{document_id}'")]
    ForeignChunk { chunk_id: String, document_id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Errors that abort a whole ingestion run rather than a single file.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Error::IndexUnavailable(_) | Error::SchemaMismatch { .. } | Error::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
