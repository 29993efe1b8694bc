//! Document ingestion: extraction, chunking, embedding, storage.

pub mod chunker;
pub mod document;
pub mod pdf;
pub mod resume;
pub mod website;

pub use document::DocumentIngestor;

use thiserror::Error;

/// Errors raised while driving a document through the pipeline.
/// Extraction and storage failures fail the job; embedding failures do
/// not reach here (the embedding client degrades internally).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("no text could be extracted from the content")]
    EmptyText,

    #[error("embedding dimension {actual} does not match configured {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("storage failed: {0}")]
    Storage(#[from] sqlx::Error),
}
