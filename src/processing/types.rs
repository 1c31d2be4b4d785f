//! Error taxonomy for the processing pipeline.

use crate::embedding::{EmbeddingClientError, EmbeddingError};
use crate::extraction::ExtractionError;
use crate::vector_store::StoreError;
use thiserror::Error;

/// Errors produced while configuring the chunker.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// A zero maximum chunk size was requested.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Coarse classification of a [`ProcessingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No extractor handles the declared file type.
    UnsupportedFormat,
    /// The stream could not be read or parsed.
    ExtractionFailed,
    /// Embedding retries were exhausted.
    EmbeddingFailed,
    /// A chunk could not be written to the vector store.
    StoreWriteFailed,
    /// Processing stopped on a cancellation signal.
    Cancelled,
    /// A pipeline component could not be constructed.
    Setup,
}

/// Errors emitted by the document processor.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Extraction failed; no document was created.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// A chunk could not be embedded; remaining chunks were skipped.
    #[error("Failed to embed chunk {chunk_index} of document {document_id}: {source}")]
    EmbeddingFailed {
        /// Parent document identifier.
        document_id: String,
        /// Position of the failing chunk.
        chunk_index: usize,
        /// Exhausted retry error.
        #[source]
        source: EmbeddingError,
    },
    /// The query text of a search could not be embedded.
    #[error("Failed to embed search query: {0}")]
    QueryEmbeddingFailed(#[source] EmbeddingError),
    /// The vector store did not accept a chunk; remaining chunks were skipped.
    #[error("Failed to store chunk {chunk_id} of document {document_id}")]
    StoreWriteFailed {
        /// Parent document identifier.
        document_id: String,
        /// Identifier of the chunk that was not written.
        chunk_id: String,
    },
    /// Cancellation was requested before all chunks were embedded.
    #[error("Processing of document {document_id} cancelled after {completed} of {total} chunks")]
    Cancelled {
        /// Parent document identifier.
        document_id: String,
        /// Chunks embedded and stored before cancellation.
        completed: usize,
        /// Chunks produced for the document.
        total: usize,
    },
    /// Chunker settings were invalid.
    #[error("Invalid chunker settings: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding client could not be built.
    #[error("Failed to initialize embedding client: {0}")]
    EmbeddingSetup(#[from] EmbeddingClientError),
    /// Vector store client could not be built.
    #[error("Failed to initialize vector store: {0}")]
    StoreSetup(#[from] StoreError),
}

impl ProcessingError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction(error) if error.is_unsupported_format() => {
                ErrorKind::UnsupportedFormat
            }
            Self::Extraction(_) => ErrorKind::ExtractionFailed,
            Self::EmbeddingFailed { .. } | Self::QueryEmbeddingFailed(_) => {
                ErrorKind::EmbeddingFailed
            }
            Self::StoreWriteFailed { .. } => ErrorKind::StoreWriteFailed,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Chunking(_) | Self::EmbeddingSetup(_) | Self::StoreSetup(_) => ErrorKind::Setup,
        }
    }
}
