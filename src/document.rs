//! Document entities shared by the pipeline stages.
//!
//! A parent [`Document`] holds the full extracted text of an upload. Each chunk of that text
//! becomes its own `Document` whose id is derived from the parent id and the chunk position,
//! so re-processing the same parent overwrites rather than duplicates chunk records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Metadata keys written by the processing pipeline.
pub mod metadata_keys {
    /// File name supplied with the upload.
    pub const ORIGINAL_FILE_NAME: &str = "OriginalFileName";
    /// Declared file type of the upload.
    pub const FILE_TYPE: &str = "FileType";
    /// RFC3339 timestamp of when processing started.
    pub const PROCESSED_AT: &str = "ProcessedAt";
    /// Identifier of the parent document a chunk was cut from.
    pub const ORIGINAL_DOCUMENT_ID: &str = "OriginalDocumentId";
    /// Zero-based position of a chunk within its parent.
    pub const CHUNK_INDEX: &str = "ChunkIndex";
    /// Number of chunks produced for the parent.
    pub const TOTAL_CHUNKS: &str = "TotalChunks";
}

/// Build the identifier of the chunk at `index` within `parent_id`.
pub fn chunk_id(parent_id: &str, index: usize) -> String {
    format!("{parent_id}_chunk_{index}")
}

/// A unit of content moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    id: String,
    name: String,
    file_type: String,
    content: String,
    vector: Vec<f32>,
    metadata: HashMap<String, String>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    last_modified_at: OffsetDateTime,
    is_processed: bool,
    processing_error: Option<String>,
}

impl Document {
    /// Create an unprocessed document with a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, content, file_type)
    }

    fn with_id(
        id: String,
        name: impl Into<String>,
        content: impl Into<String>,
        file_type: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            name: name.into(),
            file_type: file_type.into(),
            content: content.into(),
            vector: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            last_modified_at: now,
            is_processed: false,
            processing_error: None,
        }
    }

    /// Build the embedded chunk at `index` of `total` cut from `parent`.
    ///
    /// Chunk documents are born processed: they only exist once their vector is known.
    pub fn chunk_of(
        parent: &Document,
        index: usize,
        total: usize,
        content: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        let mut chunk = Self::with_id(
            chunk_id(&parent.id, index),
            format!("{}_chunk_{index}", parent.name),
            content,
            parent.file_type.clone(),
        );
        chunk.vector = vector;
        chunk.is_processed = true;
        chunk.metadata.insert(
            metadata_keys::ORIGINAL_DOCUMENT_ID.to_string(),
            parent.id.clone(),
        );
        chunk
            .metadata
            .insert(metadata_keys::CHUNK_INDEX.to_string(), index.to_string());
        chunk
            .metadata
            .insert(metadata_keys::TOTAL_CHUNKS.to_string(), total.to_string());
        chunk
    }

    /// Unique identifier, fixed at creation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Descriptive name, usually the uploaded file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared file type.
    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Raw or chunked text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Embedding vector; empty until embedded.
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Provenance metadata.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Timestamp of the latest mutation.
    pub fn last_modified_at(&self) -> OffsetDateTime {
        self.last_modified_at
    }

    /// Whether every derived chunk has been embedded and stored.
    pub fn is_processed(&self) -> bool {
        self.is_processed
    }

    /// Failure recorded by the last processing attempt, if any.
    pub fn processing_error(&self) -> Option<&str> {
        self.processing_error.as_deref()
    }

    /// Insert or replace a metadata entry.
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
        self.touch();
    }

    /// Attach an embedding vector.
    pub fn set_vector(&mut self, vector: Vec<f32>) {
        self.vector = vector;
        self.touch();
    }

    /// Flag the document as fully processed and clear any earlier failure.
    pub fn mark_as_processed(&mut self) {
        self.is_processed = true;
        self.processing_error = None;
        self.touch();
    }

    /// Record a processing failure.
    pub fn mark_as_failed(&mut self, error: impl Into<String>) {
        self.is_processed = false;
        self.processing_error = Some(error.into());
        self.touch();
    }

    /// Replace the content. Previously derived chunks are no longer valid until the document
    /// is chunked and embedded again.
    pub fn update_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.is_processed = false;
        self.touch();
    }

    fn touch(&mut self) {
        let now = OffsetDateTime::now_utc();
        // Keep the ordering monotonic even when two mutations land in the same clock tick.
        self.last_modified_at = now.max(self.last_modified_at);
    }
}

/// Similarity search hit returned by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Identifier of the matching chunk document.
    pub id: String,
    /// Stored chunk text.
    pub content: String,
    /// Similarity score; higher is more similar.
    pub score: f32,
    /// Provenance metadata stored with the chunk.
    pub metadata: HashMap<String, String>,
}

/// Format a timestamp the way the pipeline stores it.
pub(crate) fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}
