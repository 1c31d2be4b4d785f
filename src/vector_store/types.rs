//! Records, schema, and errors shared by the vector store client and its backends.

use crate::document::{Document, SearchResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors returned by index backends.
///
/// These never escape [`VectorStoreClient`](super::VectorStoreClient): writes report `false`
/// and reads degrade to empty results once retries are exhausted.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Target index does not exist.
    #[error("Index '{0}' does not exist")]
    IndexMissing(String),
    /// Stored payload could not be mapped back onto a record.
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Whether repeating the call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::UnexpectedStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidUrl(_) | Self::IndexMissing(_) | Self::InvalidRecord(_) => false,
        }
    }
}

/// Role a field plays in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Unique document key.
    Key,
    /// Full-text searchable string.
    SearchableText,
    /// Fixed-dimension vector used for similarity search.
    Vector {
        /// Number of components per vector.
        dimensions: usize,
    },
    /// String map; the listed keys are indexed for filtering.
    Metadata {
        /// Metadata keys exposed to filters.
        indexed_keys: Vec<String>,
    },
    /// Filterable timestamp.
    Timestamp,
}

/// Single field of an index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Persisted field name.
    pub name: &'static str,
    /// Role of the field.
    pub kind: FieldKind,
}

/// Index definition handed to backends on creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    /// Index (collection) name.
    pub name: String,
    /// Field definitions.
    pub fields: Vec<FieldSpec>,
}

impl IndexSchema {
    /// Schema holding chunk documents with vectors of `dimensions` components.
    pub fn for_documents(name: impl Into<String>, dimensions: usize) -> Self {
        use crate::document::metadata_keys;

        Self {
            name: name.into(),
            fields: vec![
                FieldSpec {
                    name: "id",
                    kind: FieldKind::Key,
                },
                FieldSpec {
                    name: "content",
                    kind: FieldKind::SearchableText,
                },
                FieldSpec {
                    name: "vector",
                    kind: FieldKind::Vector { dimensions },
                },
                FieldSpec {
                    name: "metadata",
                    kind: FieldKind::Metadata {
                        indexed_keys: vec![
                            metadata_keys::ORIGINAL_DOCUMENT_ID.to_string(),
                            metadata_keys::FILE_TYPE.to_string(),
                        ],
                    },
                },
                FieldSpec {
                    name: "createdAt",
                    kind: FieldKind::Timestamp,
                },
                FieldSpec {
                    name: "updatedAt",
                    kind: FieldKind::Timestamp,
                },
            ],
        }
    }

    /// Vector dimension declared by the schema.
    pub fn dimensions(&self) -> Option<usize> {
        self.fields.iter().find_map(|field| match field.kind {
            FieldKind::Vector { dimensions } => Some(dimensions),
            _ => None,
        })
    }
}

/// Persisted form of a chunk document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    /// Document identifier.
    pub id: String,
    /// Chunk text.
    pub content: String,
    /// Embedding vector. Empty when a backend omits vectors from reads.
    #[serde(default)]
    pub vector: Vec<f32>,
    /// Provenance metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Timestamp of the latest write.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl IndexRecord {
    /// Apply a merge-style update: content and timestamp are replaced, the vector is
    /// replaced only when `patch` carries one, and metadata entries are merged key by key.
    pub fn merge_from(&mut self, patch: &IndexRecord) {
        self.content.clone_from(&patch.content);
        if !patch.vector.is_empty() {
            self.vector.clone_from(&patch.vector);
        }
        self.metadata
            .extend(patch.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.updated_at = patch.updated_at;
    }
}

impl From<&Document> for IndexRecord {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id().to_string(),
            content: document.content().to_string(),
            vector: document.vector().to_vec(),
            metadata: document.metadata().clone(),
            created_at: document.created_at(),
            updated_at: document.last_modified_at(),
        }
    }
}

/// Per-item result of a batched write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Identifier of the affected document.
    pub id: String,
    /// Failure reason; `None` when the item was applied.
    pub error: Option<String>,
}

impl ItemOutcome {
    /// Successful outcome for `id`.
    pub fn applied(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: None,
        }
    }

    /// Failed outcome for `id`.
    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: Some(reason.into()),
        }
    }

    /// Whether the item was applied.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Record returned by a similarity search together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// Matching record.
    pub record: IndexRecord,
    /// Similarity score; higher is more similar.
    pub score: f32,
}

impl From<ScoredRecord> for SearchResult {
    fn from(scored: ScoredRecord) -> Self {
        Self {
            id: scored.record.id,
            content: scored.record.content,
            score: scored.score,
            metadata: scored.record.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(id: &str) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            content: "original".into(),
            vector: vec![1.0, 0.0],
            metadata: HashMap::from([("ChunkIndex".to_string(), "0".to_string())]),
            created_at: datetime!(2024-05-01 10:00 UTC),
            updated_at: datetime!(2024-05-01 10:00 UTC),
        }
    }

    #[test]
    fn schema_declares_persisted_fields() {
        let schema = IndexSchema::for_documents("docs", 384);
        let names: Vec<_> = schema.fields.iter().map(|field| field.name).collect();
        assert_eq!(
            names,
            vec!["id", "content", "vector", "metadata", "createdAt", "updatedAt"]
        );
        assert_eq!(schema.dimensions(), Some(384));
    }

    #[test]
    fn merge_keeps_vector_when_patch_has_none() {
        let mut stored = record("a");
        let mut patch = record("a");
        patch.content = "revised".into();
        patch.vector.clear();
        patch.metadata = HashMap::from([("Reviewed".to_string(), "yes".to_string())]);
        patch.updated_at = datetime!(2024-05-02 08:30 UTC);

        stored.merge_from(&patch);

        assert_eq!(stored.content, "revised");
        assert_eq!(stored.vector, vec![1.0, 0.0]);
        assert_eq!(stored.metadata["ChunkIndex"], "0");
        assert_eq!(stored.metadata["Reviewed"], "yes");
        assert_eq!(stored.created_at, datetime!(2024-05-01 10:00 UTC));
        assert_eq!(stored.updated_at, datetime!(2024-05-02 08:30 UTC));
    }

    #[test]
    fn record_serializes_persisted_field_names() {
        let value = serde_json::to_value(record("a")).expect("serialize");
        let object = value.as_object().expect("object");
        for key in ["id", "content", "vector", "metadata", "createdAt", "updatedAt"] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object["createdAt"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn server_errors_are_transient_but_missing_index_is_not() {
        let server = StoreError::UnexpectedStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        let client = StoreError::UnexpectedStatus {
            status: StatusCode::BAD_REQUEST,
            body: String::new(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!StoreError::IndexMissing("docs".into()).is_transient());
    }
}
