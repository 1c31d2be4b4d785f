use super::{
    IndexBackend, IndexRecord, IndexSchema, InMemoryBackend, ItemOutcome, QdrantBackend,
    SearchFilter, StoreError,
};
use crate::config::{Config, VectorStoreBackend};
use crate::document::{Document, SearchResult};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Number of documents per bulk request unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone, Copy)]
enum Write<'a> {
    Upload(&'a [IndexRecord]),
    Merge(&'a [IndexRecord]),
    Delete(&'a [String]),
}

impl<'a> Write<'a> {
    fn label(self) -> &'static str {
        match self {
            Self::Upload(_) => "upload",
            Self::Merge(_) => "merge",
            Self::Delete(_) => "delete",
        }
    }

    fn len(self) -> usize {
        match self {
            Self::Upload(records) | Self::Merge(records) => records.len(),
            Self::Delete(ids) => ids.len(),
        }
    }

    fn batches(self, size: usize) -> Vec<Write<'a>> {
        match self {
            Self::Upload(records) => records.chunks(size).map(Self::Upload).collect(),
            Self::Merge(records) => records.chunks(size).map(Self::Merge).collect(),
            Self::Delete(ids) => ids.chunks(size).map(Self::Delete).collect(),
        }
    }
}

/// Boundary between the pipeline and an index backend.
///
/// Administrative calls and writes report success as a boolean; reads degrade to empty or
/// absent results. Backend errors are logged and never propagated.
#[derive(Clone)]
pub struct VectorStoreClient {
    backend: Arc<dyn IndexBackend>,
    schema: IndexSchema,
    batch_size: usize,
    retry: RetryPolicy,
}

impl VectorStoreClient {
    /// Client for `index_name` holding vectors of `dimensions` components.
    pub fn new(
        backend: Arc<dyn IndexBackend>,
        index_name: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            backend,
            schema: IndexSchema::for_documents(index_name, dimensions),
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the bulk batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Override the retry policy applied to every backend call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the client and backend described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let backend: Arc<dyn IndexBackend> = match config.vector_store_backend {
            VectorStoreBackend::Qdrant => Arc::new(QdrantBackend::new(
                &config.qdrant_url,
                config.qdrant_api_key.clone(),
            )?),
            VectorStoreBackend::Memory => Arc::new(InMemoryBackend::new()),
        };
        let retry = RetryPolicy::fixed(
            config.store_max_retries,
            Duration::from_millis(config.store_retry_delay_ms),
        );
        Ok(
            Self::new(backend, config.index_name.clone(), config.embedding_dimension)
                .with_batch_size(config.store_batch_size)
                .with_retry(retry),
        )
    }

    /// Name of the managed index.
    pub fn index_name(&self) -> &str {
        &self.schema.name
    }

    /// Create the index if needed.
    pub async fn create_index(&self) -> bool {
        let result = self
            .retry
            .run(|| self.backend.create_index(&self.schema), StoreError::is_transient)
            .await;
        match result {
            Ok(()) => {
                tracing::info!(index = %self.schema.name, "Index ready");
                true
            }
            Err(error) => {
                tracing::error!(
                    index = %self.schema.name,
                    attempts = error.attempts,
                    error = %error.last_error,
                    "Failed to create index"
                );
                false
            }
        }
    }

    /// Delete the index and every document in it.
    pub async fn delete_index(&self) -> bool {
        let result = self
            .retry
            .run(|| self.backend.delete_index(&self.schema.name), StoreError::is_transient)
            .await;
        match result {
            Ok(()) => {
                tracing::info!(index = %self.schema.name, "Index deleted");
                true
            }
            Err(error) => {
                tracing::error!(
                    index = %self.schema.name,
                    attempts = error.attempts,
                    error = %error.last_error,
                    "Failed to delete index"
                );
                false
            }
        }
    }

    /// Upsert one document.
    pub async fn add_document(&self, document: &Document) -> bool {
        self.add_documents(std::slice::from_ref(document)).await
    }

    /// Upsert documents in batches; `true` only if every item in every batch succeeded.
    pub async fn add_documents(&self, documents: &[Document]) -> bool {
        let records: Vec<IndexRecord> = documents.iter().map(IndexRecord::from).collect();
        self.write(Write::Upload(&records)).await
    }

    /// Merge one document into its stored record.
    pub async fn update_document(&self, document: &Document) -> bool {
        self.update_documents(std::slice::from_ref(document)).await
    }

    /// Merge documents into their stored records, batched like [`Self::add_documents`].
    pub async fn update_documents(&self, documents: &[Document]) -> bool {
        let records: Vec<IndexRecord> = documents.iter().map(IndexRecord::from).collect();
        self.write(Write::Merge(&records)).await
    }

    /// Remove one document.
    pub async fn delete_document(&self, id: &str) -> bool {
        self.delete_documents(&[id.to_string()]).await
    }

    /// Remove documents by id, batched like [`Self::add_documents`].
    pub async fn delete_documents(&self, ids: &[String]) -> bool {
        self.write(Write::Delete(ids)).await
    }

    /// Up to `top_k` results by descending score. Failures yield an empty result.
    pub async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Vec<SearchResult> {
        if top_k == 0 {
            return Vec::new();
        }

        let result = self
            .retry
            .run(
                || self.backend.search(&self.schema.name, vector, top_k, filter),
                StoreError::is_transient,
            )
            .await;

        match result {
            Ok(mut hits) => {
                hits.sort_by(|a, b| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                hits.truncate(top_k);
                tracing::debug!(index = %self.schema.name, hits = hits.len(), "Search completed");
                hits.into_iter().map(SearchResult::from).collect()
            }
            Err(error) => {
                tracing::warn!(
                    index = %self.schema.name,
                    attempts = error.attempts,
                    error = %error.last_error,
                    "Search failed; returning no results"
                );
                Vec::new()
            }
        }
    }

    /// Point lookup; `None` when missing or when the backend fails.
    pub async fn get_document(&self, id: &str) -> Option<IndexRecord> {
        let result = self
            .retry
            .run(|| self.backend.get(&self.schema.name, id), StoreError::is_transient)
            .await;
        match result {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(
                    index = %self.schema.name,
                    id,
                    attempts = error.attempts,
                    error = %error.last_error,
                    "Lookup failed; treating document as absent"
                );
                None
            }
        }
    }

    /// Whether a document with `id` is stored.
    pub async fn document_exists(&self, id: &str) -> bool {
        self.get_document(id).await.is_some()
    }

    /// Every batch is attempted even after a failure; the result is `false` if any failed.
    async fn write(&self, write: Write<'_>) -> bool {
        let total = write.len();
        if total == 0 {
            return true;
        }

        let mut all_succeeded = true;
        for (batch_index, batch) in write.batches(self.batch_size).into_iter().enumerate() {
            let result = self
                .retry
                .run(|| self.send(batch), StoreError::is_transient)
                .await;

            match result {
                Ok(outcomes) => {
                    let failed: Vec<&ItemOutcome> =
                        outcomes.iter().filter(|outcome| !outcome.succeeded()).collect();
                    if failed.is_empty() && outcomes.len() == batch.len() {
                        tracing::debug!(
                            index = %self.schema.name,
                            operation = batch.label(),
                            batch = batch_index,
                            items = batch.len(),
                            "Batch applied"
                        );
                        continue;
                    }
                    all_succeeded = false;
                    for outcome in &failed {
                        tracing::warn!(
                            index = %self.schema.name,
                            operation = batch.label(),
                            id = %outcome.id,
                            reason = outcome.error.as_deref().unwrap_or_default(),
                            "Batch item failed"
                        );
                    }
                    tracing::error!(
                        index = %self.schema.name,
                        operation = batch.label(),
                        batch = batch_index,
                        failed = failed.len().max(batch.len().saturating_sub(outcomes.len())),
                        items = batch.len(),
                        "Batch partially failed"
                    );
                }
                Err(error) => {
                    all_succeeded = false;
                    tracing::error!(
                        index = %self.schema.name,
                        operation = batch.label(),
                        batch = batch_index,
                        attempts = error.attempts,
                        error = %error.last_error,
                        "Batch failed"
                    );
                }
            }
        }

        if !all_succeeded {
            tracing::error!(
                index = %self.schema.name,
                operation = write.label(),
                total,
                "Bulk operation did not fully succeed"
            );
        }
        all_succeeded
    }

    async fn send(&self, batch: Write<'_>) -> Result<Vec<ItemOutcome>, StoreError> {
        let index = self.schema.name.as_str();
        match batch {
            Write::Upload(records) => self.backend.upload(index, records).await,
            Write::Merge(records) => self.backend.merge(index, records).await,
            Write::Delete(ids) => self.backend.delete(index, ids).await,
        }
    }
}

impl std::fmt::Debug for VectorStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreClient")
            .field("index", &self.schema.name)
            .field("batch_size", &self.batch_size)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
