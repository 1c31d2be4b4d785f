//! Document processor coordinating extraction, chunking, embedding, and vector store writes.

use crate::{
    config::Config,
    document::{Document, SearchResult, format_timestamp, metadata_keys},
    embedding::EmbeddingGenerator,
    extraction::{ByteStream, ExtractorRegistry},
    metrics::{MetricsSnapshot, ProcessingMetrics},
    processing::{
        chunking::{ChunkerSettings, TextChunker},
        types::ProcessingError,
    },
    vector_store::{SearchFilter, VectorStoreClient},
};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Runs the ingestion pipeline for one upload at a time.
///
/// Extraction happens once, then every chunk is embedded and written strictly in order. The
/// processor owns long-lived handles to the extractor table, embedding generator, vector store,
/// and metrics; construct it once and share it through an `Arc`.
pub struct DocumentProcessor {
    extractors: Arc<ExtractorRegistry>,
    chunker: TextChunker,
    embeddings: EmbeddingGenerator,
    store: Arc<VectorStoreClient>,
    metrics: Arc<ProcessingMetrics>,
    cleanup_on_failure: bool,
}

impl DocumentProcessor {
    /// Assemble a processor from its components. Cleanup on failure is enabled.
    pub fn new(
        extractors: ExtractorRegistry,
        chunker: TextChunker,
        embeddings: EmbeddingGenerator,
        store: Arc<VectorStoreClient>,
    ) -> Self {
        Self {
            extractors: Arc::new(extractors),
            chunker,
            embeddings,
            store,
            metrics: Arc::new(ProcessingMetrics::new()),
            cleanup_on_failure: true,
        }
    }

    /// Whether chunks already written are deleted when processing a document fails.
    pub fn with_cleanup_on_failure(mut self, enabled: bool) -> Self {
        self.cleanup_on_failure = enabled;
        self
    }

    /// Share an existing metrics accumulator.
    pub fn with_metrics(mut self, metrics: Arc<ProcessingMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build every component from the configuration and make sure the index exists.
    pub async fn from_config(config: &Config) -> Result<Self, ProcessingError> {
        tracing::info!("Initializing document processor");
        let chunker = TextChunker::new(ChunkerSettings {
            max_chunk_size: config.chunk_max_size,
            overlap_size: config.chunk_overlap_size,
        })?;
        let embeddings = EmbeddingGenerator::from_config(config)?;
        let store = Arc::new(VectorStoreClient::from_config(config)?);

        if !store.create_index().await {
            tracing::warn!(
                index = %store.index_name(),
                "Index could not be ensured; writes may fail"
            );
        }

        Ok(
            Self::new(ExtractorRegistry::with_defaults(), chunker, embeddings, store)
                .with_cleanup_on_failure(config.cleanup_on_failure),
        )
    }

    /// Vector store used for chunk writes.
    pub fn store(&self) -> &VectorStoreClient {
        &self.store
    }

    /// Whether `file_type` can be processed.
    pub fn is_supported(&self, file_type: &str) -> bool {
        self.extractors.is_supported(file_type)
    }

    /// Extract, chunk, embed, and store an upload. Returns the processed parent document.
    pub async fn process(
        &self,
        stream: ByteStream<'_>,
        file_name: &str,
        file_type: &str,
    ) -> Result<Document, ProcessingError> {
        self.process_with_cancellation(stream, file_name, file_type, &CancellationToken::new())
            .await
    }

    /// Like [`Self::process`], but stops before embedding the next chunk once `cancel` fires.
    ///
    /// Chunks written before cancellation stay in the store.
    pub async fn process_with_cancellation(
        &self,
        stream: ByteStream<'_>,
        file_name: &str,
        file_type: &str,
        cancel: &CancellationToken,
    ) -> Result<Document, ProcessingError> {
        tracing::info!(file_name, file_type, "Processing document");

        let text = match self.extractors.extract(stream, file_type).await {
            Ok(text) => text,
            Err(error) => {
                self.metrics.record_failure();
                tracing::warn!(file_name, file_type, error = %error, "Extraction failed");
                return Err(error.into());
            }
        };

        let mut document = Document::new(file_name, text, file_type);
        document.insert_metadata(metadata_keys::ORIGINAL_FILE_NAME, file_name);
        document.insert_metadata(metadata_keys::FILE_TYPE, file_type);
        document.insert_metadata(
            metadata_keys::PROCESSED_AT,
            format_timestamp(OffsetDateTime::now_utc()),
        );

        let chunks = self.chunker.chunk(document.content());
        let total = chunks.len();
        tracing::debug!(document_id = %document.id(), chunks = total, "Document chunked");

        let mut written: Vec<String> = Vec::with_capacity(total);
        for (index, content) in chunks.into_iter().enumerate() {
            if cancel.is_cancelled() {
                let error = ProcessingError::Cancelled {
                    document_id: document.id().to_string(),
                    completed: written.len(),
                    total,
                };
                return Err(self.abort(&written, error).await);
            }

            let vector = match self.embeddings.generate(&content).await {
                Ok(vector) => vector,
                Err(source) => {
                    let error = ProcessingError::EmbeddingFailed {
                        document_id: document.id().to_string(),
                        chunk_index: index,
                        source,
                    };
                    return Err(self.abort(&written, error).await);
                }
            };

            let chunk = Document::chunk_of(&document, index, total, content, vector);
            if !self.store.add_document(&chunk).await {
                let error = ProcessingError::StoreWriteFailed {
                    document_id: document.id().to_string(),
                    chunk_id: chunk.id().to_string(),
                };
                return Err(self.abort(&written, error).await);
            }
            tracing::debug!(
                document_id = %document.id(),
                chunk_index = index,
                chunk_id = %chunk.id(),
                "Chunk stored"
            );
            written.push(chunk.id().to_string());
        }

        document.mark_as_processed();
        self.metrics.record_document(total as u64);
        tracing::info!(
            document_id = %document.id(),
            file_name,
            chunks = total,
            "Document processed"
        );
        Ok(document)
    }

    /// Re-chunk and re-embed an already extracted document without writing to the store.
    pub async fn chunk(&self, document: &Document) -> Result<Vec<Document>, ProcessingError> {
        let pieces = self.chunker.chunk(document.content());
        let total = pieces.len();
        let mut chunks = Vec::with_capacity(total);

        for (index, content) in pieces.into_iter().enumerate() {
            let vector = self.embeddings.generate(&content).await.map_err(|source| {
                ProcessingError::EmbeddingFailed {
                    document_id: document.id().to_string(),
                    chunk_index: index,
                    source,
                }
            })?;
            chunks.push(Document::chunk_of(document, index, total, content, vector));
        }

        tracing::debug!(document_id = %document.id(), chunks = total, "Document re-chunked");
        Ok(chunks)
    }

    /// Embed `query` and return the `top_k` most similar stored chunks.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, ProcessingError> {
        let vector = self
            .embeddings
            .generate(query)
            .await
            .map_err(ProcessingError::QueryEmbeddingFailed)?;
        let results = self.store.search(&vector, top_k, filter).await;
        tracing::info!(top_k, hits = results.len(), "Search completed");
        Ok(results)
    }

    /// Current ingestion counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn abort(&self, written: &[String], error: ProcessingError) -> ProcessingError {
        self.metrics.record_failure();

        let cancelled = matches!(error, ProcessingError::Cancelled { .. });
        if self.cleanup_on_failure && !cancelled && !written.is_empty() {
            if self.store.delete_documents(written).await {
                tracing::info!(chunks = written.len(), "Removed chunks of failed document");
            } else {
                tracing::warn!(
                    chunks = written.len(),
                    "Could not remove every chunk of failed document"
                );
            }
        }

        tracing::error!(error = %error, kind = ?error.kind(), "Document processing aborted");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, EmbeddingClientError, HashingClient};
    use crate::retry::RetryPolicy;
    use crate::vector_store::InMemoryBackend;
    use async_trait::async_trait;

    struct FailingClient;

    #[async_trait]
    impl EmbeddingClient for FailingClient {
        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Err(EmbeddingClientError::GenerationFailed("offline".into()))
        }
    }

    fn processor(client: Box<dyn EmbeddingClient + Send + Sync>) -> DocumentProcessor {
        let store = VectorStoreClient::new(Arc::new(InMemoryBackend::new()), "docs", 8)
            .with_retry(RetryPolicy::none());
        DocumentProcessor::new(
            ExtractorRegistry::with_defaults(),
            TextChunker::new(ChunkerSettings::default()).expect("chunker"),
            EmbeddingGenerator::new(client, RetryPolicy::none()).with_dimension(8),
            Arc::new(store),
        )
    }

    #[tokio::test]
    async fn parent_metadata_records_provenance() {
        let processor = processor(Box::new(HashingClient::new(8)));
        assert!(processor.store().create_index().await);

        let mut stream = "Hello world.".as_bytes();
        let document = processor
            .process(&mut stream, "hello.txt", "txt")
            .await
            .expect("processed");

        assert!(document.is_processed());
        assert!(document.vector().is_empty());
        assert_eq!(document.metadata()[metadata_keys::ORIGINAL_FILE_NAME], "hello.txt");
        assert_eq!(document.metadata()[metadata_keys::FILE_TYPE], "txt");
        assert!(document.metadata().contains_key(metadata_keys::PROCESSED_AT));
        assert_eq!(processor.metrics_snapshot().chunks_indexed, 1);
    }

    #[tokio::test]
    async fn query_embedding_failure_is_reported() {
        let processor = processor(Box::new(FailingClient));
        let error = processor
            .search("anything", 3, None)
            .await
            .expect_err("embedding fails");
        assert_eq!(error.kind(), crate::processing::ErrorKind::EmbeddingFailed);
    }

    #[tokio::test]
    async fn empty_text_is_processed_without_chunks() {
        let processor = processor(Box::new(FailingClient));
        let mut stream = "   ".as_bytes();
        let document = processor
            .process(&mut stream, "blank.txt", "txt")
            .await
            .expect("nothing to embed");
        assert!(document.is_processed());
        assert_eq!(processor.metrics_snapshot().documents_processed, 1);
    }
}
