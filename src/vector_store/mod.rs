//! Vector store: chunk persistence and similarity search.
//!
//! [`VectorStoreClient`] is the boundary the pipeline talks to. It batches writes, retries
//! backend calls, and converts every backend failure into a `false` return or an empty read.
//! Concrete storage lives behind [`IndexBackend`].

mod client;
pub mod filters;
mod memory;
mod qdrant;
pub mod types;

use async_trait::async_trait;

pub use client::{DEFAULT_BATCH_SIZE, VectorStoreClient};
pub use filters::{SearchFilter, TimeRange};
pub use memory::InMemoryBackend;
pub use qdrant::QdrantBackend;
pub use types::{
    FieldKind, FieldSpec, IndexRecord, IndexSchema, ItemOutcome, ScoredRecord, StoreError,
};

/// Storage engine operations used by [`VectorStoreClient`].
///
/// Batched writes return one [`ItemOutcome`] per input item. An `Err` means the call as a
/// whole failed and may be retried.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Create the index if it does not exist yet.
    async fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError>;

    /// Delete the index and everything in it. Deleting a missing index succeeds.
    async fn delete_index(&self, name: &str) -> Result<(), StoreError>;

    /// Insert or replace records.
    async fn upload(
        &self,
        index: &str,
        records: &[IndexRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError>;

    /// Merge records into existing ones, see [`IndexRecord::merge_from`].
    async fn merge(
        &self,
        index: &str,
        records: &[IndexRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError>;

    /// Remove records by id.
    async fn delete(&self, index: &str, ids: &[String]) -> Result<Vec<ItemOutcome>, StoreError>;

    /// Return up to `top_k` records matching `filter`, ordered by descending score.
    async fn search(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Point lookup by id.
    async fn get(&self, index: &str, id: &str) -> Result<Option<IndexRecord>, StoreError>;
}
