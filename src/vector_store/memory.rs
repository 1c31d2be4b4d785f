//! Process-local index backend using cosine similarity.

use super::{IndexBackend, IndexRecord, IndexSchema, ItemOutcome, ScoredRecord, SearchFilter};
use super::types::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryIndex {
    dimensions: Option<usize>,
    records: HashMap<String, IndexRecord>,
}

/// Index backend that keeps records in memory.
///
/// Indexes are stored as nested maps: index name → record id → record. Suitable for dry runs
/// and tests; nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored in `index`, or `None` when the index is missing.
    pub async fn record_count(&self, index: &str) -> Option<usize> {
        let indexes = self.indexes.read().await;
        indexes.get(index).map(|entry| entry.records.len())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn check_vector(dimensions: Option<usize>, vector: &[f32]) -> Result<(), String> {
    if vector.is_empty() {
        return Err("record has no vector".to_string());
    }
    match dimensions {
        Some(expected) if expected != vector.len() => Err(format!(
            "vector has {} components, index expects {expected}",
            vector.len()
        )),
        _ => Ok(()),
    }
}

fn missing(index: &str) -> StoreError {
    StoreError::IndexMissing(index.to_string())
}

#[async_trait]
impl IndexBackend for InMemoryBackend {
    async fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError> {
        let mut indexes = self.indexes.write().await;
        indexes
            .entry(schema.name.clone())
            .or_insert_with(|| MemoryIndex {
                dimensions: schema.dimensions(),
                records: HashMap::new(),
            });
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), StoreError> {
        let mut indexes = self.indexes.write().await;
        indexes.remove(name);
        Ok(())
    }

    async fn upload(
        &self,
        index: &str,
        records: &[IndexRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes.get_mut(index).ok_or_else(|| missing(index))?;

        let outcomes = records
            .iter()
            .map(|record| match check_vector(entry.dimensions, &record.vector) {
                Ok(()) => {
                    entry.records.insert(record.id.clone(), record.clone());
                    ItemOutcome::applied(&record.id)
                }
                Err(reason) => ItemOutcome::failed(&record.id, reason),
            })
            .collect();
        Ok(outcomes)
    }

    async fn merge(
        &self,
        index: &str,
        records: &[IndexRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes.get_mut(index).ok_or_else(|| missing(index))?;

        let outcomes = records
            .iter()
            .map(|patch| {
                if !patch.vector.is_empty()
                    && let Err(reason) = check_vector(entry.dimensions, &patch.vector)
                {
                    return ItemOutcome::failed(&patch.id, reason);
                }
                match entry.records.get_mut(&patch.id) {
                    Some(stored) => {
                        stored.merge_from(patch);
                        ItemOutcome::applied(&patch.id)
                    }
                    None => ItemOutcome::failed(&patch.id, "document not found"),
                }
            })
            .collect();
        Ok(outcomes)
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes.get_mut(index).ok_or_else(|| missing(index))?;
        Ok(ids
            .iter()
            .map(|id| {
                entry.records.remove(id);
                ItemOutcome::applied(id)
            })
            .collect())
    }

    async fn search(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let indexes = self.indexes.read().await;
        let entry = indexes.get(index).ok_or_else(|| missing(index))?;

        let mut scored: Vec<ScoredRecord> = entry
            .records
            .values()
            .filter(|record| filter.is_none_or(|filter| filter.matches(record)))
            .map(|record| ScoredRecord {
                score: cosine_similarity(&record.vector, vector),
                record: record.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<IndexRecord>, StoreError> {
        let indexes = self.indexes.read().await;
        let entry = indexes.get(index).ok_or_else(|| missing(index))?;
        Ok(entry.records.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn record(id: &str, vector: Vec<f32>, document_id: &str) -> IndexRecord {
        let now = OffsetDateTime::now_utc();
        IndexRecord {
            id: id.to_string(),
            content: format!("content of {id}"),
            vector,
            metadata: HashMap::from([(
                "OriginalDocumentId".to_string(),
                document_id.to_string(),
            )]),
            created_at: now,
            updated_at: now,
        }
    }

    async fn backend_with_index() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend
            .create_index(&IndexSchema::for_documents("docs", 2))
            .await
            .expect("create index");
        backend
    }

    #[tokio::test]
    async fn writes_to_missing_index_fail() {
        let backend = InMemoryBackend::new();
        let error = backend
            .upload("docs", &[record("a", vec![1.0, 0.0], "d")])
            .await
            .expect_err("missing index");
        assert!(matches!(error, StoreError::IndexMissing(name) if name == "docs"));
    }

    #[tokio::test]
    async fn upload_rejects_wrong_dimension_per_item() {
        let backend = backend_with_index().await;
        let outcomes = backend
            .upload(
                "docs",
                &[record("a", vec![1.0, 0.0], "d"), record("b", vec![1.0], "d")],
            )
            .await
            .expect("upload");

        assert!(outcomes[0].succeeded());
        assert!(!outcomes[1].succeeded());
        assert_eq!(backend.record_count("docs").await, Some(1));
    }

    #[tokio::test]
    async fn search_orders_by_score_and_applies_filter() {
        let backend = backend_with_index().await;
        backend
            .upload(
                "docs",
                &[
                    record("near", vec![1.0, 0.1], "d1"),
                    record("far", vec![0.0, 1.0], "d1"),
                    record("other", vec![1.0, 0.0], "d2"),
                ],
            )
            .await
            .expect("upload");

        let all = backend
            .search("docs", &[1.0, 0.0], 2, None)
            .await
            .expect("search");
        let ids: Vec<_> = all.iter().map(|hit| hit.record.id.as_str()).collect();
        assert_eq!(ids, vec!["other", "near"]);

        let filter = SearchFilter::new().with_metadata("OriginalDocumentId", "d1");
        let filtered = backend
            .search("docs", &[1.0, 0.0], 10, Some(&filter))
            .await
            .expect("search");
        let ids: Vec<_> = filtered.iter().map(|hit| hit.record.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
    }

    #[tokio::test]
    async fn merge_updates_existing_and_fails_missing() {
        let backend = backend_with_index().await;
        backend
            .upload("docs", &[record("a", vec![1.0, 0.0], "d")])
            .await
            .expect("upload");

        let mut patch = record("a", Vec::new(), "d");
        patch.content = "revised".into();
        let outcomes = backend
            .merge("docs", &[patch, record("ghost", Vec::new(), "d")])
            .await
            .expect("merge");

        assert!(outcomes[0].succeeded());
        assert!(!outcomes[1].succeeded());
        let stored = backend.get("docs", "a").await.expect("get").expect("record");
        assert_eq!(stored.content, "revised");
        assert_eq!(stored.vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = backend_with_index().await;
        backend
            .upload("docs", &[record("a", vec![1.0, 0.0], "d")])
            .await
            .expect("upload");

        let outcomes = backend
            .delete("docs", &["a".to_string(), "missing".to_string()])
            .await
            .expect("delete");
        assert!(outcomes.iter().all(ItemOutcome::succeeded));
        assert_eq!(backend.get("docs", "a").await.expect("get"), None);
    }
}
