//! Search filters and their translation to backend query syntax.

use super::types::IndexRecord;
use crate::document::format_timestamp;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Inclusive timestamp boundaries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: Option<OffsetDateTime>,
    /// Inclusive upper bound.
    pub end: Option<OffsetDateTime>,
}

impl TimeRange {
    fn contains(&self, value: OffsetDateTime) -> bool {
        self.start.is_none_or(|start| value >= start) && self.end.is_none_or(|end| value <= end)
    }

    fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Restricts search candidates before scoring.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    /// Metadata entries that must match exactly.
    pub metadata: BTreeMap<String, String>,
    /// Bounds applied to `createdAt`.
    pub created: Option<TimeRange>,
}

impl SearchFilter {
    /// Filter with no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata[key] == value`.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Require `createdAt` to fall within the inclusive range.
    pub fn created_between(
        mut self,
        start: Option<OffsetDateTime>,
        end: Option<OffsetDateTime>,
    ) -> Self {
        self.created = Some(TimeRange { start, end });
        self
    }

    /// Whether the filter imposes no constraint.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.created.is_none_or(|range| range.is_unbounded())
    }

    /// Evaluate the filter against a stored record.
    pub fn matches(&self, record: &IndexRecord) -> bool {
        let metadata_matches = self
            .metadata
            .iter()
            .all(|(key, value)| record.metadata.get(key) == Some(value));
        let created_matches = self
            .created
            .is_none_or(|range| range.contains(record.created_at));
        metadata_matches && created_matches
    }
}

/// Compose the Qdrant filter payload for `filter`, or `None` when it is unconstrained.
pub fn to_qdrant_filter(filter: &SearchFilter) -> Option<Value> {
    let mut must: Vec<Value> = filter
        .metadata
        .iter()
        .map(|(key, value)| {
            json!({
                "key": format!("metadata.{key}"),
                "match": { "value": value }
            })
        })
        .collect();

    if let Some(range) = filter.created.as_ref() {
        let mut boundaries = Map::new();
        if let Some(start) = range.start {
            boundaries.insert("gte".into(), Value::String(format_timestamp(start)));
        }
        if let Some(end) = range.end {
            boundaries.insert("lte".into(), Value::String(format_timestamp(end)));
        }
        if !boundaries.is_empty() {
            must.push(json!({
                "key": "createdAt",
                "range": Value::Object(boundaries)
            }));
        }
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use time::macros::datetime;

    fn record(created_at: OffsetDateTime, document_id: &str) -> IndexRecord {
        IndexRecord {
            id: format!("{document_id}_chunk_0"),
            content: "text".into(),
            vector: vec![1.0],
            metadata: HashMap::from([(
                "OriginalDocumentId".to_string(),
                document_id.to_string(),
            )]),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn empty_filter_translates_to_none() {
        assert!(SearchFilter::new().is_empty());
        assert_eq!(to_qdrant_filter(&SearchFilter::new()), None);
        assert!(SearchFilter::new().created_between(None, None).is_empty());
    }

    #[test]
    fn metadata_and_range_translate_to_must_clauses() {
        let filter = SearchFilter::new()
            .with_metadata("OriginalDocumentId", "doc-1")
            .created_between(Some(datetime!(2024-01-01 0:00 UTC)), None);

        assert_eq!(
            to_qdrant_filter(&filter).expect("filter"),
            json!({
                "must": [
                    {
                        "key": "metadata.OriginalDocumentId",
                        "match": { "value": "doc-1" }
                    },
                    {
                        "key": "createdAt",
                        "range": { "gte": "2024-01-01T00:00:00Z" }
                    }
                ]
            })
        );
    }

    #[test]
    fn matches_requires_every_constraint() {
        let filter = SearchFilter::new()
            .with_metadata("OriginalDocumentId", "doc-1")
            .created_between(
                Some(datetime!(2024-01-01 0:00 UTC)),
                Some(datetime!(2024-12-31 23:59 UTC)),
            );

        assert!(filter.matches(&record(datetime!(2024-06-01 12:00 UTC), "doc-1")));
        assert!(!filter.matches(&record(datetime!(2024-06-01 12:00 UTC), "doc-2")));
        assert!(!filter.matches(&record(datetime!(2025-01-01 0:00 UTC), "doc-1")));
    }
}
