//! Qdrant index backend over the HTTP API.
//!
//! Qdrant point ids must be UUIDs or integers, so every record id is mapped onto a
//! deterministic UUIDv5 and the original id travels in the payload.

use super::filters::to_qdrant_filter;
use super::{
    FieldKind, IndexBackend, IndexRecord, IndexSchema, ItemOutcome, ScoredRecord, SearchFilter,
    StoreError,
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Lightweight HTTP client for Qdrant collections.
pub struct QdrantBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
struct QueryPoint {
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    result: RetrievedPoint,
}

#[derive(Deserialize)]
struct RetrievedPoint {
    #[serde(default)]
    payload: Option<Map<String, Value>>,
    #[serde(default)]
    vector: Option<Value>,
}

impl QdrantBackend {
    /// Construct a client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        let client = Client::builder().user_agent("rustydocs/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(StoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool, StoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::UnexpectedStatus { status, body })
            }
        }
    }

    async fn ensure_payload_indexes(&self, schema: &IndexSchema) -> Result<(), StoreError> {
        let mut fields: Vec<(String, &str)> = Vec::new();
        for field in &schema.fields {
            match &field.kind {
                FieldKind::Key => fields.push((field.name.to_string(), "keyword")),
                FieldKind::SearchableText => fields.push((field.name.to_string(), "text")),
                FieldKind::Timestamp => fields.push((field.name.to_string(), "datetime")),
                FieldKind::Metadata { indexed_keys } => fields.extend(
                    indexed_keys
                        .iter()
                        .map(|key| (format!("{}.{key}", field.name), "keyword")),
                ),
                FieldKind::Vector { .. } => {}
            }
        }

        for (field, schema_type) in fields {
            let response = self
                .request(Method::PUT, &format!("collections/{}/index", schema.name))
                .json(&json!({
                    "field_name": field,
                    "field_schema": schema_type,
                }))
                .send()
                .await?;

            if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = %schema.name,
                    field,
                    schema_type,
                    "Payload index ensured"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(StoreError::UnexpectedStatus { status, body });
            }
        }
        Ok(())
    }

    async fn send_mutation(
        &self,
        collection: &str,
        method: Method,
        path: &str,
        body: Value,
    ) -> Result<reqwest::Response, StoreError> {
        let response = self
            .request(method, &format!("collections/{collection}/{path}"))
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;
        Ok(response)
    }

    /// Send a points mutation and report every id as applied once Qdrant accepts it.
    async fn mutate_points(
        &self,
        collection: &str,
        method: Method,
        path: &str,
        body: Value,
        ids: impl Iterator<Item = String>,
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let response = self.send_mutation(collection, method, path, body).await?;
        self.ensure_success(collection, response).await?;
        tracing::debug!(collection, path, "Points mutation applied");
        Ok(ids.map(ItemOutcome::applied).collect())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success(
        &self,
        collection: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StoreError::IndexMissing(collection.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::UnexpectedStatus { status, body })
            }
        }
    }
}

#[async_trait]
impl IndexBackend for QdrantBackend {
    async fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError> {
        if !self.collection_exists(&schema.name).await? {
            let dimensions = schema.dimensions().ok_or_else(|| {
                StoreError::InvalidRecord("schema declares no vector field".to_string())
            })?;
            tracing::debug!(collection = %schema.name, dimensions, "Creating collection");

            let response = self
                .request(Method::PUT, &format!("collections/{}", schema.name))
                .json(&json!({
                    "vectors": {
                        "size": dimensions,
                        "distance": "Cosine"
                    }
                }))
                .send()
                .await?;
            self.ensure_success(&schema.name, response).await?;
        }
        self.ensure_payload_indexes(schema).await
    }

    async fn delete_index(&self, name: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{name}"))
            .send()
            .await?;
        match self.ensure_success(name, response).await {
            Ok(_) | Err(StoreError::IndexMissing(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn upload(
        &self,
        index: &str,
        records: &[IndexRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        // Qdrant rejects the whole request for one vectorless point, so those fail individually.
        let (valid, invalid): (Vec<_>, Vec<_>) =
            records.iter().partition(|record| !record.vector.is_empty());

        let mut outcomes: Vec<ItemOutcome> = invalid
            .iter()
            .map(|record| ItemOutcome::failed(&record.id, "record has no vector"))
            .collect();
        if valid.is_empty() {
            return Ok(outcomes);
        }

        let points = valid
            .iter()
            .map(|record| {
                Ok(json!({
                    "id": point_id(&record.id),
                    "vector": record.vector,
                    "payload": payload_for(record)?,
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        outcomes.extend(
            self.mutate_points(
                index,
                Method::PUT,
                "points",
                json!({ "points": points }),
                valid.iter().map(|record| record.id.clone()),
            )
            .await?,
        );
        Ok(outcomes)
    }

    async fn merge(
        &self,
        index: &str,
        records: &[IndexRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut operations = Vec::new();
        let mut vectors = Vec::new();
        for record in records {
            let point = point_id(&record.id);
            operations.push(json!({
                "set_payload": {
                    "payload": {
                        "id": record.id,
                        "content": record.content,
                        "updatedAt": crate::document::format_timestamp(record.updated_at),
                    },
                    "points": [point],
                }
            }));
            if !record.metadata.is_empty() {
                operations.push(json!({
                    "set_payload": {
                        "payload": record.metadata,
                        "points": [point],
                        "key": "metadata",
                    }
                }));
            }
            if !record.vector.is_empty() {
                vectors.push(json!({ "id": point, "vector": record.vector }));
            }
        }
        if !vectors.is_empty() {
            operations.push(json!({ "update_vectors": { "points": vectors } }));
        }

        let response = self
            .send_mutation(
                index,
                Method::POST,
                "points/batch",
                json!({ "operations": operations }),
            )
            .await?;

        // Payload updates on an absent point answer 404 while the collection itself exists.
        if response.status() == StatusCode::NOT_FOUND && self.collection_exists(index).await? {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(collection = index, %body, "Merge targeted missing points");
            return Ok(records
                .iter()
                .map(|record| ItemOutcome::failed(&record.id, format!("point not found: {body}")))
                .collect());
        }

        self.ensure_success(index, response).await?;
        tracing::debug!(collection = index, records = records.len(), "Points merged");
        Ok(records
            .iter()
            .map(|record| ItemOutcome::applied(&record.id))
            .collect())
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<Vec<ItemOutcome>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let points: Vec<String> = ids.iter().map(|id| point_id(id)).collect();
        self.mutate_points(
            index,
            Method::POST,
            "points/delete",
            json!({ "points": points }),
            ids.iter().cloned(),
        )
        .await
    }

    async fn search(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let mut body = Map::new();
        body.insert("query".into(), json!(vector));
        body.insert("limit".into(), json!(top_k));
        body.insert("with_payload".into(), Value::Bool(true));
        if let Some(filter_value) = filter.and_then(to_qdrant_filter) {
            body.insert("filter".into(), filter_value);
        }

        let response = self
            .request(Method::POST, &format!("collections/{index}/points/query"))
            .json(&Value::Object(body))
            .send()
            .await?;

        let payload: QueryResponse = self.ensure_success(index, response).await?.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        points
            .into_iter()
            .map(|point| {
                Ok(ScoredRecord {
                    record: record_from_payload(point.payload, None)?,
                    score: point.score,
                })
            })
            .collect()
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<IndexRecord>, StoreError> {
        let response = self
            .request(
                Method::GET,
                &format!("collections/{index}/points/{}", point_id(id)),
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let RetrieveResponse { result } = response.json().await?;
                record_from_payload(result.payload, result.vector).map(Some)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::UnexpectedStatus { status, body })
            }
        }
    }
}

fn point_id(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
}

fn payload_for(record: &IndexRecord) -> Result<Value, StoreError> {
    let mut payload = serde_json::to_value(record)
        .map_err(|error| StoreError::InvalidRecord(error.to_string()))?;
    if let Value::Object(map) = &mut payload {
        map.remove("vector");
    }
    Ok(payload)
}

fn record_from_payload(
    payload: Option<Map<String, Value>>,
    vector: Option<Value>,
) -> Result<IndexRecord, StoreError> {
    let mut payload = payload
        .ok_or_else(|| StoreError::InvalidRecord("point carries no payload".to_string()))?;
    if let Some(vector @ Value::Array(_)) = vector {
        payload.insert("vector".into(), vector);
    }
    serde_json::from_value(Value::Object(payload))
        .map_err(|error| StoreError::InvalidRecord(error.to_string()))
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
