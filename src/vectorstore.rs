use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, CountPointsBuilder, value::Kind,
    Value as QdrantValue,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const MAX_RETRIES: u32 = 3;

/// A single vector point as the rest of the core sees it: `(id, vector,
/// payload)`. The id is derived from `(path, digest, chunk_index)`, never
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: HashMap<String, Value>,
}

/// Point-id derivation: a pure function of `(path, digest, chunk_index)`
/// wide enough (128 bits) that collisions are negligible, so replaying the
/// same content always overwrites the same point.
pub fn derive_point_id(path: &str, digest: &str, chunk_index: usize) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(digest.as_bytes());
    hasher.update(b"\0");
    hasher.update(chunk_index.to_le_bytes());
    let digest_bytes = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest_bytes[..16]);
    Uuid::from_bytes(bytes)
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_collection(&self, dim: u64) -> AppResult<()>;
    async fn upsert(&self, points: Vec<VectorPoint>) -> AppResult<()>;
    async fn delete_by_file(&self, file_path: &str) -> AppResult<()>;
    async fn search(&self, query_vector: Vec<f32>, top_k: u64) -> AppResult<Vec<SearchHit>>;
    async fn count_by_file(&self, file_path: &str) -> AppResult<u64>;
    /// Cheap reachability probe for the health endpoint; does not touch data.
    async fn is_reachable(&self) -> bool;
}

/// Adapter over a Qdrant-shaped external vector database. This is the only
/// place in the core that knows about the concrete store; everything
/// upstream talks to the `VectorStore` trait.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
}

impl QdrantVectorStore {
    pub fn new(url: &str, collection_name: String) -> AppResult<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| AppError::ConfigurationFailure(format!("qdrant client: {e}")))?;
        Ok(Self { client, collection_name })
    }

    async fn with_retry<F, Fut, T>(&self, op: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, qdrant_client::QdrantError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        return Err(AppError::VectorStoreFailure(err.to_string()));
                    }
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(&self, dim: u64) -> AppResult<()> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .map_err(|e| AppError::VectorStoreFailure(e.to_string()))?;
        if exists {
            return Ok(());
        }
        self.with_retry(|| {
            self.client.create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .vectors_config(qdrant_client::qdrant::VectorParamsBuilder::new(dim, Distance::Cosine)),
            )
        })
        .await?;
        Ok(())
    }

    async fn upsert(&self, points: Vec<VectorPoint>) -> AppResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        let qdrant_points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let payload: HashMap<String, QdrantValue> = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_to_qdrant_value(v)))
                    .collect();
                PointStruct::new(p.id.to_string(), p.vector, payload)
            })
            .collect();

        self.with_retry(|| {
            self.client.upsert_points(
                UpsertPointsBuilder::new(&self.collection_name, qdrant_points.clone()).wait(true),
            )
        })
        .await?;
        Ok(())
    }

    async fn delete_by_file(&self, file_path: &str) -> AppResult<()> {
        let filter = Filter::must([Condition::matches("file_path", file_path.to_string())]);
        self.with_retry(|| {
            self.client.delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(filter.clone())
                    .wait(true),
            )
        })
        .await?;
        Ok(())
    }

    async fn search(&self, query_vector: Vec<f32>, top_k: u64) -> AppResult<Vec<SearchHit>> {
        let response = self
            .with_retry(|| {
                self.client.search_points(
                    SearchPointsBuilder::new(&self.collection_name, query_vector.clone(), top_k)
                        .with_payload(true),
                )
            })
            .await?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|scored| {
                let id = scored.id.as_ref().and_then(point_id_to_uuid)?;
                let payload = scored
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, qdrant_value_to_json(v)))
                    .collect();
                Some(SearchHit { id, score: scored.score, payload })
            })
            .collect())
    }

    async fn count_by_file(&self, file_path: &str) -> AppResult<u64> {
        let filter = Filter::must([Condition::matches("file_path", file_path.to_string())]);
        let response = self
            .with_retry(|| {
                self.client.count(
                    CountPointsBuilder::new(&self.collection_name).filter(filter.clone()),
                )
            })
            .await?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn is_reachable(&self) -> bool {
        self.client.collection_exists(&self.collection_name).await.is_ok()
    }
}

fn point_id_to_uuid(id: &qdrant_client::qdrant::PointId) -> Option<Uuid> {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.point_id_options.as_ref()? {
        PointIdOptions::Uuid(s) => Uuid::parse_str(s).ok(),
        PointIdOptions::Num(_) => None,
    }
}

fn json_to_qdrant_value(v: Value) -> QdrantValue {
    match v {
        Value::String(s) => QdrantValue { kind: Some(Kind::StringValue(s)) },
        Value::Number(n) if n.is_i64() => {
            QdrantValue { kind: Some(Kind::IntegerValue(n.as_i64().unwrap_or_default())) }
        }
        Value::Number(n) => QdrantValue { kind: Some(Kind::DoubleValue(n.as_f64().unwrap_or_default())) },
        Value::Bool(b) => QdrantValue { kind: Some(Kind::BoolValue(b)) },
        _ => QdrantValue { kind: Some(Kind::StringValue(v.to_string())) },
    }
}

fn qdrant_value_to_json(v: QdrantValue) -> Value {
    match v.kind {
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_pure_function_of_inputs() {
        let a = derive_point_id("/tmp/notes.txt", "abc123", 0);
        let b = derive_point_id("/tmp/notes.txt", "abc123", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn point_id_differs_by_chunk_index() {
        let a = derive_point_id("/tmp/notes.txt", "abc123", 0);
        let b = derive_point_id("/tmp/notes.txt", "abc123", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn point_id_differs_by_digest() {
        let a = derive_point_id("/tmp/notes.txt", "abc123", 0);
        let b = derive_point_id("/tmp/notes.txt", "def456", 0);
        assert_ne!(a, b);
    }
}
