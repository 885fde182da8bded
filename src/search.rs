use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::cache::BoundedCache;
use crate::config::AppConfig;
use crate::embedding::EmbeddingService;
use crate::error::{AppError, AppResult};
use crate::vectorstore::VectorStore;

/// One ranked hit returned to a client, projected from a vector-store
/// `SearchHit` plus its stored payload. This is also the value type of the
/// search cache, so a cache hit and a fresh search return identically-shaped
/// results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHitView {
    pub file_path: String,
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub chunk_size: usize,
}

/// Normalize -> cache lookup -> embed -> vector search -> project ->
/// write-through cache. `top_k` is clamped to `max_top_k` before it ever
/// reaches the vector store.
pub struct SearchService {
    embedder: Arc<EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    cache: Arc<BoundedCache<Vec<SearchHitView>>>,
    max_top_k: usize,
    model_id: String,
}

impl SearchService {
    pub fn new(
        config: &AppConfig,
        embedder: Arc<EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        cache: Arc<BoundedCache<Vec<SearchHitView>>>,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            cache,
            max_top_k: config.max_top_k,
            model_id: config.model_id.clone(),
        }
    }

    pub async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<SearchHitView>> {
        // Embedding keeps case (the model's own tokenizer handles casing);
        // only the cache key is lowercased, so "Fox" and "fox" hit the same
        // cache entry without changing what gets embedded.
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(AppError::InputValidation("query must not be empty".to_string()));
        }
        if normalized.chars().count() > crate::config::MAX_SEARCH_QUERY_LENGTH {
            return Err(AppError::InputValidation(format!(
                "query exceeds {} characters",
                crate::config::MAX_SEARCH_QUERY_LENGTH
            )));
        }

        let top_k = top_k.clamp(1, self.max_top_k);
        let cache_key = self.cache_key(&normalized.to_lowercase(), top_k);

        if let Some(hits) = self.cache.get(&cache_key) {
            return Ok(hits);
        }

        let query_vector = self.embedder.embed_one(&normalized).await?;
        let raw_hits = self.vector_store.search(query_vector, top_k as u64).await?;

        let hits: Vec<SearchHitView> = raw_hits
            .into_iter()
            .filter_map(|hit| {
                let file_path = hit.payload.get("file_path")?.as_str()?.to_string();
                let chunk_index = hit.payload.get("chunk_index")?.as_u64()? as usize;
                let text = hit
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let file_name = hit
                    .payload
                    .get("file_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let file_size = hit.payload.get("file_size").and_then(|v| v.as_u64()).unwrap_or(0);
                let file_type = hit
                    .payload
                    .get("file_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let chunk_size = hit
                    .payload
                    .get("chunk_size")
                    .and_then(|v| v.as_u64())
                    .map(|n| n as usize)
                    .unwrap_or_else(|| text.chars().count());
                Some(SearchHitView {
                    file_path,
                    chunk_index,
                    score: hit.score,
                    text,
                    file_name,
                    file_size,
                    file_type,
                    chunk_size,
                })
            })
            .collect();

        let size = hits.iter().map(|h| h.text.len() + h.file_path.len() + 16).sum();
        self.cache.put(cache_key, hits.clone(), size);

        Ok(hits)
    }

    fn cache_key(&self, lowercased_query: &str, top_k: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(lowercased_query.as_bytes());
        hasher.update(b"\0");
        hasher.update(top_k.to_le_bytes());
        hasher.update(b"\0");
        hasher.update(self.model_id.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Trims surrounding whitespace and collapses internal whitespace runs, so
/// two queries that differ only in spacing share a cache entry.
fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_query_collapses_whitespace() {
        assert_eq!(normalize_query("  hello   world  "), "hello world");
    }

    #[test]
    fn normalize_query_of_blank_input_is_empty() {
        assert_eq!(normalize_query("   "), "");
    }
}
