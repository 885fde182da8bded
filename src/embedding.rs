use candle_core::{DType, Device};
use fastembed::Qwen3TextEmbedding;
use parking_lot::Mutex as SyncMutex;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::BoundedCache;
use crate::error::{AppError, AppResult};

const EMBED_BATCH_SIZE: usize = 32;

/// Maps batches of strings to unit-norm vectors of fixed dimension, backed by
/// a local candle model. The model is lazily loaded once behind a
/// double-checked lock instead of a module-global singleton.
pub struct EmbeddingService {
    model: AsyncMutex<Option<Qwen3TextEmbedding>>,
    model_initialized: AtomicBool,
    model_id: String,
    dim: usize,
    cache: Arc<BoundedCache<Vec<f32>>>,
    load_lock: SyncMutex<()>,
}

impl EmbeddingService {
    pub fn new(model_id: String, dim: usize, cache_mb: usize, cache_ttl_s: u64) -> Self {
        Self {
            model: AsyncMutex::new(None),
            model_initialized: AtomicBool::new(false),
            model_id,
            dim,
            cache: Arc::new(BoundedCache::new(cache_mb, cache_ttl_s)),
            load_lock: SyncMutex::new(()),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Loads the model on first use. Failure here is fatal at startup;
    /// callers at the HTTP boundary are expected to call this once during
    /// `AppState::new` so a dead model never serves a request.
    pub async fn ensure_model(&self) -> AppResult<()> {
        if self.model_initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut guard = self.model.lock().await;
        if guard.is_some() {
            self.model_initialized.store(true, Ordering::Release);
            return Ok(());
        }
        let _serialize_load = self.load_lock.lock();
        let device = Device::Cpu;
        let model = Qwen3TextEmbedding::from_hf(&self.model_id, &device, DType::F32, 8192)
            .map_err(|e| AppError::ConfigurationFailure(format!("failed to load embedding model {}: {}", self.model_id, e)))?;
        let actual_dim = model.config().hidden_size;
        if actual_dim != self.dim {
            return Err(AppError::ConfigurationFailure(format!(
                "embedding model dimension mismatch: expected {} but got {}",
                self.dim, actual_dim
            )));
        }
        *guard = Some(model);
        self.model_initialized.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_model_ready(&self) -> bool {
        self.model_initialized.load(Ordering::Acquire)
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut result = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        Ok(result.remove(0))
    }

    /// Preserves input order. Cache hits are filled in place; cache misses
    /// are aggregated into a single model call, then written back.
    pub async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.ensure_model().await?;

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut miss_indices = Vec::new();
        let mut miss_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = self.cache_key(text);
            if let Some(vec) = self.cache.get(&key) {
                results[i] = Some(vec);
            } else {
                miss_indices.push(i);
                miss_texts.push(text.clone());
            }
        }

        if !miss_texts.is_empty() {
            let guard = self.model.lock().await;
            let model = guard
                .as_ref()
                .ok_or_else(|| AppError::EmbeddingFailure("model not loaded".to_string()))?;

            let mut embedded = Vec::with_capacity(miss_texts.len());
            for chunk in miss_texts.chunks(EMBED_BATCH_SIZE) {
                let batch = model
                    .embed(chunk.to_vec(), None)
                    .map_err(|e| AppError::EmbeddingFailure(e.to_string()))?;
                embedded.extend(batch);
            }
            drop(guard);

            for (j, idx) in miss_indices.iter().enumerate() {
                let vector = l2_normalize(embedded[j].clone());
                let key = self.cache_key(&miss_texts[j]);
                self.cache.put(key, vector.clone(), self.dim * 4);
                results[*idx] = Some(vector);
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }
}

fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_produces_unit_vectors() {
        let v = l2_normalize(vec![3.0, 4.0]);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_of_zero_vector_is_zero() {
        let v = l2_normalize(vec![0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
