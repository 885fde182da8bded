use std::sync::Arc;

use crate::cache::BoundedCache;
use crate::config::AppConfig;
use crate::embedding::EmbeddingService;
use crate::error::AppResult;
use crate::indexer::Indexer;
use crate::registry::Registry;
use crate::search::{SearchHitView, SearchService};
use crate::vectorstore::{QdrantVectorStore, VectorStore};
use crate::watcher::WatchManager;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Registry,
    pub embedder: Arc<EmbeddingService>,
    pub vector_store: Arc<dyn VectorStore>,
    pub indexer: Arc<Indexer>,
    pub search: Arc<SearchService>,
    pub watch_manager: Arc<WatchManager>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(crate::error::AppError::Io)?;

        let registry = Registry::connect(&config.data_dir).await?;

        let vector_store: Arc<dyn VectorStore> = Arc::new(QdrantVectorStore::new(
            &config.vector_store_url,
            config.collection_name.clone(),
        )?);
        vector_store.ensure_collection(config.embedding_dim as u64).await?;

        let embedder = Arc::new(EmbeddingService::new(
            config.model_id.clone(),
            config.embedding_dim,
            config.embedding_cache_mb,
            config.embedding_cache_ttl_s,
        ));
        // A server that can't embed can't do anything useful, so the model
        // loads eagerly here rather than lazily on first request.
        embedder.ensure_model().await?;

        let search_cache: Arc<BoundedCache<Vec<SearchHitView>>> =
            Arc::new(BoundedCache::new(config.search_cache_mb, config.search_cache_ttl_s));

        let indexer = Arc::new(Indexer::new(
            &config,
            registry.clone(),
            embedder.clone(),
            vector_store.clone(),
            search_cache.clone(),
        ));

        let search = Arc::new(SearchService::new(
            &config,
            embedder.clone(),
            vector_store.clone(),
            search_cache,
        ));

        let watch_manager = Arc::new(WatchManager::new(config.debounce_ms));

        Ok(Self {
            config,
            registry,
            embedder,
            vector_store,
            indexer,
            search,
            watch_manager,
        })
    }
}
