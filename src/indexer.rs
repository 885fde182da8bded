use ignore::WalkBuilder;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::BoundedCache;
use crate::chunker::chunk_text;
use crate::config::{is_excluded_directory, AppConfig};
use crate::embedding::EmbeddingService;
use crate::error::{AppError, AppResult};
use crate::parser::ocr::TesseractOcr;
use crate::parser::{ParseOutcome, ParserRegistry};
use crate::registry::{FileStatus, Registry};
use crate::search::SearchHitView;
use crate::vectorstore::{derive_point_id, VectorPoint, VectorStore};

/// Outcome of indexing a single file. Unsupported formats and parse
/// failures are soft outcomes, never request-level errors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome")]
pub enum FileIndexOutcome {
    Unchanged,
    Unsupported,
    ParseFailed { reason: String },
    Indexed { chunks_indexed: usize },
    Removed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryIndexReport {
    pub root: String,
    pub total_files: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub unsupported: usize,
    pub failed: usize,
    pub removed: usize,
    pub chunks_indexed: usize,
}

/// Owns the full parse -> chunk -> embed -> upsert pipeline. A single
/// file-level serialization point (`locks`) keeps two concurrent operations
/// on the same path from racing each other's delete-then-upsert sequence.
pub struct Indexer {
    registry: Registry,
    parser: ParserRegistry<TesseractOcr>,
    embedder: Arc<EmbeddingService>,
    vector_store: Arc<dyn VectorStore>,
    search_cache: Arc<BoundedCache<Vec<SearchHitView>>>,
    chunk_size: usize,
    chunk_overlap: usize,
    max_file_size_bytes: usize,
    max_watch_depth: usize,
    locks: dashmap::DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    concurrency: Arc<tokio::sync::Semaphore>,
}

impl Indexer {
    pub fn new(
        config: &AppConfig,
        registry: Registry,
        embedder: Arc<EmbeddingService>,
        vector_store: Arc<dyn VectorStore>,
        search_cache: Arc<BoundedCache<Vec<SearchHitView>>>,
    ) -> Self {
        Self {
            registry,
            parser: ParserRegistry::new(TesseractOcr::new(), config.ocr_psm),
            embedder,
            vector_store,
            search_cache,
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_file_size_bytes: config.max_file_size_bytes,
            max_watch_depth: config.max_watch_depth,
            locks: dashmap::DashMap::new(),
            concurrency: Arc::new(tokio::sync::Semaphore::new(config.worker_pool_size.max(1))),
        }
    }

    fn path_lock(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Registers `root` (idempotently) and walks it, gitignore-aware and
    /// skipping build/output directories, indexing every supported file and
    /// removing registry/vector-store state for files that disappeared
    /// since the last walk.
    pub async fn index_directory(self: &Arc<Self>, root: &Path) -> AppResult<DirectoryIndexReport> {
        let canonical = dunce::canonicalize(root).map_err(|e| {
            AppError::InputValidation(format!("cannot resolve directory {}: {e}", root.display()))
        })?;
        let root_str = canonical.to_string_lossy().to_string();

        let existing_dir = self.registry.find_directory_by_path(&root_str).await?;
        let dir_id = match existing_dir {
            Some(d) => d.id,
            None => {
                let id = Uuid::new_v4().to_string();
                self.registry.add_directory(&id, &root_str).await?;
                id
            }
        };

        let files: Vec<PathBuf> = WalkBuilder::new(&canonical)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .max_depth(Some(self.max_watch_depth))
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !is_excluded_directory(name))
                    .unwrap_or(true)
            })
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .collect();

        let current_paths: std::collections::HashSet<String> = files
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();

        let known_files = self.registry.list_files_for_dir(&dir_id).await?;
        let paths_to_remove: Vec<String> = known_files
            .iter()
            .map(|f| f.path.clone())
            .filter(|p| !current_paths.contains(p))
            .collect();

        let mut report = DirectoryIndexReport {
            root: root_str.clone(),
            total_files: files.len(),
            indexed: 0,
            unchanged: 0,
            unsupported: 0,
            failed: 0,
            removed: 0,
            chunks_indexed: 0,
        };

        for path in &paths_to_remove {
            if self.remove_file_inner(path).await.is_ok() {
                report.removed += 1;
            }
        }

        // Fan out across `worker_pool_size` concurrent tasks; the permit is
        // held for the duration of one file's parse/embed/upsert so overall
        // inference and vector-store concurrency stays bounded regardless of
        // how large the directory is.
        let mut tasks = tokio::task::JoinSet::new();
        for path in files {
            let indexer = self.clone();
            let dir_id = dir_id.clone();
            let semaphore = self.concurrency.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let path_str = path.to_string_lossy().to_string();
                let outcome = indexer.index_file_inner(&path_str, &dir_id, false).await;
                (path_str, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (path_str, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!("indexing task panicked: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            match outcome {
                Ok(FileIndexOutcome::Unchanged) => report.unchanged += 1,
                Ok(FileIndexOutcome::Unsupported) => report.unsupported += 1,
                Ok(FileIndexOutcome::ParseFailed { .. }) => report.failed += 1,
                Ok(FileIndexOutcome::Indexed { chunks_indexed }) => {
                    report.indexed += 1;
                    report.chunks_indexed += chunks_indexed;
                }
                Ok(FileIndexOutcome::Removed) => {}
                Err(e) => {
                    warn!("failed to index {}: {}", path_str, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "indexed directory {}: {} indexed, {} unchanged, {} unsupported, {} failed, {} removed",
            root_str, report.indexed, report.unchanged, report.unsupported, report.failed, report.removed
        );

        Ok(report)
    }

    /// Indexes a single already-registered-or-registerable file. Unlike
    /// `reindex_file`, this short-circuits when the content digest matches
    /// the last recorded checksum.
    pub async fn index_file(&self, path: &Path) -> AppResult<FileIndexOutcome> {
        let path_str = path.to_string_lossy().to_string();
        let dir_id = self.resolve_dir_id(&path_str).await?;
        self.index_file_inner(&path_str, &dir_id, false).await
    }

    /// Forces a full reparse/reembed/reupsert regardless of whether the
    /// content digest changed.
    pub async fn reindex_file(&self, path: &Path) -> AppResult<FileIndexOutcome> {
        let path_str = path.to_string_lossy().to_string();
        let dir_id = self.resolve_dir_id(&path_str).await?;
        self.index_file_inner(&path_str, &dir_id, true).await
    }

    pub async fn remove_file(&self, path: &Path) -> AppResult<()> {
        let path_str = path.to_string_lossy().to_string();
        let existing = self.registry.get_file(&path_str).await?;
        if existing.is_none() {
            return Err(AppError::NotFound(format!("file not indexed: {path_str}")));
        }
        self.remove_file_inner(&path_str).await
    }

    async fn remove_file_inner(&self, path_str: &str) -> AppResult<()> {
        let lock = self.path_lock(path_str);
        let _guard = lock.lock().await;

        self.vector_store.delete_by_file(path_str).await?;
        self.registry.remove_file(path_str).await?;
        self.search_cache.clear();
        Ok(())
    }

    /// Finds the registered directory that contains `path_str`, by longest
    /// matching prefix, so a direct `/index-file` call on a path that was
    /// never passed to `index_directory` is rejected rather than silently
    /// adopted.
    async fn resolve_dir_id(&self, path_str: &str) -> AppResult<String> {
        let directories = self.registry.list_directories().await?;
        directories
            .into_iter()
            .filter(|d| path_str.starts_with(&d.path))
            .max_by_key(|d| d.path.len())
            .map(|d| d.id)
            .ok_or_else(|| {
                AppError::InputValidation(format!(
                    "{path_str} is not under any registered directory"
                ))
            })
    }

    async fn index_file_inner(
        &self,
        path_str: &str,
        dir_id: &str,
        force: bool,
    ) -> AppResult<FileIndexOutcome> {
        let path = Path::new(path_str);
        let lock = self.path_lock(path_str);
        let _guard = lock.lock().await;

        let bytes = std::fs::read(path)
            .map_err(|_| AppError::NotFound(format!("file not found: {path_str}")))?;

        if bytes.len() > self.max_file_size_bytes {
            self.registry
                .upsert_file(path_str, dir_id, "", FileStatus::Failed)
                .await?;
            return Ok(FileIndexOutcome::ParseFailed {
                reason: "file exceeds max_file_size_bytes".to_string(),
            });
        }

        let digest = sha256_hex(&bytes);
        let existing = self.registry.get_file(path_str).await?;

        if !force {
            if let Some(existing) = &existing {
                if existing.checksum == digest && existing.status == FileStatus::Indexed {
                    return Ok(FileIndexOutcome::Unchanged);
                }
            }
        }

        // Point ids are derived from `(path, digest, chunk_index)`, so a
        // forced reindex that turns up the same digest can reuse the same
        // ids: upsert alone replaces them, no delete needed.
        let digest_unchanged = existing.as_ref().is_some_and(|e| e.checksum == digest);

        let outcome = self.parser.parse(path);
        match outcome {
            ParseOutcome::Unsupported => Ok(FileIndexOutcome::Unsupported),
            ParseOutcome::Failed(reason) => {
                self.registry
                    .upsert_file(path_str, dir_id, &digest, FileStatus::Failed)
                    .await?;
                Ok(FileIndexOutcome::ParseFailed { reason })
            }
            ParseOutcome::Text(text) => {
                let chunks = chunk_text(&text, self.chunk_size, self.chunk_overlap);

                // Embed before touching the store: if this fails, the
                // previously indexed chunk set must survive untouched.
                let points = if chunks.is_empty() {
                    Ok(Vec::new())
                } else {
                    self.embedder.embed_batch(&chunks).await.map(|vectors| {
                        chunks
                            .iter()
                            .zip(vectors.into_iter())
                            .enumerate()
                            .map(|(index, (chunk, vector))| VectorPoint {
                                id: derive_point_id(path_str, &digest, index),
                                vector,
                                payload: point_payload(path_str, &digest, index, chunk, bytes.len() as u64),
                            })
                            .collect()
                    })
                };

                let points = match points {
                    Ok(points) => points,
                    Err(e) => {
                        self.registry
                            .upsert_file(path_str, dir_id, &digest, FileStatus::Failed)
                            .await?;
                        return Err(e);
                    }
                };

                if !digest_unchanged {
                    self.vector_store.delete_by_file(path_str).await?;
                }
                if !points.is_empty() {
                    self.vector_store.upsert(points).await?;
                }

                self.registry
                    .upsert_file(path_str, dir_id, &digest, FileStatus::Indexed)
                    .await?;
                self.search_cache.clear();

                Ok(FileIndexOutcome::Indexed {
                    chunks_indexed: chunks.len(),
                })
            }
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn point_payload(
    path: &str,
    digest: &str,
    chunk_index: usize,
    text: &str,
    file_size: u64,
) -> HashMap<String, Value> {
    let path_ref = Path::new(path);
    let extension = path_ref.extension().and_then(|e| e.to_str()).unwrap_or("");
    let file_name = path_ref
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_type = if extension.is_empty() {
        "unknown".to_string()
    } else {
        extension.to_lowercase()
    };

    let mut payload = HashMap::new();
    payload.insert("file_path".to_string(), json!(path));
    payload.insert("digest".to_string(), json!(digest));
    payload.insert("chunk_index".to_string(), json!(chunk_index));
    payload.insert("text".to_string(), json!(text));
    payload.insert("language".to_string(), json!(crate::lang::detect_language(extension)));
    payload.insert("file_name".to_string(), json!(file_name));
    payload.insert("file_size".to_string(), json!(file_size));
    payload.insert("file_type".to_string(), json!(file_type));
    payload.insert("chunk_size".to_string(), json!(text.chars().count()));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_deterministic() {
        assert_eq!(sha256_hex(b"hello"), sha256_hex(b"hello"));
        assert_ne!(sha256_hex(b"hello"), sha256_hex(b"world"));
    }

    #[test]
    fn point_payload_carries_chunk_text() {
        let payload = point_payload("/tmp/a.txt", "abc", 2, "hello", 1024);
        assert_eq!(payload.get("text").unwrap(), &json!("hello"));
        assert_eq!(payload.get("chunk_index").unwrap(), &json!(2));
        assert_eq!(payload.get("file_name").unwrap(), &json!("a.txt"));
        assert_eq!(payload.get("file_size").unwrap(), &json!(1024));
        assert_eq!(payload.get("file_type").unwrap(), &json!("txt"));
        assert_eq!(payload.get("chunk_size").unwrap(), &json!(5));
    }
}
