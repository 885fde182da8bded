use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::indexer::FileIndexOutcome;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

fn require_path(path: &str) -> AppResult<()> {
    if path.trim().is_empty() {
        return Err(AppError::InputValidation("path must not be empty".to_string()));
    }
    if !Path::new(path).is_absolute() {
        return Err(AppError::InputValidation(format!("path must be absolute: {path}")));
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_type(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `POST /index-directory`: walks and registers a directory, then attaches
/// a watcher so subsequent changes stay in sync.
pub async fn index_directory(
    State(state): State<AppState>,
    Json(body): Json<PathRequest>,
) -> AppResult<Json<Value>> {
    require_path(&body.path)?;
    let root = PathBuf::from(&body.path);

    let report = state.indexer.index_directory(&root).await?;

    if let Err(e) = state.watch_manager.start_watching(&report.root, state.indexer.clone()) {
        tracing::warn!("failed to start watching {}: {}", report.root, e);
    }

    Ok(Json(json!({
        "success": true,
        "filesProcessed": report.total_files,
        "chunksIndexed": report.chunks_indexed,
        "totalFiles": report.total_files,
        "directory": report.root,
    })))
}

/// `POST /index-file`. Soft outcomes (unsupported format, parse failure)
/// still return `200`; only request-level errors propagate.
pub async fn index_file(
    State(state): State<AppState>,
    Json(body): Json<PathRequest>,
) -> AppResult<Json<Value>> {
    require_path(&body.path)?;
    let path = PathBuf::from(&body.path);
    let outcome = state.indexer.index_file(&path).await?;
    file_response(&state, &path, outcome, false).await
}

/// `POST /reindex-file`: forces a reparse regardless of whether the content
/// digest changed.
pub async fn reindex_file(
    State(state): State<AppState>,
    Json(body): Json<PathRequest>,
) -> AppResult<Json<Value>> {
    require_path(&body.path)?;
    let path = PathBuf::from(&body.path);
    let outcome = state.indexer.reindex_file(&path).await?;
    file_response(&state, &path, outcome, true).await
}

async fn file_response(
    state: &AppState,
    path: &Path,
    outcome: FileIndexOutcome,
    reindexed: bool,
) -> AppResult<Json<Value>> {
    let path_str = path.to_string_lossy().to_string();
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let checksum = state
        .registry
        .get_file(&path_str)
        .await?
        .map(|r| r.checksum)
        .unwrap_or_default();

    let (chunks_indexed, warning) = match outcome {
        FileIndexOutcome::Indexed { chunks_indexed } => (chunks_indexed, None),
        FileIndexOutcome::Unchanged => {
            let count = state.vector_store.count_by_file(&path_str).await.unwrap_or(0);
            (count as usize, None)
        }
        FileIndexOutcome::Unsupported => (0, Some("unsupported file format".to_string())),
        FileIndexOutcome::ParseFailed { reason } => (0, Some(reason)),
        FileIndexOutcome::Removed => (0, None),
    };

    let mut body = json!({
        "success": true,
        "checksum": checksum,
        "size": size,
        "chunksIndexed": chunks_indexed,
        "filePath": path_str,
        "fileName": file_name(path),
        "fileType": file_type(path),
    });
    if reindexed {
        body["reindexed"] = json!(true);
    }
    if let Some(warning) = warning {
        body["warning"] = json!(warning);
    }

    Ok(Json(body))
}

/// `DELETE /remove-file`.
pub async fn remove_file(
    State(state): State<AppState>,
    Json(body): Json<PathRequest>,
) -> AppResult<Json<Value>> {
    require_path(&body.path)?;
    let path = PathBuf::from(&body.path);
    let path_str = path.to_string_lossy().to_string();

    let chunks_removed = state.vector_store.count_by_file(&path_str).await.unwrap_or(0);
    state.indexer.remove_file(&path).await?;

    Ok(Json(json!({
        "success": true,
        "chunksRemoved": chunks_removed,
        "filePath": path_str,
        "fileName": file_name(&path),
    })))
}
