use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    10
}

/// `POST /search`: embeds the query, searches the vector
/// store, and projects hits into the wire shape clients expect.
pub async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> AppResult<Json<Value>> {
    let hits = state.search.search(&body.query, body.top_k).await?;

    // Projected straight off the stored payload snapshot from index time,
    // not the file's current disk state, so a result stays consistent with
    // the chunk text even if the file has since changed on disk.
    let results: Vec<Value> = hits
        .iter()
        .map(|hit| {
            json!({
                "score": hit.score,
                "file_path": hit.file_path,
                "file_name": hit.file_name,
                "chunk": hit.text,
                "chunk_index": hit.chunk_index,
                "file_type": hit.file_type,
                "file_size": hit.file_size,
                "chunk_size": hit.chunk_size,
            })
        })
        .collect();

    let total_results = results.len();

    Ok(Json(json!({
        "query": body.query,
        "top_k": body.top_k,
        "results": results,
        "total_results": total_results,
    })))
}
