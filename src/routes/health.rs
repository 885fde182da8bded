use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;

use crate::state::AppState;

static SHUTDOWN_NOTIFY: OnceLock<Arc<Notify>> = OnceLock::new();

pub fn init_shutdown_notify() -> Arc<Notify> {
    SHUTDOWN_NOTIFY.get_or_init(|| Arc::new(Notify::new())).clone()
}

pub async fn wait_for_shutdown() {
    if let Some(notify) = SHUTDOWN_NOTIFY.get() {
        notify.notified().await;
    } else {
        std::future::pending::<()>().await;
    }
}

/// `GET /health`: reports whether the embedding model is loaded and whether
/// the vector store is reachable. `status` distinguishes the three states
/// rather than collapsing them into a blanket "ok".
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let model_ready = state.embedder.is_model_ready();
    let store_reachable = state.vector_store.is_reachable().await;

    let status = if !model_ready {
        "model not loaded"
    } else if !store_reachable {
        "vector store unreachable"
    } else {
        "ready"
    };

    Json(json!({
        "status": status,
        "model_info": {
            "model_name": state.config.model_id,
            "vector_size": state.embedder.dim(),
            "is_loaded": model_ready,
            "collection_name": state.config.collection_name,
        },
        "vector_store": {
            "reachable": store_reachable,
        },
    }))
}

pub async fn shutdown_handler() -> Json<Value> {
    tracing::info!("shutdown requested via HTTP endpoint");
    if let Some(notify) = SHUTDOWN_NOTIFY.get() {
        notify.notify_one();
    }
    Json(json!({ "status": "shutting_down" }))
}
