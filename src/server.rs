use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::{compression::CompressionLayer, cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::routes;
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/shutdown", post(routes::health::shutdown_handler))
        .route("/index-directory", post(routes::index::index_directory))
        .route("/index-file", post(routes::index::index_file))
        .route("/reindex-file", post(routes::index::reindex_file))
        .route("/remove-file", delete(routes::index::remove_file))
        .route("/search", post(routes::search::search))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
