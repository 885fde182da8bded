use anyhow::Result;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

mod cache;
mod chunker;
mod config;
mod embedding;
mod error;
mod indexer;
mod lang;
mod parser;
mod registry;
mod routes;
mod search;
mod server;
mod state;
mod vectorstore;
mod watcher;

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = std::env::var("LUCIDFILES_LOG_DIR").unwrap_or_else(|_| {
        dirs::data_local_dir()
            .map(|d| d.join("lucidfiles-worker").join("logs").to_string_lossy().to_string())
            .unwrap_or_else(|| ".lucidfiles-data/logs".to_string())
    });
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "lucidfiles-worker.log");
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lucidfiles_worker=info,tower_http=info".into());

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(non_blocking_writer)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        error!(target: "lucidfiles_worker::panic", location = %location, payload = %payload, "PANIC: thread panicked");
        default_panic(info);
    }));

    let config = config::AppConfig::from_env();
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        model_id = %config.model_id,
        vector_store_url = %config.vector_store_url,
        collection_name = %config.collection_name,
        watcher_debounce_ms = config.debounce_ms,
        log_dir = %log_dir,
        "lucidfiles worker starting"
    );

    let app_state = state::AppState::new(config).await?;

    routes::health::init_shutdown_notify();

    let app = server::create_app(app_state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("lucidfiles worker listening on {}", addr);

    // Restore watchers for every already-registered directory in the
    // background, after the listener is bound, so /health answers
    // immediately instead of waiting on watcher setup.
    let watcher_state = app_state.clone();
    tokio::spawn(async move {
        let directories = match watcher_state.registry.list_directories().await {
            Ok(dirs) => dirs,
            Err(e) => {
                tracing::warn!("failed to list registered directories: {}", e);
                return;
            }
        };
        let total = directories.len();
        let mut restored = 0;
        for dir in &directories {
            match watcher_state
                .watch_manager
                .start_watching(&dir.path, watcher_state.indexer.clone())
            {
                Ok(()) => restored += 1,
                Err(e) => tracing::warn!("failed to restore watcher for {}: {}", dir.path, e),
            }
        }
        if total > 0 {
            info!("restored {}/{} directory watcher(s) in background", restored, total);
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("lucidfiles worker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install secondary Ctrl+C handler");
    };

    let http_shutdown = routes::health::wait_for_shutdown();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, initiating shutdown"); },
        _ = terminate => { info!("received terminate signal, initiating shutdown"); },
        _ = http_shutdown => { info!("received HTTP shutdown request, initiating shutdown"); },
    }

    info!("shutdown signal received");
}
