//! Router assembly, shared state and server lifecycle.

use std::sync::Arc;

use axum::middleware;
use axum::{extract::State, response::Json, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::service::TaskService;
use crate::store::{open_store, SharedTaskStore};

use super::auth;
use super::tasks as tasks_api;
use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task operations over the process-wide store
    pub service: TaskService,
}

impl AppState {
    pub fn new(config: Config, store: SharedTaskStore) -> Self {
        let service = TaskService::new(store, config.page_size);
        Self { config, service }
    }
}

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/api/health", get(health));

    let protected_routes = Router::new()
        .nest("/api/task", tasks_api::routes())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    // Opened once and shared; dropped when the server returns.
    let store = open_store(&config.database_path).await?;
    let state = Arc::new(AppState::new(config.clone(), store));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGTERM/SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.service.store();
    let reachable = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Task store unreachable: {}", e);
            false
        }
    };
    Json(HealthResponse {
        status: if reachable { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        database: DatabaseHealth {
            persistent: store.is_persistent(),
            reachable,
        },
    })
}
