//! HTTP dev server.
//!
//! Routes, in order:
//! - `GET /events` live-reload stream
//! - `GET /__packages/{*specifier}` redirect to a package's browser entry
//! - `GET /node_modules/{*path}` raw dependency files
//! - anything else: the page pipeline

mod error;
mod handlers;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::change_bus::ChangeBus;
use crate::config::DevConfig;
use crate::import_map::{ImportMap, PACKAGES_PREFIX};
use crate::layout::{ProjectPaths, DEPENDENCY_DIR};

pub use error::ServerError;
pub use state::AppState;

/// Create the router for `state`.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", get(handlers::events))
        .route(
            &format!("/{PACKAGES_PREFIX}/{{*specifier}}"),
            get(handlers::redirect_package),
        )
        .route(
            &format!("/{DEPENDENCY_DIR}/{{*path}}"),
            get(handlers::serve_dependency),
        )
        .fallback(handlers::serve_page)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build everything the server needs, start watching, and serve until
/// Ctrl-C.
///
/// # Errors
///
/// Fails before binding when the manifest cannot be read or the source
/// directory cannot be watched, and afterwards only if the listener does.
pub async fn run_server(paths: ProjectPaths, config: DevConfig) -> anyhow::Result<()> {
    let import_map = ImportMap::build(&paths.manifest)?;
    tracing::info!(
        manifest = %paths.manifest.display(),
        entries = import_map.len(),
        "Built import map"
    );

    let changes = ChangeBus::new();
    changes
        .start(&paths.src_dir)
        .with_context(|| format!("Failed to watch {}", paths.src_dir.display()))?;

    let state = Arc::new(AppState::new(paths, &import_map, config.render, changes));
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Dev server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            state.begin_shutdown();
        })
        .await?;

    tracing::info!("Dev server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutting down"),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
