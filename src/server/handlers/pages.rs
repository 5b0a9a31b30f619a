//! Page pipeline: documents, then static assets, then the 404 document.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::layout::NOT_FOUND_PAGE;
use crate::page::PageSource;
use crate::server::error::ServerError;
use crate::server::state::AppState;

/// Fallback handler for everything the router does not match.
pub(crate) async fn serve_page(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let path = req.uri().path().to_string();

    if let Some(source) = state.pages.resolve(&path).await {
        return match load_document(&state, &source).await {
            Ok(markup) => document_response(StatusCode::OK, state.injector.inject(&markup)),
            Err(e) => e.into_response(),
        };
    }

    let asset = match ServeDir::new(&state.paths.src_dir).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if asset.status() != StatusCode::NOT_FOUND {
        return asset.map(Body::new);
    }

    not_found(&state, &path).await
}

/// Markup for `source`, rendering it first when it is a generator. Static
/// documents are passed through byte for byte.
async fn load_document(state: &AppState, source: &PageSource) -> Result<Vec<u8>, ServerError> {
    match source {
        PageSource::Static(file) => Ok(tokio::fs::read(file).await?),
        PageSource::Generator(file) => Ok(state.sandbox.render(file).await?.into_bytes()),
    }
}

/// Only declare UTF-8 when the document is UTF-8; otherwise the browser
/// falls back to the document's own `<meta charset>`.
fn document_response(status: StatusCode, body: Vec<u8>) -> Response {
    let content_type = if std::str::from_utf8(&body).is_ok() {
        "text/html; charset=utf-8"
    } else {
        "text/html"
    };
    (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// The project's 404 document with status 404, or a bare 404.
async fn not_found(state: &AppState, path: &str) -> Response {
    tracing::debug!(%path, "No page or asset");

    let document = format!("/{NOT_FOUND_PAGE}");
    if let Some(source) = state.pages.resolve(&document).await {
        match load_document(state, &source).await {
            Ok(markup) => {
                return document_response(StatusCode::NOT_FOUND, state.injector.inject(&markup));
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load 404 document"),
        }
    }

    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Not found",
    )
        .into_response()
}
