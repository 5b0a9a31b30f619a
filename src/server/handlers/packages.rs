//! Bare-specifier redirects for the browser import map.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::server::error::ServerError;
use crate::server::state::AppState;

/// Handle `GET /__packages/{*specifier}`.
///
/// Redirects to the browser entry of the package under `/node_modules/`.
pub(crate) async fn redirect_package(
    State(state): State<Arc<AppState>>,
    Path(specifier): Path<String>,
) -> Result<Response, ServerError> {
    let location = state.packages.locate(&specifier)?;
    tracing::debug!(%specifier, %location, "Resolved package");
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
