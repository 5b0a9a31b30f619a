//! Error types for the HTTP server.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{RenderError, ResolutionError};

/// Per-request failure. Never escapes the request it belongs to.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Resolution(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Render(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Not found");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
