//! Raw dependency files, served to the browser as JavaScript.

use std::path::{Component, Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::server::error::ServerError;
use crate::server::state::AppState;

/// Handle `GET /node_modules/{*path}`.
pub(crate) async fn serve_dependency(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ServerError> {
    let file = dependency_file(&state.paths.dependency_dir, &path)
        .ok_or_else(|| ServerError::NotFound(path.clone()))?;

    let is_file = tokio::fs::metadata(&file)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ServerError::NotFound(path));
    }

    let bytes = tokio::fs::read(&file).await?;
    Ok(([(header::CONTENT_TYPE, "text/javascript")], bytes).into_response())
}

/// Join `path` onto `dependency_dir`, refusing anything that would leave it.
fn dependency_file(dependency_dir: &FsPath, path: &str) -> Option<PathBuf> {
    let mut file = dependency_dir.to_path_buf();
    for component in FsPath::new(path).components() {
        match component {
            Component::Normal(part) => file.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_file() {
        let deps = FsPath::new("/project/node_modules");
        assert_eq!(
            dependency_file(deps, "left-pad/index.js"),
            Some(PathBuf::from("/project/node_modules/left-pad/index.js"))
        );
        assert_eq!(
            dependency_file(deps, "@scope/pkg/./dist/x.js"),
            Some(PathBuf::from("/project/node_modules/@scope/pkg/dist/x.js"))
        );
        assert_eq!(dependency_file(deps, "../package-lock.json"), None);
        assert_eq!(dependency_file(deps, "/etc/passwd"), None);
    }
}
