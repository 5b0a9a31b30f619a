//! Error types.
//!
//! Startup errors (`LayoutError`, `ManifestError`, `ConfigError`) are fatal and
//! abort the process before the listener is bound. Per-request errors
//! (`ResolutionError`, `RenderError`) are turned into an HTTP status at the
//! request boundary by [`crate::server::ServerError`].

use std::path::PathBuf;

/// A required project path could not be located.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("\"{name}\" not found in any parent directory starting from \"{}\"", start.display())]
    NotFound { name: String, start: PathBuf },

    #[error("Failed to determine working directory: {0}")]
    Cwd(#[source] std::io::Error),
}

/// The dependency manifest could not be read or parsed.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A bare specifier could not be resolved to a file in the dependency directory.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Cannot resolve '{specifier}': {reason}")]
    Unresolved { specifier: String, reason: String },

    #[error("Resolved '{specifier}' to '{}', which is outside the dependency directory", path.display())]
    OutsideDependencies { specifier: String, path: PathBuf },
}

/// A page generator failed to produce markup.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The render context reported an error (load failure, throw, bad export).
    #[error("Render of '{}' failed: {cause}", path.display())]
    Execution { path: PathBuf, cause: String },

    /// The render context died without reporting a result.
    #[error("Render worker for '{}' stopped unexpectedly", path.display())]
    Terminated { path: PathBuf },

    #[error("Render of '{}' timed out after {ms}ms", path.display())]
    TimedOut { path: PathBuf, ms: u64 },

    #[error("Failed to spawn render worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Invalid configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
