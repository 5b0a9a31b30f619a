//! Bare specifier resolution.
//!
//! Resolution itself sits behind [`ModuleResolution`] so the filesystem
//! probing done by `oxc_resolver` can be replaced (for example by a
//! lockfile-driven table) without touching callers.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::ResolutionError;
use crate::layout::DEPENDENCY_DIR;

/// Conditions used when resolving for the browser, in preference order.
pub const BROWSER_CONDITIONS: &[&str] = &["browser", "import", "development"];

/// Conditions used when resolving imports inside the render sandbox.
pub const SERVER_CONDITIONS: &[&str] = &["import", "module", "default"];

/// Maps `(specifier, directory it is imported from)` to an absolute file path.
pub trait ModuleResolution: Send + Sync {
    fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, ResolutionError>;
}

/// Node-style resolution backed by `oxc_resolver`.
pub struct NodeResolution {
    resolver: oxc_resolver::Resolver,
}

impl NodeResolution {
    pub fn new(conditions: &[&str]) -> Self {
        let resolver = oxc_resolver::Resolver::new(oxc_resolver::ResolveOptions {
            condition_names: conditions.iter().map(|c| (*c).to_string()).collect(),
            extensions: vec![".js".into(), ".mjs".into(), ".json".into()],
            main_fields: vec!["module".into(), "main".into()],
            // Keep linked workspace packages addressable under node_modules
            symlinks: false,
            ..Default::default()
        });
        Self { resolver }
    }

    pub fn browser() -> Self {
        Self::new(BROWSER_CONDITIONS)
    }

    pub fn server() -> Self {
        Self::new(SERVER_CONDITIONS)
    }
}

impl ModuleResolution for NodeResolution {
    fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, ResolutionError> {
        self.resolver
            .resolve(from_dir, specifier)
            .map(|resolution| resolution.path().to_path_buf())
            .map_err(|e| ResolutionError::Unresolved {
                specifier: specifier.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Turns a bare specifier into a `/node_modules/...` URL.
#[derive(Clone)]
pub struct PackageResolver {
    resolution: Arc<dyn ModuleResolution>,
    dependency_dir: PathBuf,
    context_dir: PathBuf,
}

impl PackageResolver {
    /// Resolve relative to the directory that holds `dependency_dir`.
    pub fn new(resolution: Arc<dyn ModuleResolution>, dependency_dir: PathBuf) -> Self {
        let context_dir = dependency_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dependency_dir.clone());
        Self {
            resolution,
            dependency_dir,
            context_dir,
        }
    }

    pub fn locate(&self, specifier: &str) -> Result<String, ResolutionError> {
        let resolved = self.resolution.resolve(specifier, &self.context_dir)?;
        dependency_url(&self.dependency_dir, &resolved).ok_or_else(|| {
            ResolutionError::OutsideDependencies {
                specifier: specifier.to_string(),
                path: resolved,
            }
        })
    }
}

/// `/node_modules/<path relative to dependency_dir>` with forward slashes.
fn dependency_url(dependency_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(dependency_dir).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;

    Some(format!("/{DEPENDENCY_DIR}/{}", segments.join("/")))
}
