//! Module loader for page generators.
//!
//! Relative and absolute imports must stay inside the allowed directories (the
//! project root and the dependency directory). Bare specifiers go through the
//! same resolution seam the browser-facing package resolver uses. Network
//! imports and anything other than `.js`/`.mjs` are refused.
//!
//! Files are checked by their canonical path, except under the dependency
//! directory: there a package may be a link to a workspace elsewhere on disk,
//! so the path as addressed through the dependency directory is what counts.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use deno_core::{
    anyhow::{anyhow, Error},
    ModuleLoadResponse, ModuleLoader, ModuleSource, ModuleSourceCode, ModuleSpecifier,
    ModuleType, RequestedModuleType, ResolutionKind,
};

use crate::resolver::ModuleResolution;

pub struct SandboxedLoader {
    allowed_dirs: Vec<PathBuf>,
    // Lexical and canonical spellings of the dependency directory.
    dependency_dirs: Vec<PathBuf>,
    resolution: Arc<dyn ModuleResolution>,
}

impl SandboxedLoader {
    pub fn new(
        allowed_dirs: &[PathBuf],
        resolution: Arc<dyn ModuleResolution>,
    ) -> Result<Self, Error> {
        let allowed_dirs = allowed_dirs
            .iter()
            .map(|dir| {
                dir.canonicalize()
                    .map_err(|e| anyhow!("Failed to canonicalize '{}': {}", dir.display(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if allowed_dirs.is_empty() {
            return Err(anyhow!("At least one allowed directory is required"));
        }

        Ok(Self {
            allowed_dirs,
            dependency_dirs: Vec::new(),
            resolution,
        })
    }

    /// Accept linked packages reached through `dir`.
    pub fn with_dependency_dir(mut self, dir: &Path) -> Self {
        self.dependency_dirs.extend(normalize_lexically(dir));
        if let Ok(canonical) = dir.canonicalize() {
            self.dependency_dirs.push(canonical);
        }
        self
    }

    fn is_path_allowed(&self, path: &Path) -> bool {
        let Ok(canonical) = path.canonicalize() else {
            return false;
        };
        if self.allowed_dirs.iter().any(|dir| canonical.starts_with(dir)) {
            return true;
        }
        normalize_lexically(path).is_some_and(|lexical| {
            self.dependency_dirs
                .iter()
                .any(|dir| lexical.starts_with(dir) && lexical != *dir)
        })
    }

    fn is_extension_allowed(path: &Path) -> bool {
        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("js") | Some("mjs")
        )
    }

    /// Directory bare imports are resolved from.
    fn referrer_dir(&self, referrer: &str) -> PathBuf {
        ModuleSpecifier::parse(referrer)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.allowed_dirs[0].clone())
    }
}

/// Resolve `.` and `..` without touching the filesystem. `None` for
/// relative paths and for paths that climb above the root.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    if !path.is_absolute() {
        return None;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    Some(out)
}

impl ModuleLoader for SandboxedLoader {
    fn resolve(
        &self,
        specifier: &str,
        referrer: &str,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, Error> {
        if specifier.starts_with("http://")
            || specifier.starts_with("https://")
            || specifier.starts_with("data:")
            || specifier.starts_with("blob:")
        {
            return Err(anyhow!("Remote imports are forbidden: {}", specifier));
        }
        if specifier.starts_with("node:") {
            return Err(anyhow!(
                "Node built-in modules are not available to page generators: {}",
                specifier
            ));
        }

        let resolved = if specifier.starts_with("./") || specifier.starts_with("../") {
            let referrer_url = ModuleSpecifier::parse(referrer)
                .map_err(|e| anyhow!("Invalid referrer '{}': {}", referrer, e))?;
            referrer_url
                .join(specifier)
                .map_err(|e| anyhow!("Failed to resolve '{}': {}", specifier, e))?
        } else if specifier.starts_with("file://") {
            ModuleSpecifier::parse(specifier)
                .map_err(|e| anyhow!("Invalid file URL '{}': {}", specifier, e))?
        } else if specifier.starts_with('/') {
            ModuleSpecifier::from_file_path(specifier)
                .map_err(|_| anyhow!("Invalid absolute path: {}", specifier))?
        } else {
            let path = self
                .resolution
                .resolve(specifier, &self.referrer_dir(referrer))?;
            ModuleSpecifier::from_file_path(&path)
                .map_err(|_| anyhow!("Invalid resolved path: {}", path.display()))?
        };

        if resolved.scheme() != "file" {
            return Err(anyhow!(
                "Only file:// URLs allowed, got: {}",
                resolved.scheme()
            ));
        }

        let path = resolved
            .to_file_path()
            .map_err(|_| anyhow!("Failed to convert URL to path: {}", resolved))?;

        if !self.is_path_allowed(&path) {
            return Err(anyhow!(
                "Access denied: '{}' is outside the project",
                path.display()
            ));
        }

        if !Self::is_extension_allowed(&path) {
            return Err(anyhow!(
                "Only .js and .mjs files allowed, got: {}",
                path.display()
            ));
        }

        Ok(resolved)
    }

    fn load(
        &self,
        module_specifier: &ModuleSpecifier,
        _maybe_referrer: Option<&ModuleSpecifier>,
        _is_dyn_import: bool,
        _requested_module_type: RequestedModuleType,
    ) -> ModuleLoadResponse {
        let specifier = module_specifier.clone();

        let path = match specifier.to_file_path() {
            Ok(p) => p,
            Err(_) => {
                return ModuleLoadResponse::Sync(Err(anyhow!(
                    "Invalid file path: {}",
                    specifier
                )));
            }
        };

        if !self.is_path_allowed(&path) || !Self::is_extension_allowed(&path) {
            return ModuleLoadResponse::Sync(Err(anyhow!(
                "Access denied: {}",
                path.display()
            )));
        }

        let code = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                return ModuleLoadResponse::Sync(Err(anyhow!(
                    "Failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        ModuleLoadResponse::Sync(Ok(ModuleSource::new(
            ModuleType::JavaScript,
            ModuleSourceCode::String(code.into()),
            &specifier,
            None,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use std::fs;
    use tempfile::tempdir;

    struct NoResolution;

    impl ModuleResolution for NoResolution {
        fn resolve(&self, specifier: &str, _from_dir: &Path) -> Result<PathBuf, ResolutionError> {
            Err(ResolutionError::Unresolved {
                specifier: specifier.to_string(),
                reason: "not available".to_string(),
            })
        }
    }

    struct OneFile(PathBuf);

    impl ModuleResolution for OneFile {
        fn resolve(&self, _specifier: &str, _from_dir: &Path) -> Result<PathBuf, ResolutionError> {
            Ok(self.0.clone())
        }
    }

    fn loader(dir: &Path) -> SandboxedLoader {
        SandboxedLoader::new(&[dir.to_path_buf()], Arc::new(NoResolution)).unwrap()
    }

    fn entry_url(dir: &Path) -> String {
        ModuleSpecifier::from_file_path(dir.canonicalize().unwrap().join("entry.js"))
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_blocks_remote_urls() {
        let dir = tempdir().unwrap();
        let result = loader(dir.path()).resolve(
            "https://evil.com/payload.js",
            "file:///test.js",
            ResolutionKind::Import,
        );
        assert!(result.unwrap_err().to_string().contains("Remote imports are forbidden"));
    }

    #[test]
    fn test_blocks_node_builtins() {
        let dir = tempdir().unwrap();
        let result = loader(dir.path()).resolve("node:fs", "file:///test.js", ResolutionKind::Import);
        assert!(result.unwrap_err().to_string().contains("Node built-in"));
    }

    #[test]
    fn test_blocks_path_traversal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("entry.js"), "export default 1;").unwrap();

        let result = loader(dir.path()).resolve(
            "../../../etc/passwd",
            &entry_url(dir.path()),
            ResolutionKind::Import,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_allows_relative_imports() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("html.js"), "export const html = 1;").unwrap();

        let result =
            loader(dir.path()).resolve("./html.js", &entry_url(dir.path()), ResolutionKind::Import);
        assert!(result.is_ok());
    }

    #[test]
    fn test_blocks_non_js_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("data.json"), "{}").unwrap();

        let result =
            loader(dir.path()).resolve("./data.json", &entry_url(dir.path()), ResolutionKind::Import);
        assert!(result.unwrap_err().to_string().contains("Only .js and .mjs"));
    }

    #[test]
    fn test_bare_specifier_uses_resolution() {
        let dir = tempdir().unwrap();
        let deps = dir.path().join("node_modules").join("kit");
        fs::create_dir_all(&deps).unwrap();
        fs::write(deps.join("index.js"), "export default 1;").unwrap();

        let loader = SandboxedLoader::new(
            &[dir.path().to_path_buf()],
            Arc::new(OneFile(deps.join("index.js"))),
        )
        .unwrap();
        let resolved = loader
            .resolve("kit", &entry_url(dir.path()), ResolutionKind::Import)
            .unwrap();
        assert!(resolved.path().ends_with("/node_modules/kit/index.js"));
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c.js")),
            Some(PathBuf::from("/a/c.js"))
        );
        assert_eq!(normalize_lexically(Path::new("/../x")), None);
        assert_eq!(normalize_lexically(Path::new("rel/x.js")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_package_under_dependency_dir() {
        use crate::resolver::NodeResolution;

        let workspace = tempdir().unwrap();
        fs::write(
            workspace.path().join("package.json"),
            r#"{"name": "kit", "main": "index.js"}"#,
        )
        .unwrap();
        fs::write(workspace.path().join("index.js"), "export default 1;").unwrap();

        let dir = tempdir().unwrap();
        let deps = dir.path().join("node_modules");
        fs::create_dir_all(&deps).unwrap();
        std::os::unix::fs::symlink(workspace.path(), deps.join("kit")).unwrap();

        let allowed = [dir.path().to_path_buf(), deps.clone()];
        let resolution = Arc::new(NodeResolution::server());

        let strict = SandboxedLoader::new(&allowed, resolution.clone()).unwrap();
        let denied = strict.resolve("kit", &entry_url(dir.path()), ResolutionKind::Import);
        assert!(denied.unwrap_err().to_string().contains("Access denied"));

        let linked = SandboxedLoader::new(&allowed, resolution)
            .unwrap()
            .with_dependency_dir(&deps);
        let resolved = linked
            .resolve("kit", &entry_url(dir.path()), ResolutionKind::Import)
            .unwrap();
        assert!(resolved.path().ends_with("/node_modules/kit/index.js"));
    }

    #[cfg(unix)]
    #[test]
    fn test_link_outside_dependency_dir_is_denied() {
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("evil.js"), "export default 1;").unwrap();

        let dir = tempdir().unwrap();
        let deps = dir.path().join("node_modules");
        fs::create_dir_all(&deps).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked")).unwrap();

        let loader = loader(dir.path()).with_dependency_dir(&deps);
        let result = loader.resolve(
            "./linked/evil.js",
            &entry_url(dir.path()),
            ResolutionKind::Import,
        );
        assert!(result.unwrap_err().to_string().contains("Access denied"));
    }

    #[test]
    fn test_bare_specifier_failure_is_reported() {
        let dir = tempdir().unwrap();
        let result = loader(dir.path()).resolve("missing-pkg", &entry_url(dir.path()), ResolutionKind::Import);
        assert!(result.unwrap_err().to_string().contains("missing-pkg"));
    }
}
