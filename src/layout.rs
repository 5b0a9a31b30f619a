//! Project layout discovery.
//!
//! The source tree is `<root>/src`. The lockfile and the `node_modules`
//! directory may live in any ancestor of the root (workspaces hoist them), so
//! both are located by walking parent directories.
//!
//! The live-reload client and the render worker bootstrap are compiled into
//! the binary, so unlike the on-disk paths they cannot be missing at runtime.

use std::path::{Path, PathBuf};

use crate::error::LayoutError;

pub const SOURCE_DIR: &str = "src";
pub const MANIFEST_FILE: &str = "package-lock.json";
pub const DEPENDENCY_DIR: &str = "node_modules";
pub const NOT_FOUND_PAGE: &str = "404.html";

/// Which kind of filesystem entry a search is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    fn matches(self, path: &Path) -> bool {
        match self {
            EntryKind::File => path.is_file(),
            EntryKind::Dir => path.is_dir(),
        }
    }
}

/// Absolute locations used by the server, resolved once at startup.
///
/// The live-reload client and the render worker bootstrap have no entry here:
/// both are compiled into the binary (`inject::LIVERELOAD_CLIENT` and the
/// sandbox extension) and never read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub src_dir: PathBuf,
    pub manifest: PathBuf,
    pub dependency_dir: PathBuf,
    pub page_404: PathBuf,
}

impl ProjectPaths {
    /// Resolve the layout for a project rooted at `cwd`.
    pub fn resolve(cwd: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let root = cwd.as_ref().to_path_buf();
        let src_dir = root.join(SOURCE_DIR);
        let manifest = find_closest(&root, MANIFEST_FILE, EntryKind::File)?;
        let dependency_dir = find_closest(&root, DEPENDENCY_DIR, EntryKind::Dir)?;

        Ok(Self {
            page_404: src_dir.join(NOT_FOUND_PAGE),
            root,
            src_dir,
            manifest,
            dependency_dir,
        })
    }

    /// Resolve the layout for the process working directory.
    pub fn from_current_dir() -> Result<Self, LayoutError> {
        let cwd = std::env::current_dir().map_err(LayoutError::Cwd)?;
        Self::resolve(cwd)
    }
}

/// Find `name` in `start` or the nearest ancestor that contains it.
pub fn find_closest(start: &Path, name: &str, kind: EntryKind) -> Result<PathBuf, LayoutError> {
    let mut current = start;
    loop {
        let candidate = current.join(name);
        if kind.matches(&candidate) {
            return Ok(candidate);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }

    Err(LayoutError::NotFound {
        name: name.to_string(),
        start: start.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_finds_in_start_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();

        let found = find_closest(dir.path(), MANIFEST_FILE, EntryKind::File).unwrap();
        assert_eq!(found, dir.path().join(MANIFEST_FILE));
    }

    #[test]
    fn test_walks_up_to_ancestor() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(DEPENDENCY_DIR)).unwrap();
        let nested = dir.path().join("packages").join("site");
        fs::create_dir_all(&nested).unwrap();

        let found = find_closest(&nested, DEPENDENCY_DIR, EntryKind::Dir).unwrap();
        assert_eq!(found, dir.path().join(DEPENDENCY_DIR));
    }

    #[test]
    fn test_kind_must_match() {
        let dir = tempdir().unwrap();
        // A directory named like the manifest is not the manifest
        fs::create_dir(dir.path().join("only-dir.json")).unwrap();

        let result = find_closest(dir.path(), "only-dir.json", EntryKind::File);
        assert!(matches!(result, Err(LayoutError::NotFound { .. })));
    }

    #[test]
    fn test_resolve_layout() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();
        fs::create_dir(dir.path().join(DEPENDENCY_DIR)).unwrap();

        let paths = ProjectPaths::resolve(dir.path()).unwrap();
        assert_eq!(paths.src_dir, dir.path().join("src"));
        assert_eq!(paths.page_404, dir.path().join("src").join("404.html"));
        assert_eq!(paths.dependency_dir, dir.path().join(DEPENDENCY_DIR));
    }

    #[test]
    fn test_resolve_fails_without_dependencies() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{}").unwrap();

        let err = ProjectPaths::resolve(dir.path()).unwrap_err();
        assert!(err.to_string().contains(DEPENDENCY_DIR));
    }
}
