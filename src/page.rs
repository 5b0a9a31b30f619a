//! Request path → page source.
//!
//! `/about` looks for `src/about/index.html`, then `src/about/index.html.js`,
//! then `src/about/index.html.mjs`. `/about.html` looks for `src/about.html`
//! then `src/about.html.js`, and so on. A static document always wins over a
//! generator at the same logical path.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Extensions that mark a request path as a document.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["html", "htm"];

/// Appended to a directory-style request path.
pub const DEFAULT_DOCUMENT: &str = "index.html";

/// Generator script extensions, tried in this order.
pub const GENERATOR_EXTENSIONS: &[&str] = &["js", "mjs"];

/// Where a page's markup comes from. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Static(PathBuf),
    Generator(PathBuf),
}

impl PageSource {
    pub fn path(&self) -> &Path {
        match self {
            PageSource::Static(p) | PageSource::Generator(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageResolver {
    src_dir: PathBuf,
}

impl PageResolver {
    pub fn new(src_dir: impl Into<PathBuf>) -> Self {
        Self {
            src_dir: src_dir.into(),
        }
    }

    /// `None` means the caller should fall through to static assets.
    pub async fn resolve(&self, request_path: &str) -> Option<PageSource> {
        let document = self.document_path(request_path)?;

        if is_file(&document).await {
            return Some(PageSource::Static(document));
        }

        for ext in GENERATOR_EXTENSIONS {
            let mut generator = document.clone().into_os_string();
            generator.push(".");
            generator.push(ext);
            let generator = PathBuf::from(generator);
            if is_file(&generator).await {
                return Some(PageSource::Generator(generator));
            }
        }

        None
    }

    /// Normalized on-disk document path for `request_path`, or `None` when
    /// the path tries to leave the source directory.
    fn document_path(&self, request_path: &str) -> Option<PathBuf> {
        let path = request_path.split(['?', '#']).next().unwrap_or_default();
        let decoded = percent_decode_str(path).decode_utf8().ok()?;

        let mut relative = PathBuf::new();
        for component in Path::new(decoded.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }

        if !has_document_extension(&relative) {
            relative.push(DEFAULT_DOCUMENT);
        }
        Some(self.src_dir.join(relative))
    }
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn site(files: &[&str]) -> (tempfile::TempDir, PageResolver) {
        let dir = tempdir().unwrap();
        for file in files {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        let resolver = PageResolver::new(dir.path());
        (dir, resolver)
    }

    #[tokio::test]
    async fn test_document_extension_is_verbatim() {
        let (dir, resolver) = site(&["about.html"]);

        assert_eq!(
            resolver.resolve("/about.html").await,
            Some(PageSource::Static(dir.path().join("about.html")))
        );
        assert_eq!(resolver.resolve("/contact.html").await, None);
    }

    #[tokio::test]
    async fn test_directory_gets_default_document() {
        let (dir, resolver) = site(&["about/index.html", "index.html"]);

        assert_eq!(
            resolver.resolve("/about").await,
            Some(PageSource::Static(dir.path().join("about/index.html")))
        );
        assert_eq!(
            resolver.resolve("/").await,
            Some(PageSource::Static(dir.path().join("index.html")))
        );
    }

    #[tokio::test]
    async fn test_static_wins_over_generator() {
        let (dir, resolver) = site(&["index.html", "index.html.js"]);

        assert_eq!(
            resolver.resolve("/").await,
            Some(PageSource::Static(dir.path().join("index.html")))
        );
    }

    #[tokio::test]
    async fn test_generator_extension_order() {
        let (dir, resolver) = site(&["blog/index.html.mjs", "blog/index.html.js", "news/index.html.mjs"]);

        assert_eq!(
            resolver.resolve("/blog/").await,
            Some(PageSource::Generator(dir.path().join("blog/index.html.js")))
        );
        assert_eq!(
            resolver.resolve("/news").await,
            Some(PageSource::Generator(dir.path().join("news/index.html.mjs")))
        );
    }

    #[tokio::test]
    async fn test_generator_for_document_path() {
        let (dir, resolver) = site(&["feed.html.js"]);

        assert_eq!(
            resolver.resolve("/feed.html").await,
            Some(PageSource::Generator(dir.path().join("feed.html.js")))
        );
    }

    #[tokio::test]
    async fn test_directory_named_like_document_is_not_static() {
        let (_dir, resolver) = site(&["odd.html/index.html"]);
        assert_eq!(resolver.resolve("/odd.html").await, None);
    }

    #[tokio::test]
    async fn test_query_and_encoding() {
        let (dir, resolver) = site(&["my page/index.html"]);

        assert_eq!(
            resolver.resolve("/my%20page?x=1").await,
            Some(PageSource::Static(dir.path().join("my page/index.html")))
        );
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let (_dir, resolver) = site(&["index.html"]);
        assert_eq!(resolver.resolve("/../index.html").await, None);
        assert_eq!(resolver.resolve("/a/%2e%2e/%2e%2e/index.html").await, None);
    }

    #[tokio::test]
    async fn test_missing_page() {
        let (_dir, resolver) = site(&["index.html"]);
        assert_eq!(resolver.resolve("/missing").await, None);
    }
}
