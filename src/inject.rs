//! Runtime injection into served documents.
//!
//! Adds two script blocks (the import map and the live-reload client) right
//! after the opening `<head>` tag, or at the very start of the document when
//! there is no head. Injection is not idempotent: running it twice inserts the
//! scripts twice, so the server calls it exactly once per response.

use crate::import_map::ImportMap;

/// Live-reload client, compiled in.
pub const LIVERELOAD_CLIENT: &str = include_str!("runtime/livereload.js");

#[derive(Debug, Clone)]
pub struct RuntimeInjector {
    preamble: String,
}

impl RuntimeInjector {
    pub fn new(import_map: &ImportMap) -> Self {
        Self::with_client(import_map, LIVERELOAD_CLIENT)
    }

    pub fn with_client(import_map: &ImportMap, client: &str) -> Self {
        let import_map_json = import_map.to_json().replace("</", "<\\/");
        let preamble = format!(
            "<script type=\"importmap\">{import_map_json}</script><script>{client}</script>"
        );
        Self { preamble }
    }

    /// The two script blocks exactly as inserted.
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Works on raw bytes so documents in any ASCII-compatible encoding pass
    /// through untouched outside the inserted scripts.
    pub fn inject(&self, markup: &[u8]) -> Vec<u8> {
        let at = head_insertion_point(markup).unwrap_or(0);
        let mut out = Vec::with_capacity(markup.len() + self.preamble.len());
        out.extend_from_slice(&markup[..at]);
        out.extend_from_slice(self.preamble.as_bytes());
        out.extend_from_slice(&markup[at..]);
        out
    }
}

/// Byte offset just past the first `<head ...>` opening tag.
fn head_insertion_point(bytes: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = find_ascii_case_insensitive(&bytes[from..], b"<head") {
        let after = from + rel + b"<head".len();
        match bytes.get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() || *c == b'/' => {
                let close = bytes[after..].iter().position(|b| *b == b'>')?;
                return Some(after + close + 1);
            }
            // `<header>`, `<heading>` and friends
            _ => from = after,
        }
    }
    None
}

fn find_ascii_case_insensitive(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inject_str(injector: &RuntimeInjector, html: &str) -> String {
        String::from_utf8(injector.inject(html.as_bytes())).unwrap()
    }

    fn injector() -> RuntimeInjector {
        let map = ImportMap::from_manifest_str(r#"{"node_modules/left-pad": {}}"#).unwrap();
        RuntimeInjector::with_client(&map, "/*client*/")
    }

    #[test]
    fn test_inserts_after_head() {
        let injector = injector();
        let html = "<!DOCTYPE html><html><head><title>T</title></head><body></body></html>";
        let out = inject_str(&injector, html);

        let expected = format!(
            "<!DOCTYPE html><html><head>{}<title>T</title></head><body></body></html>",
            injector.preamble()
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_head_with_attributes_and_case() {
        let injector = injector();
        let out = inject_str(&injector, "<HTML><HEAD lang=\"en\"><meta charset=\"utf-8\"></HEAD></HTML>");
        assert!(out.starts_with(&format!("<HTML><HEAD lang=\"en\">{}", injector.preamble())));
    }

    #[test]
    fn test_header_is_not_head() {
        let injector = injector();
        let html = "<body><header>Top</header></body>";
        let out = inject_str(&injector, html);
        assert_eq!(out, format!("{}{}", injector.preamble(), html));
    }

    #[test]
    fn test_prepends_without_head() {
        let injector = injector();
        assert_eq!(
            inject_str(&injector, "<p>fragment</p>"),
            format!("{}<p>fragment</p>", injector.preamble())
        );
        assert_eq!(inject_str(&injector, ""), injector.preamble());
    }

    #[test]
    fn test_only_difference_is_preamble() {
        let injector = injector();
        let html = "<html><head></head><body>é</body></html>";
        let out = inject_str(&injector, html);
        assert_eq!(out.replacen(injector.preamble(), "", 1), html);
    }

    #[test]
    fn test_bytes_are_preserved() {
        let injector = injector();
        // "café" in Latin-1
        let html = b"<html><head><meta charset=\"iso-8859-1\"></head><body>caf\xe9</body></html>";
        let out = injector.inject(html);

        let at = b"<html><head>".len();
        assert_eq!(&out[..at], &html[..at]);
        assert_eq!(&out[at..at + injector.preamble().len()], injector.preamble().as_bytes());
        assert_eq!(&out[at + injector.preamble().len()..], &html[at..]);
    }

    #[test]
    fn test_not_idempotent() {
        let injector = injector();
        let twice = inject_str(&injector, &inject_str(&injector, "<head></head>"));
        assert_eq!(twice.matches("type=\"importmap\"").count(), 2);
    }

    #[test]
    fn test_preamble_contents() {
        let injector = injector();
        assert!(injector.preamble().starts_with("<script type=\"importmap\">{"));
        assert!(injector.preamble().contains("\"left-pad\": \"/__packages/left-pad\""));
        assert!(injector.preamble().ends_with("<script>/*client*/</script>"));
    }

    #[test]
    fn test_default_client_listens_for_changes() {
        assert!(LIVERELOAD_CLIENT.contains("/events"));
        assert!(LIVERELOAD_CLIENT.contains("change"));
    }
}
