//! Import map generation from `package-lock.json`.
//!
//! Every installed, non-dev package becomes two entries: `name` pointing at
//! `/__packages/name` and `name/` pointing at `/__packages/name/`. The browser
//! then requests `/__packages/...`, which the server resolves and redirects to
//! the real file under `/node_modules/`.
//!
//! The map is built once at startup; edits to the lockfile need a restart.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ManifestError;
use crate::layout::DEPENDENCY_DIR;

/// URL prefix under which packages are exposed to the browser.
pub const PACKAGES_PREFIX: &str = "__packages";

/// Browser import map (`{"imports": {...}}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportMap {
    imports: Map<String, Value>,
}

/// The subset of a lockfile record we care about.
#[derive(Debug, Default, Deserialize)]
struct PackageRecord {
    #[serde(default)]
    dev: bool,
}

impl ImportMap {
    /// Read and parse the manifest at `path`.
    pub fn build(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_manifest_str(&text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build from manifest text.
    ///
    /// Accepts a full lockfile (records under `packages`) or a bare
    /// `packages` object.
    pub fn from_manifest_str(text: &str) -> Result<Self, serde_json::Error> {
        let manifest: Map<String, Value> = serde_json::from_str(text)?;
        let packages = match manifest.get("packages") {
            Some(Value::Object(packages)) => packages.clone(),
            _ => manifest,
        };
        Self::from_packages(&packages)
    }

    fn from_packages(packages: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut imports = Map::new();

        for (install_path, record) in packages {
            let Some(name) = package_name(install_path) else {
                continue;
            };
            if !record.is_object() || imports.contains_key(name) {
                continue;
            }
            let record: PackageRecord = serde_json::from_value(record.clone())?;
            if record.dev {
                continue;
            }

            let url = package_url(install_path);
            imports.insert(name.to_string(), Value::String(url.clone()));
            imports.insert(format!("{name}/"), Value::String(format!("{url}/")));
        }

        Ok(Self { imports })
    }

    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.imports.get(specifier).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.imports.keys().map(String::as_str)
    }

    /// Pretty JSON, two-space indent.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{\"imports\":{}}"))
    }
}

/// Name of the package installed at `install_path`: the part after the last
/// `node_modules/`. `None` for the root record and for workspace paths.
fn package_name(install_path: &str) -> Option<&str> {
    let marker = format!("{DEPENDENCY_DIR}/");
    let (_, name) = install_path.rsplit_once(marker.as_str())?;
    (!name.is_empty()).then_some(name)
}

fn package_url(install_path: &str) -> String {
    let marker = format!("{DEPENDENCY_DIR}/");
    let public = format!("{PACKAGES_PREFIX}/");
    format!("/{}", install_path.replacen(marker.as_str(), &public, 1))
}
