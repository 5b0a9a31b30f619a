//! # elbebe
//!
//! A local development server for plain-HTML projects.
//!
//! - Serves `src/` with pretty URLs (`/about` → `src/about/index.html`)
//! - Renders `*.html.js` page generators in a fresh, isolated V8 runtime
//! - Lets the browser import npm packages by bare name through an import map
//!   built from `package-lock.json`
//! - Reloads open pages whenever anything under `src/` changes
//!
//! ## Isolation
//!
//! Page generators get no filesystem, network, environment, or process
//! access. They may import modules from the project and its dependency
//! directory only, and each render runs in its own isolate under a time and
//! heap limit.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use elbebe::{run_server, DevConfig, ProjectPaths};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let paths = ProjectPaths::from_current_dir()?;
//!     run_server(paths, DevConfig::default()).await
//! }
//! ```

pub mod change_bus;
pub mod config;
pub mod error;
pub mod import_map;
pub mod inject;
pub mod layout;
pub mod page;
pub mod resolver;
pub mod sandbox;
pub mod server;

pub use change_bus::{ChangeBus, Subscription};
pub use config::DevConfig;
pub use error::{ConfigError, LayoutError, ManifestError, RenderError, ResolutionError};
pub use import_map::ImportMap;
pub use inject::RuntimeInjector;
pub use layout::ProjectPaths;
pub use page::{PageResolver, PageSource};
pub use resolver::{ModuleResolution, NodeResolution, PackageResolver};
pub use sandbox::{RenderSandbox, SandboxConfig};
pub use server::{create_router, run_server, AppState};
