//! Application state.
//!
//! Shared state for all request handlers. Everything here is built before the
//! listener is bound and only read afterwards.

use std::sync::Arc;

use tokio::sync::watch;

use crate::change_bus::ChangeBus;
use crate::import_map::ImportMap;
use crate::inject::RuntimeInjector;
use crate::layout::ProjectPaths;
use crate::page::PageResolver;
use crate::resolver::{NodeResolution, PackageResolver};
use crate::sandbox::{RenderSandbox, SandboxConfig};

pub struct AppState {
    pub paths: ProjectPaths,
    pub pages: PageResolver,
    pub sandbox: RenderSandbox,
    pub injector: RuntimeInjector,
    pub packages: PackageResolver,
    pub changes: ChangeBus,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        paths: ProjectPaths,
        import_map: &ImportMap,
        render: SandboxConfig,
        changes: ChangeBus,
    ) -> Self {
        let packages = PackageResolver::new(
            Arc::new(NodeResolution::browser()),
            paths.dependency_dir.clone(),
        );
        let sandbox = RenderSandbox::new(
            render,
            vec![paths.root.clone(), paths.dependency_dir.clone()],
            Arc::new(NodeResolution::server()),
        )
        .with_dependency_dir(paths.dependency_dir.clone());

        Self {
            pages: PageResolver::new(paths.src_dir.clone()),
            injector: RuntimeInjector::new(import_map),
            sandbox,
            packages,
            changes,
            shutdown: watch::Sender::new(false),
            paths,
        }
    }

    /// Ask long-lived responses (the event streams) to finish.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
