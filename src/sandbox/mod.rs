//! Isolated execution of page generators.
//!
//! Every render gets a brand-new isolate on its own OS thread, torn down when
//! the render ends. Nothing is pooled: page code may mutate globals and that
//! must not leak into the next request. The caller sees exactly one of three
//! outcomes: markup, an execution error reported by the worker, or the
//! worker dying without reporting anything.

mod loader;
mod ops;
mod runtime;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use deno_core::v8::IsolateHandle;
use serde::Deserialize;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

use crate::error::RenderError;
use crate::resolver::ModuleResolution;

pub use loader::SandboxedLoader;
pub use ops::ConsoleOutput;
pub use runtime::RenderOutput;

/// Limits applied to every render.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SandboxConfig {
    /// Maximum heap size in bytes (default: 64MB, None = unlimited)
    pub max_heap_size: Option<usize>,
    /// Maximum time for a single render in milliseconds (default: 30000ms, None = unlimited)
    pub timeout_ms: Option<u64>,
    /// Renders allowed to run at once; further requests wait for a slot
    pub max_concurrent: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_heap_size: Some(64 * 1024 * 1024),
            timeout_ms: Some(30_000),
            max_concurrent: 8,
        }
    }
}

/// The single message a worker sends back.
enum WorkerMessage {
    Page(RenderOutput),
    Failed(String),
}

struct RenderJob {
    entry: PathBuf,
    allowed_dirs: Vec<PathBuf>,
    dependency_dir: Option<PathBuf>,
    resolution: Arc<dyn ModuleResolution>,
    config: SandboxConfig,
}

#[derive(Clone)]
pub struct RenderSandbox {
    config: SandboxConfig,
    allowed_dirs: Vec<PathBuf>,
    dependency_dir: Option<PathBuf>,
    resolution: Arc<dyn ModuleResolution>,
    slots: Arc<Semaphore>,
}

impl RenderSandbox {
    /// `allowed_dirs` bounds what generators may import.
    pub fn new(
        config: SandboxConfig,
        allowed_dirs: Vec<PathBuf>,
        resolution: Arc<dyn ModuleResolution>,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            allowed_dirs,
            dependency_dir: None,
            resolution,
            slots,
        }
    }

    /// Let generators import packages linked into `dir` from elsewhere on disk.
    pub fn with_dependency_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dependency_dir = Some(dir.into());
        self
    }

    /// Render the generator at `path` in a fresh isolate.
    pub async fn render(&self, path: &Path) -> Result<String, RenderError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| RenderError::Terminated {
                path: path.to_path_buf(),
            })?;

        let start = Instant::now();
        let job = RenderJob {
            entry: path.to_path_buf(),
            allowed_dirs: self.allowed_dirs.clone(),
            dependency_dir: self.dependency_dir.clone(),
            resolution: Arc::clone(&self.resolution),
            config: self.config.clone(),
        };
        let cancelled = Arc::new(AtomicBool::new(false));
        let (handle_tx, handle_rx) = oneshot::channel::<IsolateHandle>();
        let (result_tx, result_rx) = oneshot::channel::<WorkerMessage>();

        std::thread::Builder::new()
            .name("render-worker".to_string())
            .spawn({
                let cancelled = Arc::clone(&cancelled);
                move || run_worker(job, permit, cancelled, handle_tx, result_tx)
            })
            .map_err(RenderError::Spawn)?;

        let received = match self.config.timeout_ms {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), result_rx).await {
                Ok(received) => received,
                Err(_) => {
                    cancelled.store(true, Ordering::SeqCst);
                    // The worker may not have built its isolate yet.
                    tokio::spawn(async move {
                        if let Ok(handle) = handle_rx.await {
                            handle.terminate_execution();
                        }
                    });
                    tracing::warn!(path = %path.display(), timeout_ms = ms, "Render timed out");
                    return Err(RenderError::TimedOut {
                        path: path.to_path_buf(),
                        ms,
                    });
                }
            },
            None => result_rx.await,
        };

        match received {
            Ok(WorkerMessage::Page(output)) => {
                log_console(path, &output.console);
                tracing::debug!(
                    path = %path.display(),
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Rendered page"
                );
                Ok(output.markup)
            }
            Ok(WorkerMessage::Failed(cause)) => Err(RenderError::Execution {
                path: path.to_path_buf(),
                cause,
            }),
            Err(_) => Err(RenderError::Terminated {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Worker thread body. The permit is held until the isolate is gone.
///
/// The handle is sent before `cancelled` is checked, so a caller that gave up
/// either stops the worker here or terminates the isolate through the handle.
fn run_worker(
    job: RenderJob,
    _permit: OwnedSemaphorePermit,
    cancelled: Arc<AtomicBool>,
    handle_tx: oneshot::Sender<IsolateHandle>,
    result_tx: oneshot::Sender<WorkerMessage>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = result_tx.send(WorkerMessage::Failed(format!(
                "Failed to start worker runtime: {e}"
            )));
            return;
        }
    };

    let outcome = rt.block_on(async move {
        let mut loader = SandboxedLoader::new(&job.allowed_dirs, job.resolution)?;
        if let Some(dir) = &job.dependency_dir {
            loader = loader.with_dependency_dir(dir);
        }
        let mut js = runtime::create_runtime(&job.config, loader);
        let _ = handle_tx.send(js.v8_isolate().thread_safe_handle());
        if cancelled.load(Ordering::SeqCst) {
            return Err(deno_core::anyhow::anyhow!("Render cancelled before it started"));
        }
        runtime::render_module(&mut js, &job.entry).await
    });

    let message = match outcome {
        Ok(output) => WorkerMessage::Page(output),
        Err(e) => WorkerMessage::Failed(format!("{e:#}")),
    };
    let _ = result_tx.send(message);
}

fn log_console(path: &Path, console: &ConsoleOutput) {
    for line in &console.logs {
        tracing::info!(page = %path.display(), "{line}");
    }
    for line in &console.warns {
        tracing::warn!(page = %path.display(), "{line}");
    }
    for line in &console.errors {
        tracing::error!(page = %path.display(), "{line}");
    }
}
