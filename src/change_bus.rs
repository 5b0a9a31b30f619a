//! Source tree change notifications.
//!
//! One recursive watcher per process. Every raw filesystem event under the
//! watched root becomes one payload-free broadcast; listeners treat each one
//! as "reload everything". There is no replay for late subscribers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    // Registration order is preserved; ids are never reused.
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

/// Broadcast channel for "something under the source tree changed".
///
/// Cloning is cheap and every clone refers to the same subscriber set.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Arc<Inner>,
}

/// Keeps a listener registered until dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    bus: ChangeBus,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.remove(self.id);
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. It runs on the broadcasting thread and must not block.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            id,
            bus: self.clone(),
        }
    }

    fn remove(&self, id: u64) {
        self.inner.listeners.write().retain(|(lid, _)| *lid != id);
    }

    /// Call every current listener once, in registration order.
    ///
    /// The read lock is held for the whole pass, so a concurrent
    /// subscribe/unsubscribe waits for it and never sees a partial set.
    pub fn broadcast(&self) {
        let listeners = self.inner.listeners.read();
        for (_, listener) in listeners.iter() {
            listener();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Start watching `root` recursively. Later calls replace the watcher.
    pub fn start(&self, root: &Path) -> Result<(), notify::Error> {
        let bus = self.clone();
        let watched: PathBuf = root.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    tracing::debug!(kind = ?event.kind, paths = ?event.paths, "Source change");
                    bus.broadcast();
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            }
        })?;
        watcher.watch(&watched, RecursiveMode::Recursive)?;

        *self.inner.watcher.lock() = Some(watcher);
        tracing::info!(path = %watched.display(), "Watching for changes");
        Ok(())
    }
}
