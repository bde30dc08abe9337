//! Exactly-once removal of a request's temporary artifacts.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::services::TransientStore;

/// Collects every path a request creates and deletes them all exactly once.
///
/// The guard is held across the whole conversion; `run` fires on every exit
/// path through `Drop`, including early validation rejects and a panicking
/// pipeline. Running it again is a no-op, so an explicit call followed by the
/// drop cannot double-delete.
pub struct CleanupGuard {
    store: TransientStore,
    paths: Vec<PathBuf>,
    done: bool,
}

impl CleanupGuard {
    pub fn new(store: TransientStore) -> Self {
        CleanupGuard {
            store,
            paths: Vec::new(),
            done: false,
        }
    }

    /// Registers an artifact for removal once the request settles.
    pub fn track(&mut self, path: impl AsRef<Path>) {
        self.paths.push(path.as_ref().to_path_buf());
    }

    pub fn tracked(&self) -> usize {
        self.paths.len()
    }

    /// Removes everything tracked so far. Idempotent; deletion failures are
    /// logged by the store and never escalate.
    pub fn run(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        debug!(artifacts = self.paths.len(), "cleaning up request artifacts");
        for path in self.paths.drain(..) {
            self.store.release(&path);
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.run();
    }
}
