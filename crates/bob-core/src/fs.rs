//! Staged file writes.
//!
//! Every write a command performs lands in a [`FileCommitBuffer`] first and
//! only reaches the underlying [`FileStore`] when [`FileCommitBuffer::commit`]
//! is called at the end of a run. Reads go straight to the store: a command
//! that stages a write and reads the same path back sees the on-disk content,
//! not its own pending write.

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Backing storage the buffer reads from and flushes into.
pub trait FileStore: Send + Sync {
    /// Current content of `path`, or `None` when nothing exists there.
    fn read(&self, path: &Path) -> Result<Option<String>>;

    /// Write `content` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, content: &str) -> Result<()>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskStore;

impl FileStore for DiskStore {
    fn read(&self, path: &Path) -> Result<Option<String>> {
        crate::io::read_if_exists(path)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        crate::io::atomic_write(path, content.as_bytes())
    }
}

/// In-memory path → content map, flushed as a batch by [`commit`](Self::commit).
pub struct FileCommitBuffer {
    store: Arc<dyn FileStore>,
    staged: Mutex<BTreeMap<PathBuf, String>>,
}

impl std::fmt::Debug for FileCommitBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCommitBuffer")
            .field("staged", &self.staged_paths())
            .finish()
    }
}

impl Default for FileCommitBuffer {
    fn default() -> Self {
        Self::new(Arc::new(DiskStore))
    }
}

impl FileCommitBuffer {
    pub fn new(store: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            staged: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, String>> {
        // Every mutation is a single insert or pop, so a poisoned map is still consistent.
        self.staged.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `content` for `path`, replacing anything staged there before.
    pub fn stage(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let path = path.into();
        tracing::debug!(path = %path.display(), "staging write");
        self.lock().insert(path, content.into());
    }

    /// Existing content on the store. Pending staged writes are not consulted.
    pub fn read_existing(&self, path: &Path) -> Result<Option<String>> {
        self.store.read(path)
    }

    /// Content staged for `path`, if any.
    pub fn staged(&self, path: &Path) -> Option<String> {
        self.lock().get(path).cloned()
    }

    pub fn staged_paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Flush every staged write to the store in path order, then clear.
    ///
    /// The first failing write stops the flush and is returned; entries that
    /// were not yet written stay staged. Returns the number of files written.
    pub fn commit(&self) -> Result<usize> {
        let mut staged = self.lock();
        if staged.is_empty() {
            tracing::debug!("nothing staged, commit is a no-op");
            return Ok(0);
        }

        let mut written = 0;
        while let Some((path, content)) = staged.pop_first() {
            if let Err(e) = self.store.write(&path, &content) {
                staged.insert(path, content);
                return Err(e);
            }
            written += 1;
        }
        tracing::info!(files = written, "committed staged writes");
        Ok(written)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
