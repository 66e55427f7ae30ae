//! The [`Storage`] handle: a canonical root holding one directory per entry.

use crate::builder::StorageBuilder;
use crate::entry::EntryDir;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance::{self, EntryStat, TMP_MARKER};
use crate::security;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct StorageInner {
    /// Canonical physical root.
    pub(crate) root: PathBuf,
    /// Source of unique temporary file suffixes.
    pub(crate) tmp_counter: AtomicU64,
}

/// Thread-safe, cheaply cloneable handle to the storage root.
///
/// Every entry owns the directory `<root>/<id>`. Writes go through a unique
/// temporary file, `fsync` and `rename`, so a reader never observes a half
/// written member or archive.
///
/// ```rust
/// use vanish_storage::{Storage, StorageError};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     let storage = Storage::builder().root(tmp.path().join("uploads")).connect().await?;
///
///     let entry = storage.entry("3f2b8c1e-7d4a-4f6e-9a0b-1c2d3e4f5a6b")?;
///     entry.create().await?;
///     entry.write("notes.txt", b"hello").await?;
///     assert!(entry.exists("notes.txt").await?);
///
///     assert!(entry.remove().await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Deref for Storage {
    type Target = StorageInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Storage {
    #[must_use = "The storage engine is not initialized until you call .connect()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// The canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Handle to the directory owned by entry `id`. Nothing touches the disk yet.
    ///
    /// # Errors
    /// [`StorageError::InvalidEntryId`] when `id` is not a safe directory name.
    pub fn entry(&self, id: &str) -> Result<EntryDir, StorageError> {
        security::check_entry_id(id)?;
        let path = security::resolve_path(&self.root, id)?;
        Ok(EntryDir::new(self.clone(), id, path))
    }

    /// Resolves a root-relative path inside the sandbox.
    ///
    /// # Errors
    /// [`StorageError::PathTraversalAttempt`] when the path escapes the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        security::resolve_path(&self.root, path)
    }

    /// Every entry directory currently on disk, sorted by id.
    ///
    /// # Errors
    /// [`StorageError::Join`] when the blocking scan panics.
    pub async fn entry_dirs(&self) -> Result<Vec<EntryStat>, StorageError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || maintenance::list_entry_dirs(&root))
            .await
            .context("Listing entry directories")
    }

    /// Removes temporary files older than the stale threshold. Returns the
    /// number removed.
    pub async fn purge_tmp(&self) -> usize {
        maintenance::purge_tmp(&self.root).await
    }

    pub(crate) fn tmp_path(&self, target: &Path) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let name = target.file_name().and_then(|s| s.to_str()).unwrap_or("member");
        target.with_file_name(format!("{name}{TMP_MARKER}{n}"))
    }

    /// Atomic swap of `data` into `target`.
    pub(crate) async fn write_atomic(&self, target: &Path, data: &[u8]) -> Result<(), StorageError> {
        let data = data.to_vec();
        self.write_atomic_with(target, move |file| file.write_all(&data)).await?;
        Ok(())
    }

    /// Runs `fill` against a fresh temporary file on a blocking thread, then
    /// syncs it and renames it onto `target`. Returns the final size.
    pub(crate) async fn write_atomic_with<F>(
        &self,
        target: &Path,
        fill: F,
    ) -> Result<u64, StorageError>
    where
        F: FnOnce(&mut std::fs::File) -> std::io::Result<()> + Send + 'static,
    {
        let temp = self.tmp_path(target);
        let final_path = target.to_path_buf();

        let swap = {
            let temp = temp.clone();
            move || -> Result<u64, StorageError> {
                let mut file = std::fs::OpenOptions::new()
                    .create_new(true)
                    .write(true)
                    .open(&temp)
                    .context(format!("Temp creation failed: {}", temp.display()))?;
                fill(&mut file).context(format!("Write failed: {}", temp.display()))?;
                file.sync_all().context("Hardware sync failed")?;
                let len = file.metadata().context("Reading written size")?.len();
                drop(file);

                std::fs::rename(&temp, &final_path).context(format!(
                    "Atomic swap failed: {} -> {}",
                    temp.display(),
                    final_path.display()
                ))?;
                Ok(len)
            }
        };

        let result = tokio::task::spawn_blocking(swap).await.context("Atomic write task")?;
        if result.is_err() {
            let _ = fs::remove_file(&temp).await;
        }
        let len = result?;

        if let Some(parent) = target.parent() {
            sync_dir(parent).await;
        }
        debug!(path = %target.display(), bytes = len, "File saved atomically");
        Ok(len)
    }
}

pub(crate) async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                warn!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => warn!(path = %path.display(), error = %err, "Directory open failed"),
    }
}
