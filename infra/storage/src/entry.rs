use crate::engine::Storage;
use crate::error::{StorageError, StorageErrorExt};
use crate::maintenance::TMP_MARKER;
use crate::security;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// The storage directory owned by one entry.
///
/// Member names are single path segments; anything else is rejected before
/// it reaches the filesystem.
#[derive(Debug, Clone)]
pub struct EntryDir {
    storage: Storage,
    id: Arc<str>,
    path: PathBuf,
}

impl EntryDir {
    pub(crate) fn new(storage: Storage, id: &str, path: PathBuf) -> Self {
        Self { storage, id: Arc::from(id), path }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Physical path of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory (and the root, if it vanished).
    ///
    /// # Errors
    /// [`StorageError::Io`] on permission or disk failures.
    pub async fn create(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.path)
            .await
            .context(format!("Creating entry directory {}", self.path.display()))
    }

    /// Whether the directory exists. I/O errors count as absent.
    pub async fn is_present(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Physical path of member `name`.
    ///
    /// # Errors
    /// [`StorageError::PathTraversalAttempt`] when `name` is not a plain file name.
    pub fn member_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        security::check_member_name(name)?;
        Ok(self.path.join(name))
    }

    /// Atomically writes `data` as member `name`, replacing any previous file.
    ///
    /// # Errors
    /// Invalid names or I/O failures.
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let target = self.member_path(name)?;
        self.create().await?;
        self.storage.write_atomic(&target, data).await
    }

    /// Atomically produces member `name` by running `fill` on a blocking
    /// thread against a temporary file. Returns the final size in bytes.
    ///
    /// # Errors
    /// Invalid names, I/O failures or errors returned by `fill`.
    pub async fn write_with<F>(&self, name: &str, fill: F) -> Result<u64, StorageError>
    where
        F: FnOnce(&mut std::fs::File) -> std::io::Result<()> + Send + 'static,
    {
        let target = self.member_path(name)?;
        self.create().await?;
        self.storage.write_atomic_with(&target, fill).await
    }

    /// # Errors
    /// Invalid names or I/O failures other than "not found".
    pub async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let target = self.member_path(name)?;
        fs::try_exists(&target).await.context(format!("Probing {}", target.display()))
    }

    /// Opens member `name` for reading and returns it with its length.
    ///
    /// # Errors
    /// [`StorageError::FileNotFound`] when the member (or the directory) is gone.
    pub async fn open(&self, name: &str) -> Result<(fs::File, u64), StorageError> {
        let target = self.member_path(name)?;
        let file = match fs::File::open(&target).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::FileNotFound {
                    message: target.display().to_string().into(),
                    context: Some(format!("Entry {}", self.id).into()),
                });
            },
            Err(e) => return Err(e).context(format!("Opening {}", target.display())),
        };
        let len = file.metadata().await.context("Reading member size")?.len();
        Ok((file, len))
    }

    /// Stored member names in directory order, temporary files excluded.
    ///
    /// # Errors
    /// [`StorageError::DirectoryNotFound`] when the directory does not exist.
    pub async fn members(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = match fs::read_dir(&self.path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::DirectoryNotFound {
                    message: self.id.to_string().into(),
                    context: None,
                });
            },
            Err(e) => return Err(e).context(format!("Listing {}", self.path.display())),
        };

        let mut names = Vec::new();
        while let Some(item) = dir.next_entry().await.context("Reading directory entry")? {
            if let Some(name) = item.file_name().to_str() {
                if !name.contains(TMP_MARKER) {
                    names.push(name.to_owned());
                }
            }
        }
        Ok(names)
    }

    /// Recursively removes the directory. Returns `false` when it was
    /// already gone.
    ///
    /// # Errors
    /// [`StorageError::Io`] for failures other than "not found".
    pub async fn remove(&self) -> Result<bool, StorageError> {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(id = %self.id, "Entry directory removed");
                Ok(true)
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(format!("Removing {}", self.path.display())),
        }
    }
}
