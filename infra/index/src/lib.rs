//! # Metadata Index
//!
//! One embedded [redb](https://docs.rs/redb) file maps entry ids to JSON
//! encoded [`Entry`] records for every tenant.
//!
//! ## Scoping
//! - **Single records** ([`Index::get`], [`Index::lookup`], [`Index::delete`])
//!   require the caller's context to equal the owner's. A foreign record is
//!   reported exactly like a missing one.
//! - **Listings** ([`Index::list`]) match the filter as a substring of the
//!   owner's context, an empty filter matches every record.
//!
//! ## Example
//!
//! ```rust
//! use vanish_domain::{ApiContext, Entry, EntryKind, Expire, FormBody};
//! use vanish_index::{Index, IndexError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), IndexError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     let index = Index::builder().path(tmp.path().join("index.redb")).open().await?;
//!
//!     let ctx = ApiContext::new("teamA").unwrap();
//!     let form = Entry::form("f-1", ctx.clone(), Expire::Asap, FormBody::default());
//!     index.insert(&form).await?;
//!
//!     assert_eq!(index.get(&ctx, "f-1", EntryKind::Form).await?.id, "f-1");
//!     Ok(())
//! }
//! ```

mod error;

pub use error::{IndexError, IndexErrorExt};

use redb::{Database, ReadOnlyTable, ReadableTable, Table, TableDefinition};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, instrument, trace};
use vanish_domain::{ApiContext, Entry, EntryKind};

const ENTRIES: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("entries");

type EntriesTable<'txn> = Table<'txn, &'static str, &'static [u8]>;
type EntriesView = ReadOnlyTable<&'static str, &'static [u8]>;

/// Inner state of the [`Index`] handle.
pub struct IndexInner {
    db: Database,
    path: PathBuf,
}

impl fmt::Debug for IndexInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexInner").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Drop for IndexInner {
    fn drop(&mut self) {
        info!(path = %self.path.display(), "Metadata index closed");
    }
}

/// Cloneable handle to the metadata index.
///
/// redb serializes write transactions, so a read-modify-write of a single
/// key inside one transaction is atomic. Every call runs on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

impl Index {
    #[must_use = "The index is not opened until you call .open()"]
    pub fn builder() -> IndexBuilder {
        IndexBuilder::new()
    }

    /// Location of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Upserts `entry` under its id.
    ///
    /// # Errors
    /// [`IndexError::Serialization`] or [`IndexError::Backend`]. Nothing is retried.
    #[instrument(skip_all, fields(id = %entry.id, kind = %entry.kind()))]
    pub async fn insert(&self, entry: &Entry) -> Result<(), IndexError> {
        if entry.id.is_empty() {
            return Err(IndexError::Validation { message: "entry id is empty".into(), context: None });
        }
        let id = entry.id.clone();
        let bytes = serde_json::to_vec(entry).context("Encoding entry")?;

        self.blocking("Inserting entry", move |db| {
            write_txn(db, |table| {
                table.insert(id.as_str(), bytes.as_slice()).map_err(backend("Storing entry"))?;
                Ok(())
            })
        })
        .await?;

        debug!("Entry indexed");
        Ok(())
    }

    /// The entry `id` of `kind` owned by `ctx`.
    ///
    /// # Errors
    /// [`IndexError::NotFound`] when absent, foreign or of another kind.
    pub async fn get(&self, ctx: &ApiContext, id: &str, kind: EntryKind) -> Result<Entry, IndexError> {
        self.scoped(ctx, id, kind).await
    }

    /// Same matching as [`Index::get`], used on the delivery path.
    ///
    /// # Errors
    /// See [`Index::get`].
    pub async fn lookup(&self, ctx: &ApiContext, id: &str, kind: EntryKind) -> Result<Entry, IndexError> {
        trace!(%id, %kind, "Delivery lookup");
        self.scoped(ctx, id, kind).await
    }

    /// Removes the record owned by `ctx` and returns it. The storage directory
    /// is left alone.
    ///
    /// # Errors
    /// [`IndexError::NotFound`] when absent or foreign.
    #[instrument(skip(self, ctx), fields(context = %ctx))]
    pub async fn delete(&self, ctx: &ApiContext, id: &str) -> Result<Entry, IndexError> {
        let ctx = ctx.clone();
        let key = id.to_owned();

        let removed = self
            .blocking("Deleting entry", move |db| {
                write_txn(db, |table| {
                    let raw = table
                        .get(key.as_str())
                        .map_err(backend("Reading entry"))?
                        .map(|guard| guard.value().to_vec());
                    let Some(raw) = raw else {
                        return Err(IndexError::not_found(&key));
                    };

                    let entry = decode(&key, &raw)?;
                    if !ctx.owns(&entry.context) {
                        return Err(IndexError::not_found(&key));
                    }

                    table.remove(key.as_str()).map_err(backend("Removing entry"))?;
                    Ok(entry)
                })
            })
            .await?;

        debug!("Entry removed from index");
        Ok(removed)
    }

    /// Every entry of `kind` whose context contains `filter` and, when
    /// `query` is given, whose description or file contains it. Ordered by id.
    ///
    /// # Errors
    /// [`IndexError::Backend`] or [`IndexError::Serialization`].
    pub async fn list(
        &self,
        ctx: &ApiContext,
        filter: &str,
        kind: EntryKind,
        query: Option<&str>,
    ) -> Result<Vec<Entry>, IndexError> {
        let filter = filter.to_owned();
        let query = query.unwrap_or_default().to_owned();

        let entries = self
            .scan("Listing entries", move |entry| {
                entry.kind() == kind && entry.context.contains(filter.as_str()) && entry.matches_query(&query)
            })
            .await?;

        debug!(context = %ctx, %kind, matched = entries.len(), "Entries listed");
        Ok(entries)
    }

    /// Every record of both kinds, ordered by id.
    ///
    /// # Errors
    /// [`IndexError::Backend`] or [`IndexError::Serialization`].
    pub async fn all(&self) -> Result<Vec<Entry>, IndexError> {
        self.scan("Reading all entries", |_| true).await
    }

    async fn scoped(&self, ctx: &ApiContext, id: &str, kind: EntryKind) -> Result<Entry, IndexError> {
        let key = id.to_owned();
        let found = self
            .blocking("Reading entry", move |db| {
                read_txn(db, |table| {
                    let guard = table.get(key.as_str()).map_err(backend("Reading entry"))?;
                    guard.map(|raw| decode(&key, raw.value())).transpose()
                })
            })
            .await?;

        match found {
            Some(entry) if ctx.owns(&entry.context) && entry.kind() == kind => Ok(entry),
            Some(_) => {
                debug!(%id, context = %ctx, "Scoped read rejected");
                Err(IndexError::not_found(id))
            },
            None => Err(IndexError::not_found(id)),
        }
    }

    async fn scan<F>(&self, label: &'static str, keep: F) -> Result<Vec<Entry>, IndexError>
    where
        F: Fn(&Entry) -> bool + Send + 'static,
    {
        self.blocking(label, move |db| {
            read_txn(db, |table| {
                let mut out = Vec::new();
                for item in table.iter().map_err(backend("Scanning entries"))? {
                    let (key, value) = item.map_err(backend("Reading entry"))?;
                    let entry = decode(key.value(), value.value())?;
                    if keep(&entry) {
                        out.push(entry);
                    }
                }
                Ok(out)
            })
        })
        .await
    }

    async fn blocking<T, F>(&self, label: &'static str, job: F) -> Result<T, IndexError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, IndexError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || job(&inner.db)).await.context(label)?
    }
}

fn backend<E: Into<redb::Error>>(context: &'static str) -> impl FnOnce(E) -> IndexError {
    move |err| IndexError::Backend { source: err.into(), context: Some(context.into()) }
}

fn decode(id: &str, raw: &[u8]) -> Result<Entry, IndexError> {
    serde_json::from_slice(raw).context(format!("Decoding entry {id}"))
}

fn write_txn<T, F>(db: &Database, f: F) -> Result<T, IndexError>
where
    F: FnOnce(&mut EntriesTable<'_>) -> Result<T, IndexError>,
{
    let txn = db.begin_write().map_err(backend("Opening write transaction"))?;
    let out = {
        let mut table = txn.open_table(ENTRIES).map_err(backend("Opening entries table"))?;
        f(&mut table)?
    };
    txn.commit().map_err(backend("Committing write transaction"))?;
    Ok(out)
}

fn read_txn<T, F>(db: &Database, f: F) -> Result<T, IndexError>
where
    F: FnOnce(&EntriesView) -> Result<T, IndexError>,
{
    let txn = db.begin_read().map_err(backend("Opening read transaction"))?;
    let table = txn.open_table(ENTRIES).map_err(backend("Opening entries table"))?;
    f(&table)
}

/// A fluent builder opening the index file.
#[must_use = "builders do nothing unless you call .open()"]
#[derive(Debug)]
pub struct IndexBuilder {
    path: Option<PathBuf>,
    create: bool,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self { path: None, create: true }
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of the redb file.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Create the file and its parent directory when missing (default `true`).
    pub const fn create(mut self, enable: bool) -> Self {
        self.create = enable;
        self
    }

    /// Opens the index and makes sure the entries table exists.
    ///
    /// # Errors
    /// * [`IndexError::Validation`] when no path was given.
    /// * [`IndexError::Io`] when the parent directory cannot be created.
    /// * [`IndexError::Backend`] when redb refuses the file (missing, locked, corrupt).
    pub async fn open(self) -> Result<Index, IndexError> {
        let path = self.path.ok_or(IndexError::Validation {
            message: "Index path is required".into(),
            context: None,
        })?;

        if self.create {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .await
                    .context(format!("Creating index directory {}", parent.display()))?;
            }
        }

        let create = self.create;
        let file = path.clone();
        let db = tokio::task::spawn_blocking(move || -> Result<Database, IndexError> {
            let db = if create { Database::create(&file) } else { Database::open(&file) }
                .map_err(backend("Opening index file"))?;
            write_txn(&db, |_| Ok(()))?;
            Ok(db)
        })
        .await
        .context("Opening index")??;

        info!(path = %path.display(), "Metadata index ready");
        Ok(Index { inner: Arc::new(IndexInner { db, path }) })
    }
}
