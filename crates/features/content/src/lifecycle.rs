//! Expiration enforcement and storage hygiene.
//!
//! Deletion is best-effort in both directions: the index record and the
//! entry directory are removed independently, failures are logged and
//! never escalated. Lazy enforcement happens on every read path; the
//! sweeper reclaims what nobody reads again.

use crate::error::ContentError;
use chrono::{DateTime, Utc};
use fxhash::FxHashSet;
use std::convert::Infallible;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use vanish_domain::{ApiContext, Entry};
use vanish_index::Index;
use vanish_runtime::TaskPool;
use vanish_storage::Storage;

/// Whether `entry` has a TTL policy that ran out at `now`.
#[must_use]
pub fn is_expired(entry: &Entry, now: DateTime<Utc>) -> bool {
    entry.is_expired_at(now)
}

/// What one [`Lifecycle::sweep`] pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries past their TTL.
    pub expired: usize,
    /// Upload records whose artifact was gone.
    pub dangling: usize,
    /// Directories without a record, older than the grace period.
    pub orphans: usize,
    /// Stale temporary files from interrupted writes.
    pub temp_files: usize,
}

impl SweepReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.expired == 0 && self.dangling == 0 && self.orphans == 0 && self.temp_files == 0
    }
}

/// Coordinates record and directory removal.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    index: Index,
    storage: Storage,
    pool: TaskPool,
    orphan_grace: Duration,
}

impl Lifecycle {
    #[must_use]
    pub const fn new(index: Index, storage: Storage, pool: TaskPool, orphan_grace: Duration) -> Self {
        Self { index, storage, pool, orphan_grace }
    }

    /// Removes the directory and the record of `id` concurrently. Returns
    /// `true` when either existed. An already absent entry is not an error.
    pub async fn purge(&self, ctx: &ApiContext, id: &str) -> bool {
        let (files, record) = tokio::join!(self.remove_dir(id), self.remove_record(ctx, id));
        if files || record {
            info!(%id, context = %ctx, files, record, "Entry purged");
        }
        files || record
    }

    /// [`Lifecycle::purge`] on the task pool. The caller does not wait.
    pub fn schedule_purge(&self, ctx: ApiContext, id: String) {
        let this = self.clone();
        self.pool.spawn("purge", async move {
            this.purge(&ctx, &id).await;
            Ok::<(), Infallible>(())
        });
    }

    pub(crate) async fn remove_dir(&self, id: &str) -> bool {
        let dir = match self.storage.entry(id) {
            Ok(dir) => dir,
            Err(err) => {
                warn!(%id, error = %err, "Refusing to remove entry directory");
                return false;
            },
        };
        match dir.remove().await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(%id, error = %err, "Entry directory removal failed");
                false
            },
        }
    }

    async fn remove_record(&self, ctx: &ApiContext, id: &str) -> bool {
        match self.index.delete(ctx, id).await {
            Ok(_) => true,
            Err(err) if err.is_not_found() => false,
            Err(err) => {
                warn!(%id, error = %err, "Index record removal failed");
                false
            },
        }
    }

    /// One hygiene pass over index and storage.
    ///
    /// 1. Entries of either kind past their TTL are purged.
    /// 2. Upload records whose artifact is missing are purged.
    /// 3. Directories without a record and older than the grace period are
    ///    removed. Younger ones may belong to an upload whose detached index
    ///    insert has not landed yet.
    /// 4. Stale temporary files are removed.
    ///
    /// # Errors
    /// Index or storage scans failing. Individual removals only log.
    pub async fn sweep(&self) -> Result<SweepReport, ContentError> {
        let now = Utc::now();
        let mut report = SweepReport::default();
        let entries = self.index.all().await?;
        let known: FxHashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();

        for entry in &entries {
            if is_expired(entry, now) {
                if self.purge(&entry.context, &entry.id).await {
                    report.expired += 1;
                }
            } else if let Some(file) = entry.file()
                && self.artifact_missing(&entry.id, file).await
            {
                self.purge(&entry.context, &entry.id).await;
                report.dangling += 1;
            }
        }

        let wall = SystemTime::now();
        for stat in self.storage.entry_dirs().await? {
            if known.contains(stat.id.as_str()) || stat.age(wall) < self.orphan_grace {
                continue;
            }
            if self.remove_dir(&stat.id).await {
                debug!(id = %stat.id, "Orphaned directory removed");
                report.orphans += 1;
            }
        }

        report.temp_files = self.storage.purge_tmp().await;
        Ok(report)
    }

    async fn artifact_missing(&self, id: &str, file: &str) -> bool {
        let probe = match self.storage.entry(id) {
            Ok(dir) => dir.exists(file).await,
            Err(err) => Err(err),
        };
        match probe {
            Ok(present) => !present,
            Err(err) => {
                warn!(%id, error = %err, "Artifact probe failed");
                false
            },
        }
    }

    /// Runs [`Lifecycle::sweep`] every `every` until `shutdown` turns `true`
    /// or its sender is dropped. The first pass starts immediately.
    pub fn spawn_sweeper(&self, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?every, "Sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => match this.sweep().await {
                        Ok(report) if report.is_empty() => debug!("Sweep found nothing to remove"),
                        Ok(report) => info!(
                            expired = report.expired,
                            dangling = report.dangling,
                            orphans = report.orphans,
                            temp_files = report.temp_files,
                            "Sweep finished"
                        ),
                        Err(err) => warn!(error = %err, "Sweep failed"),
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    },
                }
            }
            info!("Sweeper stopped");
        })
    }
}
