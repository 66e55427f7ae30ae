use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Infix of every in-flight temporary file.
pub(crate) const TMP_MARKER: &str = ".vanishtmp.";

/// Temporary files younger than this may still belong to a running write.
pub(crate) const TMP_STALE_AFTER: Duration = Duration::from_secs(300);

/// A top-level directory under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    pub id: String,
    pub modified: SystemTime,
}

impl EntryStat {
    /// Time since the directory was last modified, zero if the clock went backwards.
    #[must_use]
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }
}

/// Removes stale temporary files anywhere under `root`. Returns how many
/// files were removed.
pub(crate) async fn purge_tmp(root: &Path) -> usize {
    let root = root.to_path_buf();
    let now = SystemTime::now();

    match tokio::task::spawn_blocking(move || remove_stale(&root, now, TMP_STALE_AFTER)).await {
        Ok((removed, failed)) => {
            if removed > 0 || failed > 0 {
                info!(removed, failed, "Cleaned up temporary files");
            }
            removed
        },
        Err(e) => {
            error!(error = %e, "Temp file cleanup task panicked");
            0
        },
    }
}

pub(crate) fn list_entry_dirs(root: &Path) -> Vec<EntryStat> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable storage entry");
                None
            },
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            let id = entry.file_name().to_str()?.to_owned();
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some(EntryStat { id, modified })
        })
        .collect()
}

fn remove_stale(root: &Path, now: SystemTime, threshold: Duration) -> (usize, usize) {
    let stale: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .flatten()
        .filter(|entry| is_tmp(entry) && is_stale(entry, now, threshold))
        .map(DirEntry::into_path)
        .collect();

    let mut removed = 0;
    let mut failed = 0;
    for path in stale {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
                failed += 1;
            },
        }
    }

    (removed, failed)
}

fn is_tmp(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry.file_name().to_str().is_some_and(|name| name.contains(TMP_MARKER))
}

fn is_stale(entry: &DirEntry, now: SystemTime, threshold: Duration) -> bool {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|modified| now.duration_since(modified).ok())
        .is_none_or(|age| age > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_temp_files_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("entry");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join(format!("data.zip{TMP_MARKER}1")), b"partial").unwrap();
        std::fs::write(dir.join("member.txt"), b"kept").unwrap();

        let (removed, failed) = remove_stale(tmp.path(), SystemTime::now(), TMP_STALE_AFTER);
        assert_eq!((removed, failed), (0, 0));

        let later = SystemTime::now() + Duration::from_secs(600);
        let (removed, _) = remove_stale(tmp.path(), later, TMP_STALE_AFTER);
        assert_eq!(removed, 1);
        assert!(dir.join("member.txt").exists());
    }

    #[test]
    fn lists_only_top_level_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("b/nested")).unwrap();
        std::fs::create_dir(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("stray.txt"), b"x").unwrap();

        let ids: Vec<String> = list_entry_dirs(tmp.path()).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a".to_owned(), "b".to_owned()]);
    }
}
