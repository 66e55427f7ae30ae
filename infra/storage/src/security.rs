use crate::error::StorageError;
use crate::maintenance::TMP_MARKER;
use std::path::{Component, Path, PathBuf};

fn traversal(path: &Path, reason: &'static str) -> StorageError {
    StorageError::PathTraversalAttempt {
        message: path.display().to_string().into(),
        context: Some(reason.into()),
    }
}

/// Collapses `.` and `..` lexically, refusing anything that climbs above the base.
fn normalize_relative(path: &Path) -> Result<PathBuf, StorageError> {
    let mut out = PathBuf::new();

    for c in path.components() {
        match c {
            Component::CurDir => {},
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(traversal(path, "Path attempted to escape sandbox via '..'"));
                }
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(traversal(path, "Absolute paths are not allowed in sandbox"));
            },
        }
    }

    Ok(out)
}

/// Entry ids become directory names: ASCII alphanumerics, `-` and `_` only.
pub(crate) fn check_entry_id(id: &str) -> Result<(), StorageError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidEntryId {
            message: id.to_owned().into(),
            context: Some("Entry ids must be non-empty [A-Za-z0-9_-]".into()),
        })
    }
}

/// A member name must be exactly one plain path segment and never look like
/// an in-flight temporary file.
pub(crate) fn check_member_name(name: &str) -> Result<(), StorageError> {
    let path = Path::new(name);
    let mut components = path.components();
    let single = matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));

    if !single || name.contains(['/', '\\']) {
        return Err(traversal(path, "Member names must be a single path segment"));
    }
    if name.contains(TMP_MARKER) {
        return Err(traversal(path, "Member names cannot use the temporary marker"));
    }
    Ok(())
}

/// Joins `path` to `root` and proves the result stays inside the sandbox.
pub(crate) fn resolve_path(root: &Path, path: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Err(traversal(path, "Absolute paths are not allowed in sandbox"));
    }

    let joined = root.join(normalize_relative(path)?);

    match joined.canonicalize() {
        Ok(canonical) if canonical.starts_with(root) => Ok(canonical),
        Ok(canonical) => Err(traversal(&canonical, "Path resolves outside the sandbox")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => validate_ancestors(root, &joined),
        Err(e) => Err(StorageError::Io { source: e, context: None }),
    }
}

/// For a path that does not exist yet, canonicalizes the nearest existing
/// ancestor so a symlinked parent cannot point outside the root.
fn validate_ancestors(root: &Path, joined: &Path) -> Result<PathBuf, StorageError> {
    if !joined.starts_with(root) {
        return Err(traversal(joined, "Path is outside sandbox boundaries"));
    }

    for ancestor in joined.ancestors() {
        if ancestor == root {
            return Ok(joined.to_path_buf());
        }
        if !ancestor.exists() {
            continue;
        }
        return match ancestor.canonicalize() {
            Ok(canonical) if canonical.starts_with(root) => Ok(joined.to_path_buf()),
            Ok(canonical) => {
                Err(traversal(&canonical, "Existing parent directory is a symlink outside sandbox"))
            },
            Err(e) => Err(StorageError::Io {
                source: e,
                context: Some("Failed to verify parent directory".into()),
            }),
        };
    }

    Err(traversal(joined, "No valid parent directory found within sandbox"))
}
