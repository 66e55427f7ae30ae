//! Turns uploaded files into the single artifact served to downloaders.
//!
//! Every member is written verbatim into the entry directory under a
//! normalized name. One member is its own artifact; several members are
//! additionally bundled into a deflate zip which becomes the artifact.

use crate::error::ContentError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fxhash::FxHashSet;
use std::io;
use std::path::PathBuf;
use tracing::debug;
use vanish_storage::{EntryDir, StorageError};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

/// Base name of the generated archive, after the creation stamp.
pub const ARCHIVE_NAME: &str = "data.zip";

/// Substitute for names that sanitize to nothing.
const FALLBACK_NAME: &str = "file";

/// One uploaded file, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Name as sent by the client. Never trusted.
    pub name: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { name: name.into(), data: data.into() }
    }
}

/// Outcome of [`package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packaged {
    pub members: Vec<String>,
    pub file: String,
}

/// Creation-time prefix of every stored name, minute resolution.
#[must_use]
pub fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H-%M-").to_string()
}

/// Keeps the last path segment and only `[A-Za-z0-9_.-]` of it, without
/// leading dots.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let kept: String =
        base.chars().filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')).collect();
    let kept = kept.trim_start_matches('.');
    if kept.is_empty() { FALLBACK_NAME.to_owned() } else { kept.to_owned() }
}

/// Stamped, sanitized and collision free names in input order.
///
/// Names listed in `reserved` are never produced. A clash gets `-N` before
/// the extension: `a.txt`, `a-1.txt`, `a-2.txt`.
#[must_use]
pub fn normalize_names<'a, I>(names: I, stamp: &str, reserved: &[&str]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken: FxHashSet<String> = reserved.iter().map(|r| (*r).to_owned()).collect();

    names
        .into_iter()
        .map(|raw| {
            let base = format!("{stamp}{}", sanitize(raw));
            let mut candidate = base.clone();
            let mut n = 1;
            while !taken.insert(candidate.clone()) {
                candidate = with_suffix(&base, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

fn with_suffix(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{n}.{ext}"),
        _ => format!("{name}-{n}"),
    }
}

/// Writes `files` into `dir` and produces the artifact.
///
/// The caller owns cleanup: on error the directory may hold a subset of the
/// members, never a finished artifact under a wrong name.
///
/// # Errors
/// * [`ContentError::Validation`] for an empty file set.
/// * [`ContentError::Storage`] when a member cannot be written.
/// * [`ContentError::Package`] when the archive cannot be built.
pub async fn package(
    dir: &EntryDir,
    files: Vec<UploadFile>,
    now: DateTime<Utc>,
) -> Result<Packaged, ContentError> {
    if files.is_empty() {
        return Err(ContentError::invalid("No files uploaded"));
    }

    let stamp = stamp(now);
    let archive = (files.len() > 1).then(|| format!("{stamp}{ARCHIVE_NAME}"));
    let reserved: Vec<&str> = archive.iter().map(String::as_str).collect();
    let members = normalize_names(files.iter().map(|f| f.name.as_str()), &stamp, &reserved);

    dir.create().await?;
    for (name, upload) in members.iter().zip(&files) {
        dir.write(name, &upload.data).await?;
        debug!(id = %dir.id(), member = %name, bytes = upload.data.len(), "Member stored");
    }

    let file = match archive {
        Some(archive) => {
            let bytes = build_archive(dir, &archive, &members).await?;
            debug!(id = %dir.id(), %archive, bytes, "Archive built");
            archive
        },
        None => members[0].clone(),
    };

    Ok(Packaged { members, file })
}

async fn build_archive(dir: &EntryDir, archive: &str, members: &[String]) -> Result<u64, ContentError> {
    let sources = members
        .iter()
        .map(|name| -> Result<(String, PathBuf), StorageError> {
            Ok((name.clone(), dir.member_path(name)?))
        })
        .collect::<Result<Vec<_>, _>>()?;

    dir.write_with(archive, move |out| {
        let mut zip = ZipWriter::new(out);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, path) in &sources {
            zip.start_file(name.as_str(), options).map_err(io::Error::other)?;
            let mut source = std::fs::File::open(path)?;
            io::copy(&mut source, &mut zip)?;
        }
        zip.finish().map_err(io::Error::other)?;
        Ok(())
    })
    .await
    .map_err(|err| ContentError::Package { message: err.to_string().into(), context: Some(archive.to_owned().into()) })
}
