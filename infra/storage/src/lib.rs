//! Sandboxed filesystem storage for vanish entries.
//!
//! The root holds one directory per entry id. Inside it live the original
//! member files and, for multi-file uploads, the generated archive.
//!
//! - **Sandbox**: entry ids and member names are validated, paths are
//!   canonicalized against the physical root.
//! - **Atomic writes**: unique temp file, `fsync`, `rename`, directory sync.
//! - **Best-effort removal**: removing an already-missing directory is not an error.
//! - **Hygiene**: stale temporary files from crashed writes are purged on
//!   connect and on demand.

mod builder;
mod engine;
mod entry;
mod error;
mod maintenance;
mod security;

pub use builder::StorageBuilder;
pub use engine::Storage;
pub use entry::EntryDir;
pub use error::{StorageError, StorageErrorExt};
pub use maintenance::EntryStat;
