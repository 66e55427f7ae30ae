//! # Domain Models
//!
//! Data types shared by every vanish crate. No I/O lives here: entries and
//! their expiry policy, the dual-format timestamp, the tenant context, the
//! response envelope and the configuration tree.

pub mod config;
pub mod context;
pub mod entry;
pub mod error;
pub mod expire;
pub mod response;
pub mod timestamp;

pub use context::ApiContext;
pub use entry::{Entry, EntryKind, FormBody, Payload, UploadBody};
pub use error::{DomainError, DomainErrorExt};
pub use expire::{Expire, Ttl};
pub use response::Response;
pub use timestamp::{TimeFormat, Timestamp};
