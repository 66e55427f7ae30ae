//! Ephemeral uploads and upload forms.
//!
//! Every operation is scoped by an [`ApiContext`](vanish_domain::ApiContext).
//! Entries of another context behave exactly like missing ones.
//!
//! ```no_run
//! use vanish_content::{ContentStore, NewUpload, UploadFile};
//! use vanish_domain::ApiContext;
//! use vanish_index::Index;
//! use vanish_storage::Storage;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ContentStore::builder()
//!     .index(Index::builder().path("data/index.redb").open().await?)
//!     .storage(Storage::builder().root("data/uploads").connect().await?)
//!     .base_url("https://share.example.org")
//!     .build()?;
//!
//! let ctx = ApiContext::new("team-a")?;
//! let upload = NewUpload {
//!     files: vec![UploadFile::new("notes.txt", "hello")],
//!     expire: Some("1d".into()),
//!     ..NewUpload::default()
//! };
//! let entry = store.create_upload(&ctx, upload).await?;
//! println!("{}", entry.url.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

mod error;
pub mod lifecycle;
pub mod packager;
mod store;

pub use error::{ContentError, ContentErrorExt};
pub use lifecycle::{Lifecycle, SweepReport};
pub use packager::UploadFile;
pub use store::{ContentStore, ContentStoreBuilder, ContentStoreInner, Delivery, ModifyUpload, NewForm, NewUpload};
