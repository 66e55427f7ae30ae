//! Facade crate for Vanish.
//! Re-exports the domain, kernel and content crates and turns an
//! [`AppConfig`] into a running [`Platform`].
//! Keep this crate thin: it composes other crates, it does not implement business logic.
//!
//! ## Usage
//! ```no_run
//! use std::time::Duration;
//! use vanish::domain::config::AppConfig;
//!
//! # async fn run() -> Result<(), vanish::InitError> {
//! let platform = vanish::init(&AppConfig::default()).await?;
//! let store = platform.store().clone();
//! // hand `store` to the HTTP layer ...
//! platform.shutdown(Duration::from_secs(30)).await;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vanish_content::{ContentError, ContentStore};
use vanish_domain::config::AppConfig;
use vanish_index::{Index, IndexError};
use vanish_kernel::{Guard, GuardError};
use vanish_mailer::MailError;
use vanish_runtime::TaskPool;
use vanish_storage::{Storage, StorageError};

pub use vanish_content as content;
pub use vanish_domain as domain;
pub use vanish_kernel as kernel;

#[vanish_derive::vanish_error]
pub enum InitError {
    #[error("Invalid validation rules{}: {source}", format_context(.context))]
    Guard { source: GuardError, context: Option<Cow<'static, str>> },

    #[error("Storage initialization failed{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("Index initialization failed{}: {source}", format_context(.context))]
    Index { source: IndexError, context: Option<Cow<'static, str>> },

    #[error("Mailer initialization failed{}: {source}", format_context(.context))]
    Mail { source: MailError, context: Option<Cow<'static, str>> },

    #[error("Content store initialization failed{}: {source}", format_context(.context))]
    Content { source: ContentError, context: Option<Cow<'static, str>> },
}

/// The wired content store plus its periodic sweeper.
#[must_use = "call .shutdown().await to stop the sweeper and drain background work"]
#[derive(Debug)]
pub struct Platform {
    store: ContentStore,
    sweeper: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl Platform {
    #[must_use]
    pub const fn store(&self) -> &ContentStore {
        &self.store
    }

    #[must_use]
    pub const fn sweeper_running(&self) -> bool {
        self.sweeper.is_some()
    }

    /// Stops the sweeper and waits up to `grace` for detached work.
    /// Returns `false` when tasks were still running at the deadline.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.shutdown.send_replace(true);
        if let Some(sweeper) = self.sweeper
            && let Err(e) = sweeper.await
        {
            warn!(error = %e, "Sweeper task ended abnormally");
        }
        let drained = self.store.pool().drain_timeout(grace).await;
        info!(drained, "Platform stopped");
        drained
    }
}

/// Opens storage and index, builds the mailer and the content store, and
/// starts the sweeper unless `lifecycle.sweep_interval_secs` is `0`.
///
/// # Errors
/// Any subsystem failing to initialize.
pub async fn init(config: &AppConfig) -> Result<Platform, InitError> {
    let guard = Guard::new(&config.validation)?;
    let storage = Storage::builder()
        .root(&config.storage.root)
        .purge_on_connect(true)
        .connect()
        .await
        .context("Opening storage root")?;
    let index = Index::builder().path(&config.storage.index).open().await.context("Opening index")?;
    let mailer = vanish_mailer::from_config(config.mail.as_ref())?;

    let lifecycle = &config.lifecycle;
    let store = ContentStore::builder()
        .index(index)
        .storage(storage)
        .pool(TaskPool::new(lifecycle.max_background_tasks))
        .mailer(mailer)
        .guard(guard)
        .base_url(config.server.base_url())
        .orphan_grace(Duration::from_secs(lifecycle.orphan_grace_secs))
        .build()?;

    let (shutdown, signal) = watch::channel(false);
    let sweeper = (lifecycle.sweep_interval_secs > 0).then(|| {
        store.lifecycle().spawn_sweeper(Duration::from_secs(lifecycle.sweep_interval_secs), signal)
    });

    info!(
        root = %store.storage().root().display(),
        index = %store.index().path().display(),
        sweeper = sweeper.is_some(),
        "Platform initialized"
    );
    Ok(Platform { store, sweeper, shutdown })
}
