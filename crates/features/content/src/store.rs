use crate::error::{ContentError, scoped};
use crate::lifecycle::{Lifecycle, is_expired};
use crate::packager::{self, UploadFile};
use chrono::Utc;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use vanish_derive::api_model;
use vanish_domain::{ApiContext, Entry, EntryKind, Expire, FormBody, UploadBody};
use vanish_index::Index;
use vanish_kernel::{Guard, Rule, ids};
use vanish_mailer::{LogMailer, Mail, Mailer};
use vanish_runtime::TaskPool;
use vanish_storage::Storage;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_ORPHAN_GRACE: Duration = Duration::from_secs(3600);

/// Input of [`ContentStore::create_upload`].
#[derive(Debug, Default)]
pub struct NewUpload {
    pub files: Vec<UploadFile>,
    /// `asap` or a duration, blank means `asap`.
    pub expire: Option<String>,
    pub description: Option<String>,
    /// Id of the form this upload answers.
    pub form: Option<String>,
}

/// Input of [`ContentStore::create_form`].
#[api_model]
#[derive(Clone, Default)]
pub struct NewForm {
    #[serde(default)]
    pub expire: Option<String>,
    /// Address told when the form gets used.
    #[serde(default)]
    pub notify: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Changes applied by [`ContentStore::modify`]. Blank fields are left alone.
#[api_model]
#[derive(Clone, Default)]
pub struct ModifyUpload {
    #[serde(default)]
    pub expire: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// An artifact ready to be streamed.
#[derive(Debug)]
pub struct Delivery {
    pub entry: Entry,
    pub path: PathBuf,
    pub file: tokio::fs::File,
    pub len: u64,
}

impl Delivery {
    /// Name the artifact is offered under.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.entry.file().unwrap_or_default()
    }
}

/// Inner state of the [`ContentStore`].
#[derive(Debug)]
pub struct ContentStoreInner {
    index: Index,
    storage: Storage,
    lifecycle: Lifecycle,
    pool: TaskPool,
    mailer: Mailer,
    guard: Guard,
    base_url: String,
}

/// Tenant-scoped create, fetch, describe, list, modify and delete.
///
/// Creation returns as soon as the files are packaged. The index insert,
/// purges after delivery and form side effects run detached on the task
/// pool and only report through the log.
#[derive(Debug, Clone)]
pub struct ContentStore {
    inner: Arc<ContentStoreInner>,
}

impl Deref for ContentStore {
    type Target = ContentStoreInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl ContentStore {
    pub fn builder() -> ContentStoreBuilder {
        ContentStoreBuilder::default()
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.inner.index
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    #[must_use]
    pub fn pool(&self) -> &TaskPool {
        &self.inner.pool
    }

    /// Public link: `<base>/download/<id>/<file>` or `<base>/form/<id>`.
    /// The form link answers with the form as JSON; rendering a page for it
    /// is left to whatever fronts the service.
    #[must_use]
    pub fn url_for(&self, entry: &Entry) -> String {
        match entry.file() {
            Some(file) => format!("{}/download/{}/{file}", self.base_url, entry.id),
            None => format!("{}/form/{}", self.base_url, entry.id),
        }
    }

    /// Waits for every detached task submitted so far.
    pub async fn drain(&self) {
        self.pool.drain().await;
    }

    /// Stores `req.files` under a fresh id and returns the entry with its URL.
    ///
    /// # Errors
    /// Validation failures, or storage and packaging failures. The partial
    /// directory is removed before the error is returned.
    #[instrument(skip_all, fields(context = %ctx, files = req.files.len()))]
    pub async fn create_upload(&self, ctx: &ApiContext, req: NewUpload) -> Result<Entry, ContentError> {
        self.check_context(ctx)?;
        let expire = self.parse_expire(req.expire.as_deref())?;
        let description = self.guard.untaint_opt(Rule::Text, req.description.as_deref())?;
        let form = self.guard.untaint_opt(Rule::Key, req.form.as_deref())?;
        if req.files.is_empty() {
            return Err(ContentError::invalid("No files uploaded"));
        }

        let id = ids::new_id();
        let dir = self.storage.entry(&id)?;
        let packaged = match packager::package(&dir, req.files, Utc::now()).await {
            Ok(packaged) => packaged,
            Err(err) => {
                if let Err(cleanup) = dir.remove().await {
                    warn!(%id, error = %cleanup, "Partial upload cleanup failed");
                }
                return Err(err);
            },
        };

        let entry = Entry::upload(
            id,
            ctx.clone(),
            expire,
            UploadBody { members: packaged.members, file: packaged.file, description },
        );
        let url = self.url_for(&entry);
        self.index_detached(entry.clone());

        if let Some(form) = form {
            let this = self.clone();
            let (ctx, url) = (ctx.clone(), url.clone());
            self.pool.spawn("form-used", async move { this.form_used(&ctx, &form, &url).await });
        }

        info!(id = %entry.id, file = entry.file().unwrap_or_default(), expire = %entry.expire, "Upload stored");
        Ok(entry.with_url(url))
    }

    /// Registers an upload form and returns it with its URL.
    ///
    /// # Errors
    /// Validation failures.
    #[instrument(skip_all, fields(context = %ctx))]
    pub async fn create_form(&self, ctx: &ApiContext, req: NewForm) -> Result<Entry, ContentError> {
        self.check_context(ctx)?;
        let expire = self.parse_expire(req.expire.as_deref())?;
        let notify = self.guard.untaint_opt(Rule::Email, req.notify.as_deref())?;
        let description = self.guard.untaint_opt(Rule::Text, req.description.as_deref())?;

        let entry = Entry::form(ids::new_id(), ctx.clone(), expire, FormBody { notify, description });
        let url = self.url_for(&entry);
        self.index_detached(entry.clone());

        info!(id = %entry.id, expire = %entry.expire, "Form created");
        Ok(entry.with_url(url))
    }

    /// Opens the artifact of upload `id` for its recipient.
    ///
    /// TTL-expired entries are purged before answering. A record whose
    /// artifact is gone is purged in the background. `asap` entries are
    /// purged in the background once the file is open; the open handle keeps
    /// the content readable.
    ///
    /// # Errors
    /// [`ContentError::NotFound`] for every reason the artifact cannot be served.
    #[instrument(skip(self, ctx), fields(context = %ctx))]
    pub async fn fetch(&self, ctx: &ApiContext, id: &str) -> Result<Delivery, ContentError> {
        self.open(ctx, id, true).await
    }

    /// Like [`ContentStore::fetch`], but an `asap` entry stays in place.
    ///
    /// # Errors
    /// [`ContentError::NotFound`] for every reason the artifact cannot be served.
    #[instrument(skip(self, ctx), fields(context = %ctx))]
    pub async fn peek(&self, ctx: &ApiContext, id: &str) -> Result<Delivery, ContentError> {
        self.open(ctx, id, false).await
    }

    async fn open(&self, ctx: &ApiContext, id: &str, consume: bool) -> Result<Delivery, ContentError> {
        self.check_id(id)?;
        let entry = self.index.lookup(ctx, id, EntryKind::Upload).await.map_err(scoped(EntryKind::Upload))?;

        if is_expired(&entry, Utc::now()) {
            self.lifecycle.purge(ctx, id).await;
            return Err(ContentError::not_found(EntryKind::Upload));
        }

        let file_name = entry.file().unwrap_or_default().to_owned();
        let dir = self.storage.entry(id)?;
        let (file, len) = match dir.open(&file_name).await {
            Ok(opened) => opened,
            Err(err) if err.is_not_found() => {
                warn!(%id, file = %file_name, "Artifact missing, dropping record");
                self.lifecycle.schedule_purge(ctx.clone(), id.to_owned());
                return Err(ContentError::not_found(EntryKind::Upload));
            },
            Err(err) => return Err(err.into()),
        };
        let path = dir.member_path(&file_name)?;

        if consume && entry.expire.is_asap() {
            debug!("Delivered once, scheduling purge");
            self.lifecycle.schedule_purge(ctx.clone(), id.to_owned());
        }

        let entry = self.with_url(entry);
        Ok(Delivery { entry, path, file, len })
    }

    /// The entry `id` of `kind`, with its URL.
    ///
    /// # Errors
    /// [`ContentError::NotFound`] when absent, foreign or past its TTL.
    pub async fn describe(&self, ctx: &ApiContext, id: &str, kind: EntryKind) -> Result<Entry, ContentError> {
        self.live(ctx, id, kind).await.map(|entry| self.with_url(entry))
    }

    /// Entries of `kind` whose context contains `filter` (empty matches all)
    /// and whose description or file contains `query`. Expired entries are
    /// left out and purged in the background.
    ///
    /// # Errors
    /// Validation or index failures.
    pub async fn list(
        &self,
        ctx: &ApiContext,
        filter: &str,
        query: Option<&str>,
        kind: EntryKind,
    ) -> Result<Vec<Entry>, ContentError> {
        self.check_context(ctx)?;
        let filter = self.guard.untaint(Rule::Key, filter.trim())?;
        let query = self.guard.untaint_opt(Rule::Query, query)?;

        let now = Utc::now();
        let (expired, live): (Vec<Entry>, Vec<Entry>) = self
            .index
            .list(ctx, filter, kind, query.as_deref())
            .await?
            .into_iter()
            .partition(|entry| is_expired(entry, now));

        for entry in expired {
            self.lifecycle.schedule_purge(entry.context, entry.id);
        }
        Ok(live.into_iter().map(|entry| self.with_url(entry)).collect())
    }

    /// Updates expire and description of upload `id`. The index write is
    /// awaited.
    ///
    /// # Errors
    /// Validation failures, [`ContentError::NotFound`] or index failures.
    #[instrument(skip(self, ctx, req), fields(context = %ctx))]
    pub async fn modify(&self, ctx: &ApiContext, id: &str, req: ModifyUpload) -> Result<Entry, ContentError> {
        let expire = match req.expire.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(self.parse_expire(Some(raw))?),
            None => None,
        };
        let description = self.guard.untaint_opt(Rule::Text, req.description.as_deref())?;

        let mut entry = self.live(ctx, id, EntryKind::Upload).await?;
        if let Some(expire) = expire {
            entry.expire = expire;
        }
        if description.is_some() {
            entry.set_description(description);
        }
        entry.url = None;

        self.index.insert(&entry).await?;
        info!(expire = %entry.expire, "Upload modified");
        Ok(self.with_url(entry))
    }

    /// Removes record and directory of `id`. A second call is `NotFound`.
    ///
    /// # Errors
    /// [`ContentError::NotFound`] or index failures.
    #[instrument(skip(self, ctx), fields(context = %ctx))]
    pub async fn delete(&self, ctx: &ApiContext, id: &str, kind: EntryKind) -> Result<(), ContentError> {
        self.check_id(id)?;
        self.index.get(ctx, id, kind).await.map_err(scoped(kind))?;
        self.index.delete(ctx, id).await.map_err(scoped(kind))?;
        self.lifecycle.remove_dir(id).await;
        info!(%kind, "Entry deleted");
        Ok(())
    }

    async fn live(&self, ctx: &ApiContext, id: &str, kind: EntryKind) -> Result<Entry, ContentError> {
        self.check_id(id)?;
        let entry = self.index.get(ctx, id, kind).await.map_err(scoped(kind))?;
        if is_expired(&entry, Utc::now()) {
            self.lifecycle.purge(ctx, id).await;
            return Err(ContentError::not_found(kind));
        }
        Ok(entry)
    }

    async fn form_used(&self, ctx: &ApiContext, form_id: &str, url: &str) -> Result<(), ContentError> {
        let form = self.live(ctx, form_id, EntryKind::Form).await?;

        if form.expire.is_asap() {
            self.lifecycle.purge(ctx, form_id).await;
        }

        if let Some(notify) = form.as_form().and_then(|body| body.notify.clone()) {
            let mail = Mail::new(
                notify,
                format!("Upload form {form_id} has been used"),
                format!("Upload is available under: {url}"),
            );
            self.mailer.send(mail).await?;
        }
        Ok(())
    }

    fn index_detached(&self, entry: Entry) {
        let index = self.index.clone();
        self.pool.spawn("index-insert", async move { index.insert(&entry).await });
    }

    fn with_url(&self, entry: Entry) -> Entry {
        let url = self.url_for(&entry);
        entry.with_url(url)
    }

    fn parse_expire(&self, raw: Option<&str>) -> Result<Expire, ContentError> {
        match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => Ok(Expire::Asap),
            Some(raw) => {
                self.guard.untaint(Rule::Duration, raw)?;
                Ok(Expire::parse(raw)?)
            },
        }
    }

    fn check_id(&self, id: &str) -> Result<(), ContentError> {
        if id.trim().is_empty() {
            return Err(ContentError::invalid("No id specified"));
        }
        self.guard.untaint(Rule::Key, id)?;
        Ok(())
    }

    fn check_context(&self, ctx: &ApiContext) -> Result<(), ContentError> {
        self.guard.untaint(Rule::Key, ctx)?;
        Ok(())
    }
}

/// Fluent builder for a [`ContentStore`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ContentStoreBuilder {
    index: Option<Index>,
    storage: Option<Storage>,
    pool: Option<TaskPool>,
    mailer: Option<Mailer>,
    guard: Option<Guard>,
    base_url: Option<String>,
    orphan_grace: Option<Duration>,
}

impl ContentStoreBuilder {
    pub fn index(mut self, index: Index) -> Self {
        self.index = Some(index);
        self
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Executor for detached work. Defaults to 64 concurrent tasks.
    pub fn pool(mut self, pool: TaskPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Defaults to a log-only mailer.
    pub fn mailer(mut self, mailer: Mailer) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Public base URL, trailing slashes are dropped.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Minimum age of an unindexed directory before the sweeper removes it.
    pub const fn orphan_grace(mut self, grace: Duration) -> Self {
        self.orphan_grace = Some(grace);
        self
    }

    /// # Errors
    /// [`ContentError::Validation`] when the index or the storage is missing.
    pub fn build(self) -> Result<ContentStore, ContentError> {
        let index = self.index.ok_or_else(|| ContentError::invalid("An index is required"))?;
        let storage = self.storage.ok_or_else(|| ContentError::invalid("A storage root is required"))?;
        let pool = self.pool.unwrap_or_default();
        let lifecycle = Lifecycle::new(
            index.clone(),
            storage.clone(),
            pool.clone(),
            self.orphan_grace.unwrap_or(DEFAULT_ORPHAN_GRACE),
        );
        let base_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_owned();

        Ok(ContentStore {
            inner: Arc::new(ContentStoreInner {
                index,
                storage,
                lifecycle,
                pool,
                mailer: self.mailer.unwrap_or_else(|| Arc::new(LogMailer)),
                guard: self.guard.unwrap_or_default(),
                base_url,
            }),
        })
    }
}
