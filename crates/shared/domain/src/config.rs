use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Whole service configuration.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfigInner {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub lifecycle: LifecycleConfig,
    pub validation: ValidationConfig,
    pub mail: Option<MailConfig>,
    pub log: LogConfig,
}

/// Arc-wrapped config, cheap to clone into every subsystem.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten, default)]
    inner: Arc<AppConfigInner>,
}

impl Deref for AppConfig {
    type Target = AppConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for AppConfig {
    fn deref_mut(&mut self) -> &mut AppConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// HTTP listener and public addressing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Public base URL used to build download and form links.
    pub url: String,
    /// Request header carrying the caller's API context.
    pub context_header: String,
    /// Context assumed when the header is missing. `None` rejects such requests.
    pub default_context: Option<String>,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
    pub ssl: Option<SslConfig>,
}

impl ServerConfig {
    /// `url` without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per entry.
    pub root: PathBuf,
    /// The redb index file.
    pub index: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Seconds between sweeps. `0` disables the sweeper.
    pub sweep_interval_secs: u64,
    /// Minimum age before an unindexed directory counts as an orphan.
    pub orphan_grace_secs: u64,
    /// Upper bound on concurrently running background tasks.
    pub max_background_tasks: usize,
}

/// Character classes that are NOT allowed in each kind of input.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub key: String,
    pub duration: String,
    pub email: String,
    pub query: String,
    pub text: String,
}

/// Outbound SMTP relay for form notifications.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Directory for rolling log files. Console only when unset.
    pub path: Option<PathBuf>,
    pub json: bool,
}

// --- Default ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            url: "http://localhost:8080".to_owned(),
            context_header: "x-api-context".to_owned(),
            default_context: None,
            body_limit: 100 * 1024 * 1024,
            ssl: None,
        }
    }
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { cert: PathBuf::from("cert.pem"), key: PathBuf::from("key.pem") }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("data/uploads"), index: PathBuf::from("data/index.redb") }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { sweep_interval_secs: 60, orphan_grace_secs: 3600, max_background_tasks: 64 }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            key: r"[^\w\-.:@]".to_owned(),
            duration: r"[^0-9dhmsap]".to_owned(),
            email: r"[^\w.+\-@]".to_owned(),
            query: r"[^\w\s.\-@]".to_owned(),
            text: r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F<>]".to_owned(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 587,
            from: "vanish@localhost".to_owned(),
            username: None,
            password: None,
            starttls: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), path: None, json: false }
    }
}
