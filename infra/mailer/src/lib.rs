//! Outbound "send mail" capability.
//!
//! [`SmtpMailer`] talks to a relay through lettre. Without a `mail` config
//! section [`from_config`] hands out a [`LogMailer`] that only records the
//! attempt in the log. Callers treat delivery as fire-and-forget.

mod error;

pub use error::{MailError, MailErrorExt};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;
use vanish_domain::config::MailConfig;

/// A plain-text notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Mail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self { to: to.into(), subject: subject.into(), body: body.into() }
    }
}

#[async_trait]
pub trait SendMail: fmt::Debug + Send + Sync {
    /// # Errors
    /// Address, message or transport failures.
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

/// Shared mailer handle.
pub type Mailer = Arc<dyn SendMail>;

/// SMTP mailer, `STARTTLS` by default.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    relay: String,
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer").field("relay", &self.relay).field("from", &self.from).finish()
    }
}

impl SmtpMailer {
    /// Prepares the transport. No connection is made until the first send.
    ///
    /// # Errors
    /// [`MailError::Address`] for a malformed sender,
    /// [`MailError::Transport`] when the relay host is unusable.
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let from = config.from.parse::<Mailbox>().context("Parsing sender")?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .context(format!("Relay {}", config.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let builder = builder.port(config.port);
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        info!(host = %config.host, port = config.port, starttls = config.starttls, "SMTP mailer ready");
        Ok(Self { transport: builder.build(), from, relay: format!("{}:{}", config.host, config.port) })
    }
}

#[async_trait]
impl SendMail for SmtpMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        let to = mail.to.parse::<Mailbox>().context("Parsing recipient")?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)?;

        self.transport.send(message).await.context(format!("Relay {}", self.relay))?;
        info!(to = %mail.to, "Notification mail sent");
        Ok(())
    }
}

/// Stand-in used when no relay is configured: logs and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl SendMail for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, "Mail relay not configured, notification skipped");
        Ok(())
    }
}

/// Keeps every mail in memory. Handy for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<Mail>>>,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mails sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Mail> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl SendMail for MemoryMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner).push(mail);
        Ok(())
    }
}

/// SMTP when `config` is present, otherwise [`LogMailer`].
///
/// # Errors
/// See [`SmtpMailer::from_config`].
pub fn from_config(config: Option<&MailConfig>) -> Result<Mailer, MailError> {
    match config {
        Some(config) => Ok(Arc::new(SmtpMailer::from_config(config)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}
