use std::borrow::Cow;
use vanish_domain::{DomainError, EntryKind};
use vanish_index::IndexError;
use vanish_kernel::GuardError;
use vanish_mailer::MailError;
use vanish_storage::StorageError;

/// Failures surfaced by the content store.
///
/// `NotFound` deliberately hides whether the id is unknown, owned by
/// another tenant or lost its artifact.
#[vanish_derive::vanish_error]
pub enum ContentError {
    #[error("{message}{}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("{message}{}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Metadata index failure{}: {source}", format_context(.context))]
    Index { source: IndexError, context: Option<Cow<'static, str>> },

    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("Packaging failed{}: {message}", format_context(.context))]
    Package { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Notification failed{}: {source}", format_context(.context))]
    Mail { source: MailError, context: Option<Cow<'static, str>> },
}

impl ContentError {
    pub(crate) fn not_found(kind: EntryKind) -> Self {
        Self::NotFound {
            message: format!("No {kind} with that id could be found!").into(),
            context: None,
        }
    }

    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation { message: message.into(), context: None }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<GuardError> for ContentError {
    fn from(err: GuardError) -> Self {
        Self::invalid(err.to_string())
    }
}

impl From<DomainError> for ContentError {
    fn from(err: DomainError) -> Self {
        Self::invalid(err.to_string())
    }
}

/// Maps index misses onto the generic not-found answer for `kind`.
pub(crate) fn scoped(kind: EntryKind) -> impl FnOnce(IndexError) -> ContentError {
    move |err| {
        if err.is_not_found() { ContentError::not_found(kind) } else { ContentError::from(err) }
    }
}
