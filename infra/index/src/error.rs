use std::borrow::Cow;

/// Failures of the metadata index.
#[vanish_derive::vanish_error]
pub enum IndexError {
    #[error("Validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Unknown id, foreign context or wrong kind. The three are indistinguishable.
    #[error("Entry not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Index backend error{}: {source}", format_context(.context))]
    Backend {
        #[source]
        source: redb::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Entry serialization failed{}: {source}", format_context(.context))]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Index I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Blocking index task failed{}: {source}", format_context(.context))]
    Join { source: tokio::task::JoinError, context: Option<Cow<'static, str>> },
}

impl IndexError {
    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { message: id.to_owned().into(), context: None }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
