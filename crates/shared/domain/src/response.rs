use crate::entry::{Entry, EntryKind};
use vanish_derive::api_model;

/// JSON envelope returned by every API endpoint.
#[api_model(deny_unknown_fields = false)]
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    pub success: bool,
    pub code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads: Option<Vec<Entry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forms: Option<Vec<Entry>>,
}

impl Response {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, code: 200, message: message.into(), uploads: None, forms: None }
    }

    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self { success: false, code, message: message.into(), uploads: None, forms: None }
    }

    /// Success envelope carrying `entries` under the key matching `kind`.
    #[must_use]
    pub fn entries(kind: EntryKind, entries: Vec<Entry>) -> Self {
        Self::ok(String::new()).with_entries(kind, entries)
    }

    #[must_use]
    pub fn with_entries(mut self, kind: EntryKind, entries: Vec<Entry>) -> Self {
        match kind {
            EntryKind::Upload => self.uploads = Some(entries),
            EntryKind::Form => self.forms = Some(entries),
        }
        self
    }
}
