use crate::context::ApiContext;
use crate::expire::Expire;
use crate::timestamp::Timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of [`Payload`], used to scope index queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Upload,
    Form,
}

impl EntryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Form => "form",
        }
    }

    /// Capitalized name for user-facing messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::Form => "Form",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBody {
    /// Normalized names of the stored files, in upload order.
    pub members: Vec<String>,
    /// The artifact served to downloaders: the sole member or the archive.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormBody {
    /// Address told when an upload is made through this form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Kind-specific part of an [`Entry`], tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Upload(UploadBody),
    Form(FormBody),
}

/// The record kept in the index for every upload and form.
///
/// `url` is derived from the public base URL when an entry leaves the
/// service and is never read back as authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub context: ApiContext,
    pub created: Timestamp,
    #[serde(default)]
    pub expire: Expire,
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Entry {
    #[must_use]
    pub fn upload(id: impl Into<String>, context: ApiContext, expire: Expire, body: UploadBody) -> Self {
        Self::with_payload(id.into(), context, expire, Payload::Upload(body))
    }

    #[must_use]
    pub fn form(id: impl Into<String>, context: ApiContext, expire: Expire, body: FormBody) -> Self {
        Self::with_payload(id.into(), context, expire, Payload::Form(body))
    }

    fn with_payload(id: String, context: ApiContext, expire: Expire, payload: Payload) -> Self {
        Self { id, context, created: Timestamp::now(), expire, payload, url: None }
    }

    #[must_use]
    pub const fn kind(&self) -> EntryKind {
        match self.payload {
            Payload::Upload(_) => EntryKind::Upload,
            Payload::Form(_) => EntryKind::Form,
        }
    }

    #[must_use]
    pub const fn as_upload(&self) -> Option<&UploadBody> {
        match &self.payload {
            Payload::Upload(body) => Some(body),
            Payload::Form(_) => None,
        }
    }

    #[must_use]
    pub const fn as_form(&self) -> Option<&FormBody> {
        match &self.payload {
            Payload::Form(body) => Some(body),
            Payload::Upload(_) => None,
        }
    }

    /// The served artifact name. Forms have none.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.as_upload().map(|body| body.file.as_str())
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match &self.payload {
            Payload::Upload(body) => body.description.as_deref(),
            Payload::Form(body) => body.description.as_deref(),
        }
    }

    pub fn set_description(&mut self, description: Option<String>) {
        match &mut self.payload {
            Payload::Upload(body) => body.description = description,
            Payload::Form(body) => body.description = description,
        }
    }

    /// Substring match against the description and the artifact name.
    /// An empty query matches everything.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        query.is_empty()
            || self.description().is_some_and(|d| d.contains(query))
            || self.file().is_some_and(|f| f.contains(query))
    }

    /// Whether a TTL policy has run out at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire.has_elapsed(&self.created, now)
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_upload() -> Entry {
        Entry::upload(
            "0b6f4a5e-4a52-4bd5-9df1-7a4e58a1c6d2",
            ApiContext::new("teamA").unwrap(),
            Expire::parse("1h").unwrap(),
            UploadBody {
                members: vec!["2024-01-01-10-00-a.txt".into(), "2024-01-01-10-00-b.txt".into()],
                file: "2024-01-01-10-00-data.zip".into(),
                description: Some("quarterly report".into()),
            },
        )
    }

    #[test]
    fn upload_serializes_with_type_tag() {
        let entry = sample_upload();
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "upload");
        assert_eq!(value["context"], "teamA");
        assert_eq!(value["expire"], "1h");
        assert_eq!(value["file"], "2024-01-01-10-00-data.zip");
        assert!(value.get("url").is_none());

        let back: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn form_record_decodes_with_defaults() {
        let entry: Entry = serde_json::from_value(json!({
            "id": "f1",
            "context": "teamB",
            "created": "2024-05-01T08:00:00Z",
            "type": "form",
            "notify": "x@y.z"
        }))
        .unwrap();

        assert_eq!(entry.kind(), EntryKind::Form);
        assert_eq!(entry.expire, Expire::Asap);
        assert_eq!(entry.as_form().and_then(|f| f.notify.as_deref()), Some("x@y.z"));
        assert!(entry.file().is_none());

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["created"], "2024-05-01T08:00:00Z");
    }

    #[test]
    fn blank_context_is_rejected_on_decode() {
        let result = serde_json::from_value::<Entry>(json!({
            "id": "f1",
            "context": "",
            "created": 0,
            "type": "form"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn query_matches_description_or_file() {
        let entry = sample_upload();
        assert!(entry.matches_query(""));
        assert!(entry.matches_query("quarterly"));
        assert!(entry.matches_query("data.zip"));
        assert!(!entry.matches_query("invoice"));
    }

    #[test]
    fn ttl_expiry_uses_creation_time() {
        let mut entry = sample_upload();
        let created = entry.created.time();
        assert!(!entry.is_expired_at(created));
        assert!(entry.is_expired_at(created + chrono::TimeDelta::hours(1)));

        entry.expire = Expire::Asap;
        assert!(!entry.is_expired_at(created + chrono::TimeDelta::days(365)));
    }
}
