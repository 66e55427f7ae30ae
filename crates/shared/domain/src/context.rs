use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Resolved tenant identity. Never empty.
///
/// Single-entry operations require an exact match with the owning context,
/// listings treat a context string as a substring filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiContext(String);

impl ApiContext {
    /// # Errors
    /// [`DomainError::InvalidContext`] for blank input.
    pub fn new(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidContext {
                message: "API context must not be empty".into(),
                context: None,
            });
        }
        if trimmed.len() == raw.len() { Ok(Self(raw)) } else { Ok(Self(trimmed.to_owned())) }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact ownership test used by single-entry operations.
    #[must_use]
    pub fn owns(&self, owner: &str) -> bool {
        self.0 == owner
    }
}

impl Deref for ApiContext {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ApiContext {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ApiContext {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ApiContext {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiContext> for String {
    fn from(value: ApiContext) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_contexts_are_rejected() {
        assert!(ApiContext::new("").is_err());
        assert!(ApiContext::new("   ").is_err());
        assert!(serde_json::from_str::<ApiContext>(r#""""#).is_err());
    }

    #[test]
    fn ownership_is_exact() {
        let ctx = ApiContext::new(" teamA ").unwrap();
        assert_eq!(ctx.as_str(), "teamA");
        assert!(ctx.owns("teamA"));
        assert!(!ctx.owns("teamA/sub"));
        assert!(!ctx.owns("team"));
    }
}
