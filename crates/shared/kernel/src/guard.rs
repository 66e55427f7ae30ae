//! Pattern-based input validation.
//!
//! Every rule is a regular expression describing characters that must NOT
//! appear. Input passing a rule is returned untouched.

use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use vanish_domain::config::ValidationConfig;

#[vanish_derive::vanish_error]
pub enum GuardError {
    #[error("Invalid {message}{}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid validation pattern{}: {source}", format_context(.context))]
    Pattern { source: regex::Error, context: Option<Cow<'static, str>> },
}

/// Kind of untrusted input being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Ids, API contexts and list filters.
    Key,
    /// Expire values.
    Duration,
    Email,
    /// List search terms.
    Query,
    /// Free-text descriptions.
    Text,
}

impl Rule {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Duration => "duration",
            Self::Email => "email",
            Self::Query => "query",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled validation rules.
#[derive(Debug, Clone)]
pub struct Guard {
    key: Regex,
    duration: Regex,
    email: Regex,
    query: Regex,
    text: Regex,
}

impl Guard {
    /// Compiles every pattern of `config`.
    ///
    /// # Errors
    /// [`GuardError::Pattern`] naming the rule whose pattern does not compile.
    pub fn new(config: &ValidationConfig) -> Result<Self, GuardError> {
        let compile = |rule: Rule, pattern: &str| Regex::new(pattern).context(format!("rule '{rule}'"));

        Ok(Self {
            key: compile(Rule::Key, &config.key)?,
            duration: compile(Rule::Duration, &config.duration)?,
            email: compile(Rule::Email, &config.email)?,
            query: compile(Rule::Query, &config.query)?,
            text: compile(Rule::Text, &config.text)?,
        })
    }

    const fn pattern(&self, rule: Rule) -> &Regex {
        match rule {
            Rule::Key => &self.key,
            Rule::Duration => &self.duration,
            Rule::Email => &self.email,
            Rule::Query => &self.query,
            Rule::Text => &self.text,
        }
    }

    /// Returns `input` when no disallowed character occurs in it.
    ///
    /// # Errors
    /// [`GuardError::Validation`] naming the rule and the first offending character.
    pub fn untaint<'a>(&self, rule: Rule, input: &'a str) -> Result<&'a str, GuardError> {
        match self.pattern(rule).find(input) {
            None => Ok(input),
            Some(hit) => Err(GuardError::Validation {
                message: format!("{rule}: disallowed character {:?}", hit.as_str()).into(),
                context: None,
            }),
        }
    }

    /// [`Guard::untaint`] for optional input. Blank values become `None`.
    ///
    /// # Errors
    /// See [`Guard::untaint`].
    pub fn untaint_opt(&self, rule: Rule, input: Option<&str>) -> Result<Option<String>, GuardError> {
        match input.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => self.untaint(rule, value).map(|v| Some(v.to_owned())),
            None => Ok(None),
        }
    }
}

impl Default for Guard {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(&ValidationConfig::default()).expect("default validation patterns compile")
    }
}
