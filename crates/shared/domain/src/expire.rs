use crate::error::DomainError;
use crate::timestamp::Timestamp;
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Literal policy token for delete-on-first-access.
pub const ASAP: &str = "asap";

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

static GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]+[dhms])+$").expect("duration grammar is valid"));
static TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)([dhms])").expect("duration term is valid"));

/// A positive time-to-live in whole seconds.
///
/// Parsed from the compact form `<digits><unit>` repeated, units `d h m s`,
/// terms summed (`"2h30m"`, `"1d2h"`, even `"90m"`). Rendered back in
/// canonical form: `93600` seconds is `"1d2h"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(u64);

impl Ttl {
    /// # Errors
    /// [`DomainError::InvalidExpire`] for zero.
    pub fn from_secs(secs: u64) -> Result<Self, DomainError> {
        if secs == 0 {
            return Err(DomainError::InvalidExpire {
                message: "time-to-live must be greater than zero".into(),
                context: None,
            });
        }
        Ok(Self(secs))
    }

    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Offset from creation, saturating for absurdly large values.
    #[must_use]
    pub fn as_delta(self) -> TimeDelta {
        i64::try_from(self.0).ok().and_then(TimeDelta::try_seconds).unwrap_or(TimeDelta::MAX)
    }
}

impl FromStr for Ttl {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| DomainError::InvalidExpire {
            message: format!("'{raw}' {why}").into(),
            context: None,
        };

        if !GRAMMAR.is_match(raw) {
            return Err(invalid("is not a duration like 1d, 2h30m or 45s"));
        }

        let mut total: u64 = 0;
        for caps in TERM.captures_iter(raw) {
            let amount: u64 = caps[1].parse().map_err(|_| invalid("has an oversized term"))?;
            let unit = match &caps[2] {
                "d" => DAY,
                "h" => HOUR,
                "m" => MINUTE,
                _ => 1,
            };
            total = amount
                .checked_mul(unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(|| invalid("overflows"))?;
        }

        Self::from_secs(total)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        for (unit, label) in [(DAY, 'd'), (HOUR, 'h'), (MINUTE, 'm'), (1, 's')] {
            let amount = rest / unit;
            rest %= unit;
            if amount > 0 {
                write!(f, "{amount}{label}")?;
            }
        }
        Ok(())
    }
}

/// Expiration policy of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Expire {
    /// Delete after the first successful delivery.
    #[default]
    Asap,
    /// Delete once `created + ttl <= now`.
    After(Ttl),
}

impl Expire {
    /// Parses user input. Blank input means [`Expire::Asap`].
    ///
    /// # Errors
    /// [`DomainError::InvalidExpire`] when the input is neither `asap` nor a duration.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim() {
            "" | ASAP => Ok(Self::Asap),
            other => other.parse().map(Self::After),
        }
    }

    #[must_use]
    pub const fn is_asap(&self) -> bool {
        matches!(self, Self::Asap)
    }

    #[must_use]
    pub const fn ttl(&self) -> Option<Ttl> {
        match self {
            Self::Asap => None,
            Self::After(ttl) => Some(*ttl),
        }
    }

    /// Instant the entry becomes eligible for deletion, `None` for [`Expire::Asap`].
    #[must_use]
    pub fn deadline(&self, created: &Timestamp) -> Option<DateTime<Utc>> {
        self.ttl().map(|ttl| {
            created.time().checked_add_signed(ttl.as_delta()).unwrap_or(DateTime::<Utc>::MAX_UTC)
        })
    }

    /// Whether a TTL policy has run out at `now`. Always `false` for `asap`.
    #[must_use]
    pub fn has_elapsed(&self, created: &Timestamp, now: DateTime<Utc>) -> bool {
        self.deadline(created).is_some_and(|deadline| deadline <= now)
    }

    /// Human-readable expiry, as printed by operator tooling.
    #[must_use]
    pub fn describe(&self, created: &Timestamp) -> String {
        self.deadline(created).map_or_else(
            || "On first access".to_owned(),
            |deadline| deadline.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
    }
}

impl fmt::Display for Expire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asap => f.write_str(ASAP),
            Self::After(ttl) => ttl.fmt(f),
        }
    }
}

impl FromStr for Expire {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl Serialize for Expire {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Expire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
