use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wire encoding a [`Timestamp`] was read from, and will be written back as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeFormat {
    /// Epoch seconds as a JSON number, fractional part for sub-second precision.
    #[default]
    Unix,
    /// RFC 3339 text.
    Rfc3339,
}

/// A UTC instant that remembers its wire encoding.
///
/// Decoding accepts a JSON number (integer or fractional epoch seconds) or an
/// RFC 3339 string; encoding emits the same form again. Fresh timestamps use
/// [`TimeFormat::Unix`]. Precision is one microsecond so the numeric form
/// round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    time: DateTime<Utc>,
    format: TimeFormat,
}

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        Self::from_time(Utc::now())
    }

    #[must_use]
    pub fn from_time(time: DateTime<Utc>) -> Self {
        Self { time: time.trunc_subsecs(6), format: TimeFormat::Unix }
    }

    /// Same instant, different wire encoding.
    #[must_use]
    pub const fn with_format(mut self, format: TimeFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub const fn time(&self) -> DateTime<Utc> {
        self.time
    }

    #[must_use]
    pub const fn format(&self) -> TimeFormat {
        self.format
    }

    /// Epoch seconds with microsecond fraction.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_epoch_secs(&self) -> f64 {
        self.time.timestamp() as f64 + f64::from(self.time.timestamp_subsec_micros()) / 1e6
    }

    /// Builds a timestamp from fractional epoch seconds, rounded to the microsecond.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_epoch_secs(secs: f64) -> Option<Self> {
        if !secs.is_finite() {
            return None;
        }
        let micros = (secs * 1e6).round();
        if micros.abs() > 9.0e18 {
            return None;
        }
        DateTime::from_timestamp_micros(micros as i64).map(Self::from_time)
    }

    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_time(time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.format {
            TimeFormat::Unix if self.time.timestamp_subsec_micros() == 0 => {
                serializer.serialize_i64(self.time.timestamp())
            },
            TimeFormat::Unix => serializer.serialize_f64(self.as_epoch_secs()),
            TimeFormat::Rfc3339 => serializer.serialize_str(&self.to_rfc3339()),
        }
    }
}

struct TimestampVisitor;

impl Visitor<'_> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("epoch seconds or an RFC 3339 date-time")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        DateTime::from_timestamp(v, 0)
            .map(Timestamp::from_time)
            .ok_or_else(|| E::custom(format!("epoch seconds out of range: {v}")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let secs = i64::try_from(v).map_err(|_| E::custom("epoch seconds out of range"))?;
        self.visit_i64(secs)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Timestamp::from_epoch_secs(v)
            .ok_or_else(|| E::custom(format!("epoch seconds out of range: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        DateTime::parse_from_rfc3339(v)
            .map(|t| Timestamp::from_time(t.with_timezone(&Utc)).with_format(TimeFormat::Rfc3339))
            .map_err(|e| E::custom(format!("invalid RFC 3339 date-time '{v}': {e}")))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}
