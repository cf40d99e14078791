// ── Account expiry timestamp codec ──
//
// Expiry values cross the service boundary as a fixed-format string.
// Both sides must use this exact pattern; anything else is a parse
// error, never a silently substituted default.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// The fixed textual pattern for expiry timestamps on the wire,
/// e.g. `"2030-01-01 00:00:00 UTC"`. Values are always UTC; the zone
/// suffix is literal and required.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ZONE_SUFFIX: &str = " UTC";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpiryParseError {
    #[error("expiry timestamp '{input}' is missing the 'UTC' zone suffix")]
    MissingZone { input: String },

    #[error("expiry timestamp '{input}' does not match '%Y-%m-%d %H:%M:%S UTC': {reason}")]
    Malformed { input: String, reason: String },
}

/// Format an expiry instant into the wire pattern.
pub fn format_expiry(expiry: DateTime<Utc>) -> String {
    format!("{}{ZONE_SUFFIX}", expiry.format(EXPIRY_FORMAT))
}

/// Parse a wire-format expiry string into an instant.
pub fn parse_expiry(input: &str) -> Result<DateTime<Utc>, ExpiryParseError> {
    let Some(stamp) = input.strip_suffix(ZONE_SUFFIX) else {
        return Err(ExpiryParseError::MissingZone {
            input: input.to_owned(),
        });
    };

    NaiveDateTime::parse_from_str(stamp, EXPIRY_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| ExpiryParseError::Malformed {
            input: input.to_owned(),
            reason: e.to_string(),
        })
}

/// Serde adapter carrying a `DateTime<Utc>` as the fixed wire string.
pub mod wire {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_expiry(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_expiry(&raw).map_err(serde::de::Error::custom)
    }
}

/// As [`wire`], for optional expiry values (`None` means unknown).
pub mod wire_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(instant) => serializer.serialize_some(&super::format_expiry(*instant)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_expiry(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
