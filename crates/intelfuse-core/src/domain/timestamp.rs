//! UTC-only instant used for query windows and source telemetry.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// Microseconds since the Unix epoch, always UTC.
///
/// Only RFC3339 input with a `Z` suffix is accepted; wall-clock offsets
/// are rejected rather than normalized, so a serialized value
/// round-trips byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UtcDateTime {
    micros: i64,
}

impl UtcDateTime {
    pub fn now() -> Self {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self::from_unix_micros((nanos / 1_000) as i64)
    }

    pub const fn from_unix_micros(micros: i64) -> Self {
        Self { micros }
    }

    pub const fn unix_micros(self) -> i64 {
        self.micros
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let reject = || ValidationError::InvalidTimestamp {
            value: input.to_owned(),
        };

        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| reject())?;
        if parsed.offset() != UtcOffset::UTC {
            return Err(reject());
        }

        Ok(Self::from_unix_micros(
            (parsed.unix_timestamp_nanos() / 1_000) as i64,
        ))
    }

    pub fn format_rfc3339(self) -> String {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.micros) * 1_000)
            .ok()
            .and_then(|instant| instant.format(&Rfc3339).ok())
            .unwrap_or_else(|| String::from("<out-of-range>"))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl TryFrom<String> for UtcDateTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UtcDateTime> for String {
    fn from(value: UtcDateTime) -> Self {
        value.format_rfc3339()
    }
}
