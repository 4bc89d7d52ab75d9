use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::ValidationError;

// The service encodes every date as milliseconds since the Unix epoch wrapped
// in a sentinel, optionally suffixed with a timezone offset that carries no
// meaning and must be stripped rather than applied.
static WIRE_DATE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/Date\((-?\d+)\)/$").expect("static pattern must compile"));
static WIRE_DATE_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/Date\((-?\d+)[+-]\d{4}\)/$").expect("static pattern must compile")
});

/// UTC timestamp that serializes to the service's `/Date(<millis>)/` wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WireDateTime(OffsetDateTime);

impl WireDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Any offset is converted to UTC; the instant is preserved.
    pub fn from_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    /// Midnight UTC of the given instant's calendar date. Outbound request
    /// dates carry day-level precision only.
    pub fn midnight_of(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC).date().midnight().assume_utc())
    }

    /// Decode either sentinel form. An offset suffix is ignored, not applied.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let captures = WIRE_DATE_BARE
            .captures(input)
            .or_else(|| WIRE_DATE_OFFSET.captures(input))
            .ok_or_else(|| ValidationError::InvalidWireDate {
                value: input.to_owned(),
            })?;

        let millis: i128 =
            captures[1]
                .parse()
                .map_err(|_| ValidationError::InvalidWireDate {
                    value: input.to_owned(),
                })?;

        OffsetDateTime::from_unix_timestamp_nanos(millis * 1_000_000)
            .map(Self)
            .map_err(|_| ValidationError::InvalidWireDate {
                value: input.to_owned(),
            })
    }

    /// Encode a `YYYY-MM-DD` calendar date string as a wire date at midnight
    /// UTC. A string already in wire form is a precondition failure; dates are
    /// never double-encoded.
    pub fn encode_calendar(input: &str) -> Result<String, ValidationError> {
        if WIRE_DATE_BARE.is_match(input) || WIRE_DATE_OFFSET.is_match(input) {
            return Err(ValidationError::DateAlreadyEncoded {
                value: input.to_owned(),
            });
        }

        let format = format_description!("[year]-[month]-[day]");
        let date =
            Date::parse(input, &format).map_err(|_| ValidationError::InvalidCalendarDate {
                value: input.to_owned(),
            })?;

        Ok(Self(date.midnight().assume_utc()).to_wire_string())
    }

    pub fn to_wire_string(self) -> String {
        let millis = (self.0 - OffsetDateTime::UNIX_EPOCH).whole_milliseconds();
        format!("/Date({millis})/")
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn date(self) -> Date {
        self.0.date()
    }
}

impl From<OffsetDateTime> for WireDateTime {
    fn from(value: OffsetDateTime) -> Self {
        Self::from_datetime(value)
    }
}

impl Display for WireDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

impl Serialize for WireDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_wire_string())
    }
}

impl<'de> Deserialize<'de> for WireDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
