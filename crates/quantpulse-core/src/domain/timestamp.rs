use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::ValidationError;

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    /// Parses vendor date stamps: `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`, both read as UTC.
    pub fn parse_vendor(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let invalid = || ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        };

        if trimmed.len() == 10 {
            let date = Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
                .map_err(|_| invalid())?;
            return Ok(Self(date.midnight().assume_utc()));
        }

        let datetime = PrimitiveDateTime::parse(
            trimmed,
            format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        )
        .map_err(|_| invalid())?;
        Ok(Self(datetime.assume_utc()))
    }

    pub fn from_unix_timestamp(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::TimestampOutOfRange { value: seconds })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Whole hours since the Unix epoch.
    pub fn hour_bucket(self) -> i64 {
        self.unix_timestamp().div_euclid(SECONDS_PER_HOUR)
    }

    /// Whole days since the Unix epoch.
    pub fn day_bucket(self) -> i64 {
        self.unix_timestamp().div_euclid(SECONDS_PER_DAY)
    }

    pub fn checked_sub_days(self, days: i64) -> Option<Self> {
        self.0.checked_sub(Duration::days(days)).map(Self)
    }

    pub fn checked_add_days(self, days: i64) -> Option<Self> {
        self.0.checked_add(Duration::days(days)).map(Self)
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn parses_vendor_dates_and_datetimes() {
        let date = UtcDateTime::parse_vendor("2024-03-15").expect("date");
        assert_eq!(date.format_rfc3339(), "2024-03-15T00:00:00Z");

        let datetime = UtcDateTime::parse_vendor("2024-03-15 09:15:00").expect("datetime");
        assert_eq!(datetime.format_rfc3339(), "2024-03-15T09:15:00Z");

        assert!(UtcDateTime::parse_vendor("15/03/2024").is_err());
    }

    #[test]
    fn buckets_are_stable_within_the_hour() {
        let early = UtcDateTime::parse("2024-01-01T10:00:01Z").expect("ts");
        let late = UtcDateTime::parse("2024-01-01T10:59:59Z").expect("ts");
        let next = UtcDateTime::parse("2024-01-01T11:00:00Z").expect("ts");

        assert_eq!(early.hour_bucket(), late.hour_bucket());
        assert_ne!(late.hour_bucket(), next.hour_bucket());
        assert_eq!(early.day_bucket(), next.day_bucket());
    }
}
