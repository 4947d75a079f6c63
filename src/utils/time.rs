//! Serde helpers for server timestamps.
//!
//! The chat backend emits RFC 3339 timestamps when the column is zone-aware and naive
//! `YYYY-MM-DDTHH:MM:SS[.ffffff]` timestamps otherwise.  Naive values are taken as UTC.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Parse a server timestamp, accepting RFC 3339 or a naive ISO 8601 datetime.
pub fn parse(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    match OffsetDateTime::parse(s, &Rfc3339) {
        Ok(datetime) => Ok(datetime),
        Err(err) => {
            let with_t = format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
            );
            let with_space = format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
            );
            PrimitiveDateTime::parse(s, with_t)
                .or_else(|_| PrimitiveDateTime::parse(s, with_space))
                .map(PrimitiveDateTime::assume_utc)
                .map_err(|_| err)
        }
    }
}

/// Deserialize a server timestamp into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

/// The same conversions for optional timestamps.
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => super::parse(&s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }

    pub fn serialize<S>(datetime: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match datetime {
            Some(datetime) => super::serialize(datetime, serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn parses_rfc3339() {
        let parsed = parse("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(parsed, datetime!(2024-03-01 12:30:00 UTC));
    }

    #[test]
    fn parses_naive_as_utc() {
        let parsed = parse("2024-03-01T12:30:00.250000").unwrap();
        assert_eq!(parsed, datetime!(2024-03-01 12:30:00.25 UTC));
        let parsed = parse("2024-03-01 12:30:00").unwrap();
        assert_eq!(parsed, datetime!(2024-03-01 12:30:00 UTC));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }
}
