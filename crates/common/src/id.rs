//! Identifier generation and the report protocol number.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use ulid::Ulid;
use uuid::Uuid;

use crate::AppError;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs sort by creation time, which keeps report and comment ids
    /// in insertion order when listed lexicographically.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque bearer token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        // No time component, unlike ULIDs
        Uuid::new_v4().simple().to_string()
    }
}

/// Prefix shared by every protocol number.
pub const PROTOCOL_PREFIX: &str = "ANI";

/// Highest per-day sequence that fits the five-digit field.
pub const MAX_DAILY_SEQUENCE: u32 = 99_999;

/// Human-facing report protocol, `ANI-YYYYMMDD-NNNNN`.
///
/// The textual form is a durable external contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolNumber {
    day: NaiveDate,
    sequence: u32,
}

impl ProtocolNumber {
    /// Build a protocol number for the given calendar day and 1-based sequence.
    pub fn new(day: NaiveDate, sequence: u32) -> Result<Self, AppError> {
        if sequence == 0 || sequence > MAX_DAILY_SEQUENCE {
            return Err(AppError::Internal(format!(
                "protocol sequence {sequence} out of range for {day}"
            )));
        }
        Ok(Self { day, sequence })
    }

    /// Calendar day the number was issued on.
    #[must_use]
    pub const fn day(&self) -> NaiveDate {
        self.day
    }

    /// Sequence within the day, starting at 1.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Counter key for a calendar day (`YYYYMMDD`).
    #[must_use]
    pub fn day_key(day: NaiveDate) -> String {
        day.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for ProtocolNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PROTOCOL_PREFIX}-{}-{:05}",
            Self::day_key(self.day),
            self.sequence
        )
    }
}

impl FromStr for ProtocolNumber {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Validation(format!("invalid protocol number: {s}"));

        let mut parts = s.split('-');
        let (Some(prefix), Some(date), Some(seq), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if prefix != PROTOCOL_PREFIX
            || date.len() != 8
            || seq.len() != 5
            || !date.bytes().all(|b| b.is_ascii_digit())
            || !seq.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let day = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid())?;
        let sequence = seq.parse::<u32>().map_err(|_| invalid())?;
        Self::new(day, sequence).map_err(|_| invalid())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_ne!(id1, id2);
        assert_eq!(id1, id1.to_lowercase());
    }

    #[test]
    fn test_generate_token() {
        let token = IdGenerator::new().generate_token();
        assert_eq!(token.len(), 32);
    }

    #[test]
    fn test_protocol_is_zero_padded() {
        let protocol = ProtocolNumber::new(day(2025, 11, 17), 1).unwrap();
        assert_eq!(protocol.to_string(), "ANI-20251117-00001");

        let protocol = ProtocolNumber::new(day(2025, 11, 17), 12_345).unwrap();
        assert_eq!(protocol.to_string(), "ANI-20251117-12345");
    }

    #[test]
    fn test_protocol_parse() {
        let parsed: ProtocolNumber = "ANI-20251117-00042".parse().unwrap();
        assert_eq!(parsed.day(), day(2025, 11, 17));
        assert_eq!(parsed.sequence(), 42);
    }

    #[test]
    fn test_protocol_parse_rejects_malformed() {
        for bad in [
            "ANI-20251117-0001",
            "ANI-2025111-00001",
            "XYZ-20251117-00001",
            "ANI-20251317-00001",
            "ANI-20251117-00000",
            "ANI-20251117-00001-1",
            "ANI-20251117-0a001",
        ] {
            assert!(bad.parse::<ProtocolNumber>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_protocol_sequence_bounds() {
        assert!(ProtocolNumber::new(day(2025, 1, 1), 0).is_err());
        assert!(ProtocolNumber::new(day(2025, 1, 1), MAX_DAILY_SEQUENCE + 1).is_err());
    }

    #[test]
    fn test_protocols_order_within_day() {
        let a = ProtocolNumber::new(day(2025, 1, 1), 9).unwrap();
        let b = ProtocolNumber::new(day(2025, 1, 1), 10).unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }
}
