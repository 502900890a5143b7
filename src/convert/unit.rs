//! Epoch units and epoch string parsing

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConversionError;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Resolution of an epoch timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EpochUnit {
    #[default]
    #[serde(alias = "seconds")]
    S,
    #[serde(alias = "milliseconds")]
    Ms,
    #[serde(alias = "microseconds")]
    Us,
    #[serde(alias = "nanoseconds")]
    Ns,
}

impl EpochUnit {
    pub fn all() -> &'static [EpochUnit] {
        &[EpochUnit::S, EpochUnit::Ms, EpochUnit::Us, EpochUnit::Ns]
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            EpochUnit::S => "s",
            EpochUnit::Ms => "ms",
            EpochUnit::Us => "us",
            EpochUnit::Ns => "ns",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EpochUnit::S => "Seconds",
            EpochUnit::Ms => "Milliseconds",
            EpochUnit::Us => "Microseconds",
            EpochUnit::Ns => "Nanoseconds",
        }
    }

    /// Nanoseconds in one tick of this unit
    pub fn nanos(&self) -> i128 {
        match self {
            EpochUnit::S => NANOS_PER_SECOND,
            EpochUnit::Ms => 1_000_000,
            EpochUnit::Us => 1_000,
            EpochUnit::Ns => 1,
        }
    }

    /// Guess the unit of an epoch from its digit count (present-day
    /// timestamps have 10, 13, 16 or 19 digits)
    pub fn guess(epoch: &str) -> Option<EpochUnit> {
        let digits = epoch.trim().trim_start_matches('-');
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        match digits.len() {
            1..=11 => Some(EpochUnit::S),
            12..=14 => Some(EpochUnit::Ms),
            15..=17 => Some(EpochUnit::Us),
            18..=20 => Some(EpochUnit::Ns),
            _ => None,
        }
    }
}

impl fmt::Display for EpochUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for EpochUnit {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(EpochUnit::S),
            "ms" | "millis" | "millisecond" | "milliseconds" => Ok(EpochUnit::Ms),
            "us" | "µs" | "micros" | "microsecond" | "microseconds" => Ok(EpochUnit::Us),
            "ns" | "nanos" | "nanosecond" | "nanoseconds" => Ok(EpochUnit::Ns),
            _ => Err(ConversionError::InvalidUnit(s.to_string())),
        }
    }
}

/// Whether `input` looks like an epoch: an optionally negative integer or
/// decimal number
pub fn is_valid_epoch(input: &str) -> bool {
    split_number(input).is_some()
}

/// Split into (negative, integer digits, fraction digits)
fn split_number(input: &str) -> Option<(bool, &str, &str)> {
    let input = input.trim();
    let (negative, rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let (integer, fraction) = rest.split_once('.').unwrap_or((rest, ""));
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if integer.is_empty() || !all_digits(integer) || !all_digits(fraction) {
        return None;
    }
    if rest.ends_with('.') {
        return None;
    }
    Some((negative, integer, fraction))
}

/// Parse an epoch in `unit` into nanoseconds since 1970-01-01T00:00:00Z
pub fn epoch_to_nanos(input: &str, unit: EpochUnit) -> Result<i128, ConversionError> {
    let invalid = || ConversionError::InvalidEpoch(input.to_string());
    let (negative, integer, fraction) = split_number(input).ok_or_else(invalid)?;

    let whole: i128 = integer.parse().map_err(|_| invalid())?;
    let mut nanos = whole.checked_mul(unit.nanos()).ok_or_else(invalid)?;

    // Fraction digits below nanosecond resolution are dropped
    let mut scale = unit.nanos();
    for digit in fraction.chars() {
        scale /= 10;
        if scale == 0 {
            break;
        }
        nanos = nanos
            .checked_add(i128::from(digit.to_digit(10).unwrap_or(0)) * scale)
            .ok_or_else(invalid)?;
    }

    Ok(if negative { -nanos } else { nanos })
}

/// Parse an epoch in `unit` into a UTC date-time
pub fn epoch_to_datetime(input: &str, unit: EpochUnit) -> Result<DateTime<Utc>, ConversionError> {
    let nanos = epoch_to_nanos(input, unit)?;
    nanos_to_datetime(nanos).ok_or_else(|| ConversionError::OutOfRange(input.to_string()))
}

pub fn nanos_to_datetime(nanos: i128) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SECOND)).ok()?;
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
    DateTime::from_timestamp(secs, subsec)
}

/// Express `datetime` as an epoch in `unit`, rounding toward the past
pub fn datetime_to_epoch(datetime: &DateTime<Utc>, unit: EpochUnit) -> i128 {
    let nanos = i128::from(datetime.timestamp()) * NANOS_PER_SECOND
        + i128::from(datetime.timestamp_subsec_nanos());
    nanos.div_euclid(unit.nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_from_str() {
        assert_eq!("ms".parse::<EpochUnit>().unwrap(), EpochUnit::Ms);
        assert_eq!("Seconds".parse::<EpochUnit>().unwrap(), EpochUnit::S);
        assert_eq!("µs".parse::<EpochUnit>().unwrap(), EpochUnit::Us);
        assert!(matches!(
            "hours".parse::<EpochUnit>(),
            Err(ConversionError::InvalidUnit(_))
        ));
    }

    #[test]
    fn test_guess_unit_from_digits() {
        assert_eq!(EpochUnit::guess("1700000000"), Some(EpochUnit::S));
        assert_eq!(EpochUnit::guess("1700000000000"), Some(EpochUnit::Ms));
        assert_eq!(EpochUnit::guess("1700000000000000"), Some(EpochUnit::Us));
        assert_eq!(EpochUnit::guess("1700000000000000000"), Some(EpochUnit::Ns));
        assert_eq!(EpochUnit::guess("17000000000000000000000"), None);
        assert_eq!(EpochUnit::guess("12ab"), None);
    }

    #[test]
    fn test_is_valid_epoch() {
        assert!(is_valid_epoch("1700000000"));
        assert!(is_valid_epoch("-86400"));
        assert!(is_valid_epoch("1700000000.250"));
        assert!(!is_valid_epoch(""));
        assert!(!is_valid_epoch("1700000000."));
        assert!(!is_valid_epoch("17e9"));
        assert!(!is_valid_epoch("2024-01-01"));
    }

    #[test]
    fn test_epoch_to_nanos_with_fraction() {
        assert_eq!(epoch_to_nanos("1.5", EpochUnit::S).unwrap(), 1_500_000_000);
        assert_eq!(epoch_to_nanos("1.5", EpochUnit::Ms).unwrap(), 1_500_000);
        assert_eq!(epoch_to_nanos("-1", EpochUnit::Ms).unwrap(), -1_000_000);
        // Digits finer than a nanosecond are dropped
        assert_eq!(epoch_to_nanos("1.9", EpochUnit::Ns).unwrap(), 1);
    }

    #[test]
    fn test_overflowing_fraction_is_invalid() {
        let input = "170141183460469231731687303715.999999999";
        assert!(is_valid_epoch(input));
        assert!(matches!(
            epoch_to_nanos(input, EpochUnit::S),
            Err(ConversionError::InvalidEpoch(_))
        ));
        assert_eq!(
            epoch_to_nanos("170141183460469231731687303715.8", EpochUnit::S).unwrap(),
            170_141_183_460_469_231_731_687_303_715_800_000_000
        );
    }

    #[test]
    fn test_epoch_roundtrip_through_datetime() {
        let datetime = epoch_to_datetime("1700000000123", EpochUnit::Ms).unwrap();
        assert_eq!(datetime.timestamp(), 1_700_000_000);
        assert_eq!(datetime_to_epoch(&datetime, EpochUnit::Ms), 1_700_000_000_123);
        assert_eq!(datetime_to_epoch(&datetime, EpochUnit::S), 1_700_000_000);
    }

    #[test]
    fn test_negative_epoch_rounds_toward_past() {
        let datetime = epoch_to_datetime("-1", EpochUnit::Ms).unwrap();
        assert_eq!(datetime_to_epoch(&datetime, EpochUnit::S), -1);
    }

    #[test]
    fn test_out_of_range_epoch() {
        assert!(matches!(
            epoch_to_datetime("99999999999999999999", EpochUnit::S),
            Err(ConversionError::OutOfRange(_))
        ));
    }
}
