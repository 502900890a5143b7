//! Time conversions between epochs, ISO 8601 / RFC 2822 dates, custom
//! formats and durations.

pub mod converter;
pub mod duration;
pub mod format;
pub mod unit;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use converter::Converter;
pub use duration::{format_iso_duration, format_readable_duration, is_valid_iso_duration, parse_iso_duration};
pub use format::{is_valid_format, CustomFormat};
pub use unit::{is_valid_epoch, EpochUnit};

/// Domain errors raised by conversions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("'{0}' is not a valid epoch")]
    InvalidEpoch(String),

    #[error("'{0}' is not a valid ISO 8601 or RFC 2822 date")]
    InvalidIsoRfc(String),

    #[error("'{0}' is not a valid custom format")]
    InvalidCustomFormat(String),

    #[error("'{date}' does not match format '{format}'")]
    InvalidCustomDate { date: String, format: String },

    #[error("'{0}' is not a valid ISO 8601 duration")]
    InvalidDuration(String),

    #[error("'{0}' is not a known epoch unit")]
    InvalidUnit(String),

    #[error("'{0}' is outside the supported date range")]
    OutOfRange(String),

    #[error("{conversion} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        conversion: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown conversion '{0}'")]
    UnknownConversion(String),
}

/// Every conversion the extension offers, in catalogue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Conversion {
    EpochToIsoUtc,
    EpochToIsoLocal,
    EpochToCustom,
    EpochToIsoDuration,
    EpochToReadableDuration,
    IsoRfcToEpoch,
    IsoRfcToCustom,
    IsoDurationToEpoch,
    CustomToEpoch,
    CustomToIsoUtc,
    CustomToIsoLocal,
    CustomToCustom,
    NowAsEpoch,
    NowAsIsoUtc,
    NowAsIsoLocal,
    NowAsCustom,
}

impl Conversion {
    pub fn all() -> &'static [Conversion] {
        use Conversion::*;
        &[
            EpochToIsoUtc,
            EpochToIsoLocal,
            EpochToCustom,
            EpochToIsoDuration,
            EpochToReadableDuration,
            IsoRfcToEpoch,
            IsoRfcToCustom,
            IsoDurationToEpoch,
            CustomToEpoch,
            CustomToIsoUtc,
            CustomToIsoLocal,
            CustomToCustom,
            NowAsEpoch,
            NowAsIsoUtc,
            NowAsIsoLocal,
            NowAsCustom,
        ]
    }

    /// Stable camelCase name
    pub fn name(&self) -> &'static str {
        match self {
            Conversion::EpochToIsoUtc => "epochToIsoUtc",
            Conversion::EpochToIsoLocal => "epochToIsoLocal",
            Conversion::EpochToCustom => "epochToCustom",
            Conversion::EpochToIsoDuration => "epochToIsoDuration",
            Conversion::EpochToReadableDuration => "epochToReadableDuration",
            Conversion::IsoRfcToEpoch => "isoRfcToEpoch",
            Conversion::IsoRfcToCustom => "isoRfcToCustom",
            Conversion::IsoDurationToEpoch => "isoDurationToEpoch",
            Conversion::CustomToEpoch => "customToEpoch",
            Conversion::CustomToIsoUtc => "customToIsoUtc",
            Conversion::CustomToIsoLocal => "customToIsoLocal",
            Conversion::CustomToCustom => "customToCustom",
            Conversion::NowAsEpoch => "nowAsEpoch",
            Conversion::NowAsIsoUtc => "nowAsIsoUtc",
            Conversion::NowAsIsoLocal => "nowAsIsoLocal",
            Conversion::NowAsCustom => "nowAsCustom",
        }
    }

    /// Positional parameter names, in the order `Converter::convert`
    /// expects them
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            Conversion::EpochToIsoUtc
            | Conversion::EpochToIsoLocal
            | Conversion::EpochToIsoDuration
            | Conversion::EpochToReadableDuration => &["epoch", "unit"],
            Conversion::EpochToCustom => &["epoch", "unit", "format"],
            Conversion::IsoRfcToEpoch => &["date", "unit"],
            Conversion::IsoRfcToCustom => &["date", "format"],
            Conversion::IsoDurationToEpoch => &["duration", "unit"],
            Conversion::CustomToEpoch => &["format", "date", "unit"],
            Conversion::CustomToIsoUtc | Conversion::CustomToIsoLocal => &["format", "date"],
            Conversion::CustomToCustom => &["format", "date", "targetFormat"],
            Conversion::NowAsEpoch => &["unit"],
            Conversion::NowAsIsoUtc | Conversion::NowAsIsoLocal => &[],
            Conversion::NowAsCustom => &["format"],
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters().len()
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Conversion {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Conversion::all()
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| ConversionError::UnknownConversion(s.to_string()))
    }
}
