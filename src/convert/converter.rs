//! Dispatch of named conversions over positional string arguments

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use super::duration::{format_iso_duration, format_readable_duration, parse_iso_duration};
use super::format::CustomFormat;
use super::unit::{datetime_to_epoch, epoch_to_datetime, epoch_to_nanos, EpochUnit};
use super::{Conversion, ConversionError};

/// Naive date-time layouts accepted as ISO input and read as UTC
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Runs conversions. The local zone and the current instant are taken
/// from the system unless pinned, which keeps tests deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct Converter {
    local: Option<FixedOffset>,
    now: Option<DateTime<Utc>>,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the zone used for "local" output and offset-less custom input
    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local = Some(offset);
        self
    }

    /// Pin the instant used by the `nowAs*` conversions
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// `datetime` in the pinned or system local zone
    pub fn to_local(&self, datetime: &DateTime<Utc>) -> DateTime<FixedOffset> {
        match self.local {
            Some(offset) => datetime.with_timezone(&offset),
            None => datetime.with_timezone(&Local).fixed_offset(),
        }
    }

    fn local_offset(&self) -> FixedOffset {
        self.local.unwrap_or_else(|| *Local::now().offset())
    }

    /// Run `conversion` with `args` in the order of
    /// [`Conversion::parameters`]
    pub fn convert(&self, conversion: Conversion, args: &[String]) -> Result<String, ConversionError> {
        if args.len() != conversion.arity() {
            return Err(ConversionError::ArgumentCount {
                conversion: conversion.name(),
                expected: conversion.arity(),
                actual: args.len(),
            });
        }
        let arg = |i: usize| args[i].as_str();

        let output = match conversion {
            Conversion::EpochToIsoUtc => {
                self.iso_utc(&epoch_to_datetime(arg(0), arg(1).parse()?)?)
            }
            Conversion::EpochToIsoLocal => {
                self.iso_local(&epoch_to_datetime(arg(0), arg(1).parse()?)?)
            }
            Conversion::EpochToCustom => {
                let datetime = epoch_to_datetime(arg(0), arg(1).parse()?)?;
                CustomFormat::parse(arg(2))?.format(&self.to_local(&datetime))?
            }
            Conversion::EpochToIsoDuration => format_iso_duration(epoch_to_nanos(arg(0), arg(1).parse()?)?),
            Conversion::EpochToReadableDuration => {
                format_readable_duration(epoch_to_nanos(arg(0), arg(1).parse()?)?)
            }
            Conversion::IsoRfcToEpoch => {
                let unit: EpochUnit = arg(1).parse()?;
                datetime_to_epoch(&parse_iso_rfc(arg(0))?, unit).to_string()
            }
            Conversion::IsoRfcToCustom => {
                let datetime = parse_iso_rfc(arg(0))?;
                CustomFormat::parse(arg(1))?.format(&self.to_local(&datetime))?
            }
            Conversion::IsoDurationToEpoch => {
                let unit: EpochUnit = arg(1).parse()?;
                (parse_iso_duration(arg(0))? / unit.nanos()).to_string()
            }
            Conversion::CustomToEpoch => {
                let unit: EpochUnit = arg(2).parse()?;
                datetime_to_epoch(&self.parse_custom(arg(0), arg(1))?, unit).to_string()
            }
            Conversion::CustomToIsoUtc => self.iso_utc(&self.parse_custom(arg(0), arg(1))?),
            Conversion::CustomToIsoLocal => self.iso_local(&self.parse_custom(arg(0), arg(1))?),
            Conversion::CustomToCustom => {
                let datetime = self.parse_custom(arg(0), arg(1))?;
                CustomFormat::parse(arg(2))?.format(&self.to_local(&datetime))?
            }
            Conversion::NowAsEpoch => {
                let unit: EpochUnit = arg(0).parse()?;
                datetime_to_epoch(&self.now(), unit).to_string()
            }
            Conversion::NowAsIsoUtc => self.iso_utc(&self.now()),
            Conversion::NowAsIsoLocal => self.iso_local(&self.now()),
            Conversion::NowAsCustom => CustomFormat::parse(arg(0))?.format(&self.to_local(&self.now()))?,
        };

        tracing::debug!(conversion = conversion.name(), ?args, %output, "converted");
        Ok(output)
    }

    /// `2023-11-14T22:13:20.000Z`
    pub fn iso_utc(&self, datetime: &DateTime<Utc>) -> String {
        datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// `2023-11-14T23:13:20+01:00`
    pub fn iso_local(&self, datetime: &DateTime<Utc>) -> String {
        self.to_local(datetime).to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    /// Parse `date` in custom `format`; dates without an offset are read in
    /// the local zone and missing years default to the current one
    pub fn parse_custom(&self, format: &str, date: &str) -> Result<DateTime<Utc>, ConversionError> {
        let format = CustomFormat::parse(format)?;
        let zone = self.local_offset();
        let default_year = self.now().with_timezone(&zone).year();
        Ok(format.parse_datetime(date, &zone, default_year)?.with_timezone(&Utc))
    }

    /// Whether `date` can be read with custom `format`
    pub fn is_valid_custom_date(&self, format: &str, date: &str) -> bool {
        self.parse_custom(format, date).is_ok()
    }
}

/// Parse RFC 3339, RFC 2822 or a naive ISO date-time (read as UTC)
pub fn parse_iso_rfc(input: &str) -> Result<DateTime<Utc>, ConversionError> {
    let trimmed = input.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.with_timezone(&Utc));
    }
    if let Ok(datetime) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(datetime.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ConversionError::InvalidIsoRfc(input.to_string()))
}

pub fn is_valid_iso_rfc(input: &str) -> bool {
    parse_iso_rfc(input).is_ok()
}
