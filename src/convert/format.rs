//! Custom date formats written with moment-style tokens.
//!
//! A pattern such as `DD.MM.YYYY HH:mm` is translated once into a chrono
//! strftime string. Text inside `[...]` is copied literally, as are
//! characters that are not tokens.

use std::fmt::Write;

use chrono::format::{Parsed, StrftimeItems};
use chrono::{DateTime, FixedOffset, TimeZone};

use super::ConversionError;

/// Date/time component a token contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    DayOfYear,
    Weekday,
    Hour,
    Hour12,
    AmPm,
    Minute,
    Second,
    Fraction,
    Offset,
    Timestamp,
}

/// Moment token, chrono specifier, field
const TOKENS: &[(&str, &str, Field)] = &[
    ("YYYY", "%Y", Field::Year),
    ("YY", "%y", Field::Year),
    ("MMMM", "%B", Field::Month),
    ("MMM", "%b", Field::Month),
    ("MM", "%m", Field::Month),
    ("M", "%-m", Field::Month),
    ("DDDD", "%j", Field::DayOfYear),
    ("DDD", "%-j", Field::DayOfYear),
    ("DD", "%d", Field::Day),
    ("D", "%-d", Field::Day),
    ("dddd", "%A", Field::Weekday),
    ("ddd", "%a", Field::Weekday),
    ("HH", "%H", Field::Hour),
    ("H", "%-H", Field::Hour),
    ("hh", "%I", Field::Hour12),
    ("h", "%-I", Field::Hour12),
    ("mm", "%M", Field::Minute),
    ("m", "%-M", Field::Minute),
    ("ss", "%S", Field::Second),
    ("s", "%-S", Field::Second),
    ("SSS", "%3f", Field::Fraction),
    ("A", "%p", Field::AmPm),
    ("a", "%P", Field::AmPm),
    ("ZZ", "%z", Field::Offset),
    ("Z", "%:z", Field::Offset),
    ("X", "%s", Field::Timestamp),
];

/// A validated custom format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFormat {
    pattern: String,
    strftime: String,
    fields: Vec<Field>,
}

impl CustomFormat {
    /// Translate a moment-style pattern. Fails on unterminated `[` escapes
    /// and on patterns without a single token.
    pub fn parse(pattern: &str) -> Result<Self, ConversionError> {
        let invalid = || ConversionError::InvalidCustomFormat(pattern.to_string());
        let mut strftime = String::new();
        let mut fields = Vec::new();
        let mut rest = pattern;

        while let Some(c) = rest.chars().next() {
            if c == '[' {
                let end = rest.find(']').ok_or_else(invalid)?;
                push_literal(&mut strftime, &rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }

            let token = TOKENS
                .iter()
                .filter(|(token, _, _)| rest.starts_with(token))
                .max_by_key(|(token, _, _)| token.len());
            match token {
                Some((token, spec, field)) => {
                    strftime.push_str(spec);
                    fields.push(*field);
                    rest = &rest[token.len()..];
                }
                None => {
                    push_literal(&mut strftime, &rest[..c.len_utf8()]);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }

        if fields.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            pattern: pattern.to_string(),
            strftime,
            fields,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Equivalent chrono strftime string
    pub fn strftime(&self) -> &str {
        &self.strftime
    }

    fn has(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Render `datetime` with this format
    pub fn format<Tz>(&self, datetime: &DateTime<Tz>) -> Result<String, ConversionError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let mut out = String::new();
        write!(out, "{}", datetime.format(&self.strftime))
            .map_err(|_| ConversionError::InvalidCustomFormat(self.pattern.clone()))?;
        Ok(out)
    }

    /// Parse `input` written in this format. Components missing from the
    /// format default to the start of their range (month and day 1, midnight)
    /// and the year to `default_year`. Inputs without an offset are read in
    /// `zone`.
    pub fn parse_datetime(
        &self,
        input: &str,
        zone: &FixedOffset,
        default_year: i32,
    ) -> Result<DateTime<FixedOffset>, ConversionError> {
        let invalid = || ConversionError::InvalidCustomDate {
            date: input.to_string(),
            format: self.pattern.clone(),
        };

        let mut parsed = Parsed::new();
        chrono::format::parse(&mut parsed, input.trim(), StrftimeItems::new(&self.strftime))
            .map_err(|_| invalid())?;

        if self.has(Field::Timestamp) {
            let utc = parsed
                .to_naive_datetime_with_offset(0)
                .map_err(|_| invalid())?
                .and_utc();
            return Ok(utc.with_timezone(zone));
        }

        self.fill_defaults(&mut parsed, default_year)
            .map_err(|_| invalid())?;

        if self.has(Field::Offset) {
            return parsed.to_datetime().map_err(|_| invalid());
        }

        let naive = parsed
            .to_naive_datetime_with_offset(0)
            .map_err(|_| invalid())?;
        zone.from_local_datetime(&naive).single().ok_or_else(invalid)
    }

    fn fill_defaults(&self, parsed: &mut Parsed, default_year: i32) -> chrono::format::ParseResult<()> {
        if !self.has(Field::Year) {
            parsed.set_year(i64::from(default_year))?;
        }
        if !self.has(Field::DayOfYear) {
            if !self.has(Field::Month) {
                parsed.set_month(1)?;
            }
            if !self.has(Field::Day) {
                parsed.set_day(1)?;
            }
        }
        if self.has(Field::Hour12) && !self.has(Field::AmPm) {
            parsed.set_ampm(false)?;
        }
        if !self.has(Field::Hour) && !self.has(Field::Hour12) {
            parsed.set_hour(0)?;
        }
        if !self.has(Field::Minute) {
            parsed.set_minute(0)?;
        }
        if !self.has(Field::Second) {
            parsed.set_second(0)?;
        }
        Ok(())
    }
}

fn push_literal(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
}

/// Whether `pattern` is a usable custom format
pub fn is_valid_format(pattern: &str) -> bool {
    !pattern.trim().is_empty() && CustomFormat::parse(pattern).is_ok()
}
