//! ISO 8601 and human-readable durations

use once_cell::sync::Lazy;
use regex::Regex;

use super::ConversionError;

const NANOS_PER_MILLI: i128 = 1_000_000;
const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i128 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: i128 = 7 * NANOS_PER_DAY;
/// Calendar-free approximations used for Y and M designators
const NANOS_PER_MONTH: i128 = 30 * NANOS_PER_DAY;
const NANOS_PER_YEAR: i128 = 365 * NANOS_PER_DAY;

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    let number = r"(\d+(?:[.,]\d+)?)";
    Regex::new(&format!(
        r"^([-+])?P(?:{n}Y)?(?:{n}M)?(?:{n}W)?(?:{n}D)?(?:T(?:{n}H)?(?:{n}M)?(?:{n}S)?)?$",
        n = number
    ))
    .unwrap_or_else(|e| panic!("invalid ISO duration pattern: {e}"))
});

/// Parse an ISO 8601 duration such as `P1DT2H30M` into nanoseconds
pub fn parse_iso_duration(input: &str) -> Result<i128, ConversionError> {
    let invalid = || ConversionError::InvalidDuration(input.to_string());
    let trimmed = input.trim().to_ascii_uppercase();
    let captures = ISO_DURATION.captures(&trimmed).ok_or_else(invalid)?;

    // "P" alone or a dangling "T" carry no component
    if trimmed.ends_with('T') || (1..=7).all(|i| captures.get(i + 1).is_none()) {
        return Err(invalid());
    }

    let scales = [
        NANOS_PER_YEAR,
        NANOS_PER_MONTH,
        NANOS_PER_WEEK,
        NANOS_PER_DAY,
        NANOS_PER_HOUR,
        NANOS_PER_MINUTE,
        NANOS_PER_SECOND,
    ];
    let mut total: i128 = 0;
    for (i, scale) in scales.iter().enumerate() {
        if let Some(component) = captures.get(i + 2) {
            let value = scaled(component.as_str(), *scale).ok_or_else(invalid)?;
            total = total.checked_add(value).ok_or_else(invalid)?;
        }
    }

    let negative = captures.get(1).is_some_and(|sign| sign.as_str() == "-");
    Ok(if negative { -total } else { total })
}

/// `value * scale` for a decimal `value` with `.` or `,` separator
fn scaled(value: &str, scale: i128) -> Option<i128> {
    let value = value.replace(',', ".");
    let (integer, fraction) = value.split_once('.').unwrap_or((&value, ""));
    let mut total = integer.parse::<i128>().ok()?.checked_mul(scale)?;
    let mut unit = scale;
    for digit in fraction.chars() {
        unit /= 10;
        if unit == 0 {
            break;
        }
        total = total.checked_add(i128::from(digit.to_digit(10)?) * unit)?;
    }
    Some(total)
}

/// Split a non-negative nanosecond count into days, hours, minutes,
/// seconds and the sub-second remainder
fn split(nanos: i128) -> (i128, i128, i128, i128, i128) {
    let days = nanos / NANOS_PER_DAY;
    let hours = nanos % NANOS_PER_DAY / NANOS_PER_HOUR;
    let minutes = nanos % NANOS_PER_HOUR / NANOS_PER_MINUTE;
    let seconds = nanos % NANOS_PER_MINUTE / NANOS_PER_SECOND;
    let rest = nanos % NANOS_PER_SECOND;
    (days, hours, minutes, seconds, rest)
}

/// Format nanoseconds as an ISO 8601 duration using D, H, M and S
/// designators; zero components are omitted and zero is `PT0S`
pub fn format_iso_duration(nanos: i128) -> String {
    let sign = if nanos < 0 { "-" } else { "" };
    let (days, hours, minutes, seconds, rest) = split(nanos.abs());

    let mut out = format!("{}P", sign);
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours == 0 && minutes == 0 && seconds == 0 && rest == 0 {
        if days == 0 {
            out.push_str("T0S");
        }
        return out;
    }

    out.push('T');
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 || rest > 0 {
        if rest > 0 {
            let fraction = format!("{:09}", rest);
            out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
        } else {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

/// Format nanoseconds as `1d 2h 3m 4s 5ms`; zero components are omitted
/// and zero is `0s`
pub fn format_readable_duration(nanos: i128) -> String {
    let (days, hours, minutes, seconds, rest) = split(nanos.abs());
    let millis = rest / NANOS_PER_MILLI;

    let parts: Vec<String> = [
        (days, "d"),
        (hours, "h"),
        (minutes, "m"),
        (seconds, "s"),
        (millis, "ms"),
    ]
    .iter()
    .filter(|(value, _)| *value > 0)
    .map(|(value, suffix)| format!("{}{}", value, suffix))
    .collect();

    if parts.is_empty() {
        return "0s".to_string();
    }
    let joined = parts.join(" ");
    if nanos < 0 {
        format!("-{}", joined)
    } else {
        joined
    }
}

/// Whether `input` is a parseable ISO 8601 duration
pub fn is_valid_iso_duration(input: &str) -> bool {
    parse_iso_duration(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_duration() {
        assert_eq!(parse_iso_duration("PT1S").unwrap(), NANOS_PER_SECOND);
        assert_eq!(
            parse_iso_duration("P1DT2H3M4S").unwrap(),
            NANOS_PER_DAY + 2 * NANOS_PER_HOUR + 3 * NANOS_PER_MINUTE + 4 * NANOS_PER_SECOND
        );
        assert_eq!(parse_iso_duration("P2W").unwrap(), 14 * NANOS_PER_DAY);
        assert_eq!(parse_iso_duration("P1Y").unwrap(), 365 * NANOS_PER_DAY);
        assert_eq!(parse_iso_duration("P1M").unwrap(), 30 * NANOS_PER_DAY);
        assert_eq!(parse_iso_duration("PT1M").unwrap(), NANOS_PER_MINUTE);
    }

    #[test]
    fn test_parse_fractional_and_signed() {
        assert_eq!(parse_iso_duration("PT0.5S").unwrap(), NANOS_PER_SECOND / 2);
        assert_eq!(parse_iso_duration("PT1,5H").unwrap(), 90 * NANOS_PER_MINUTE);
        assert_eq!(parse_iso_duration("-PT1S").unwrap(), -NANOS_PER_SECOND);
        assert_eq!(parse_iso_duration("pt1s").unwrap(), NANOS_PER_SECOND);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for input in ["", "P", "PT", "P1DT", "1D", "P1H", "PT1D", "P1.D"] {
            assert!(
                matches!(parse_iso_duration(input), Err(ConversionError::InvalidDuration(_))),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_overflowing_totals() {
        // Each component fits in i128 on its own; their sum does not
        let input = "P5390000000000000000000Y1000000000000000000000000D";
        assert!(matches!(
            parse_iso_duration(input),
            Err(ConversionError::InvalidDuration(_))
        ));
        assert!(!is_valid_iso_duration(input));

        let max_seconds = i128::MAX / NANOS_PER_SECOND;
        let input = format!("PT{}.999999999S", max_seconds);
        assert!(parse_iso_duration(&input).is_err());
        assert!(parse_iso_duration(&format!("PT{}S", max_seconds)).is_ok());
    }

    #[test]
    fn test_format_iso_duration() {
        assert_eq!(format_iso_duration(0), "PT0S");
        assert_eq!(format_iso_duration(NANOS_PER_DAY), "P1D");
        assert_eq!(format_iso_duration(90 * NANOS_PER_MINUTE), "PT1H30M");
        assert_eq!(
            format_iso_duration(NANOS_PER_DAY + 4 * NANOS_PER_SECOND + 250 * NANOS_PER_MILLI),
            "P1DT4.25S"
        );
        assert_eq!(format_iso_duration(-NANOS_PER_SECOND), "-PT1S");
    }

    #[test]
    fn test_format_readable_duration() {
        assert_eq!(format_readable_duration(0), "0s");
        assert_eq!(
            format_readable_duration(
                NANOS_PER_DAY + 2 * NANOS_PER_HOUR + 3 * NANOS_PER_MINUTE + 4 * NANOS_PER_SECOND + 5 * NANOS_PER_MILLI
            ),
            "1d 2h 3m 4s 5ms"
        );
        assert_eq!(format_readable_duration(-90 * NANOS_PER_SECOND), "-1m 30s");
    }
}
