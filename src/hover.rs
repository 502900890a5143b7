//! Hover tooltips for integers in the editor

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::HoverConfig;
use crate::convert::unit::{epoch_to_datetime, epoch_to_nanos};
use crate::convert::{format_iso_duration, format_readable_duration, Converter, CustomFormat, EpochUnit};

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+").unwrap_or_else(|e| panic!("invalid integer pattern: {e}")));

/// Tooltip content for one hovered integer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hover {
    /// Byte range of the integer within the line
    pub start: usize,
    pub end: usize,
    pub lines: Vec<String>,
}

/// Unit of a present-day epoch, judged by its digit count
fn timestamp_unit(digits: &str) -> Option<EpochUnit> {
    match digits.trim_start_matches('-').len() {
        10 => Some(EpochUnit::S),
        13 => Some(EpochUnit::Ms),
        16 => Some(EpochUnit::Us),
        19 => Some(EpochUnit::Ns),
        _ => None,
    }
}

pub struct HoverProvider {
    config: HoverConfig,
    converter: Converter,
}

impl HoverProvider {
    pub fn new(config: HoverConfig, converter: Converter) -> Self {
        Self { config, converter }
    }

    pub fn update_config(&mut self, config: HoverConfig) {
        self.config = config;
    }

    /// Tooltip for the integer under byte `column` of `line`
    pub fn hover_at(&self, line: &str, column: usize) -> Option<Hover> {
        let found = INTEGER
            .find_iter(line)
            .find(|m| m.start() <= column && column < m.end())?;
        let lines = self.describe(found.as_str());
        if lines.is_empty() {
            return None;
        }
        Some(Hover {
            start: found.start(),
            end: found.end(),
            lines,
        })
    }

    /// Tooltip lines for a bare integer
    pub fn describe(&self, integer: &str) -> Vec<String> {
        let mut lines = Vec::new();
        if self.config.timestamp.enabled {
            lines.extend(self.timestamp_lines(integer));
        }
        if self.config.duration.enabled {
            lines.extend(self.duration_line(integer));
        }
        lines
    }

    fn timestamp_lines(&self, integer: &str) -> Vec<String> {
        let Some(unit) = timestamp_unit(integer) else {
            return Vec::new();
        };
        let Ok(datetime) = epoch_to_datetime(integer, unit) else {
            return Vec::new();
        };

        let mut lines = vec![format!("Epoch ({})", unit.label().to_lowercase())];
        for target in &self.config.timestamp.target_formats {
            let line = match target.to_ascii_lowercase().as_str() {
                "utc" | "iso8601" => format!("UTC: {}", self.converter.iso_utc(&datetime)),
                "local" => format!("Local: {}", self.converter.iso_local(&datetime)),
                _ => match CustomFormat::parse(target)
                    .and_then(|format| format.format(&self.converter.to_local(&datetime)))
                {
                    Ok(rendered) => format!("{}: {}", target, rendered),
                    Err(err) => {
                        tracing::debug!(format = %target, error = %err, "skipping hover format");
                        continue;
                    }
                },
            };
            lines.push(line);
        }
        lines
    }

    fn duration_line(&self, integer: &str) -> Option<String> {
        let nanos = epoch_to_nanos(integer, self.config.duration.source_unit).ok()?;
        let rendered = if self.config.duration.use_iso_target {
            format_iso_duration(nanos)
        } else {
            format_readable_duration(nanos)
        };
        Some(format!("Duration: {}", rendered))
    }
}
