//! Command palette actions built on the step sequencer.
//!
//! Each conversion command owns a lazily created sequencer whose steps
//! gather the conversion's arguments. Callers may pre-supply arguments by
//! name through `CommandOptions`; those steps are then skipped.

pub mod command;
pub mod registry;
pub mod steps;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::convert::{Conversion, ConversionError};
use crate::flow::SequencerError;
use crate::host::HostError;

pub use command::ConversionCommand;
pub use registry::CommandRegistry;
pub use steps::{CommandSteps, StepFactory, OTHER_FORMAT_LABEL};

/// Prefix of every command id
pub const COMMAND_PREFIX: &str = "timeconv.";

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("command '{command}' has no parameter '{option}'")]
    UnknownOption { command: String, option: String },

    #[error("option '{0}' must be written as name=value")]
    MalformedOption(String),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Identifies a palette command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandId {
    Convert(Conversion),
    ToggleInsertConvertedTime,
}

impl CommandId {
    /// Every command in palette order
    pub fn all() -> Vec<CommandId> {
        Conversion::all()
            .iter()
            .copied()
            .map(CommandId::Convert)
            .chain(std::iter::once(CommandId::ToggleInsertConvertedTime))
            .collect()
    }

    /// Stable id, e.g. `timeconv.epochToIsoUtc`
    pub fn id(&self) -> String {
        match self {
            CommandId::Convert(conversion) => format!("{}{}", COMMAND_PREFIX, conversion.name()),
            CommandId::ToggleInsertConvertedTime => {
                format!("{}toggleInsertConvertedTime", COMMAND_PREFIX)
            }
        }
    }

    pub fn title(&self) -> &'static str {
        let CommandId::Convert(conversion) = self else {
            return "Toggle insert converted time";
        };
        match conversion {
            Conversion::EpochToIsoUtc => "Epoch to ISO 8601 (UTC)",
            Conversion::EpochToIsoLocal => "Epoch to ISO 8601 (local)",
            Conversion::EpochToCustom => "Epoch to custom format",
            Conversion::EpochToIsoDuration => "Epoch to ISO 8601 duration",
            Conversion::EpochToReadableDuration => "Epoch to readable duration",
            Conversion::IsoRfcToEpoch => "ISO 8601 / RFC 2822 to epoch",
            Conversion::IsoRfcToCustom => "ISO 8601 / RFC 2822 to custom format",
            Conversion::IsoDurationToEpoch => "ISO 8601 duration to epoch",
            Conversion::CustomToEpoch => "Custom format to epoch",
            Conversion::CustomToIsoUtc => "Custom format to ISO 8601 (UTC)",
            Conversion::CustomToIsoLocal => "Custom format to ISO 8601 (local)",
            Conversion::CustomToCustom => "Custom format to custom format",
            Conversion::NowAsEpoch => "Now as epoch",
            Conversion::NowAsIsoUtc => "Now as ISO 8601 (UTC)",
            Conversion::NowAsIsoLocal => "Now as ISO 8601 (local)",
            Conversion::NowAsCustom => "Now as custom format",
        }
    }

    /// Parameter names in result order; empty for the toggle
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            CommandId::Convert(conversion) => conversion.parameters(),
            CommandId::ToggleInsertConvertedTime => &[],
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for CommandId {
    type Err = CommandError;

    /// Accepts the full id or the bare name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix(COMMAND_PREFIX).unwrap_or(name);
        if name.eq_ignore_ascii_case("toggleInsertConvertedTime") {
            return Ok(CommandId::ToggleInsertConvertedTime);
        }
        name.parse::<Conversion>()
            .map(CommandId::Convert)
            .map_err(|_| CommandError::UnknownCommand(s.to_string()))
    }
}

/// Named pre-supplied command arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    values: BTreeMap<String, String>,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Parse `name=value` pairs
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair
                .split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| CommandError::MalformedOption(pair.to_string()))?;
            options = options.with(name.trim(), value.trim());
        }
        Ok(options)
    }

    /// Reject names that `command` does not take
    pub fn check(&self, command: CommandId) -> Result<(), CommandError> {
        let parameters = command.parameters();
        match self.names().find(|name| !parameters.contains(name)) {
            Some(option) => Err(CommandError::UnknownOption {
                command: command.id(),
                option: option.to_string(),
            }),
            None => Ok(()),
        }
    }
}
