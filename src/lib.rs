//! timeconv - epoch, ISO 8601 and custom-format time conversions
//!
//! Conversions are gathered through multi-step prompts driven by a step
//! sequencer (`flow`), rendered by a host (`host`) and exposed as palette
//! commands (`commands`).

pub mod commands;
pub mod config;
pub mod convert;
pub mod flow;
pub mod host;
pub mod hover;
pub mod logging;
