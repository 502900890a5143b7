//! Tracing setup.
//!
//! Prompts draw on the terminal while `run` and `convert` are active, so
//! those modes write to `<logs dir>/timeconv-{datetime}.log`. The other
//! subcommands print to stderr. Old log files beyond [`KEEP_LOG_FILES`] are
//! pruned whenever a new one is opened.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Log files kept in the logs directory, newest first
pub const KEEP_LOG_FILES: usize = 20;

const LOG_FILE_PREFIX: &str = "timeconv-";
const LOG_FILE_SUFFIX: &str = ".log";
const FALLBACK_LEVEL: &str = "info";

/// Where log lines end up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File { dir: PathBuf, file_name: String },
    Stderr,
}

impl LogSink {
    /// File sink for interactive modes unless disabled in the config
    pub fn choose(config: &Config, interactive: bool, now: chrono::DateTime<chrono::Utc>) -> Self {
        if interactive && config.logging.to_file {
            LogSink::File {
                dir: config.logs_path(),
                file_name: format!("{LOG_FILE_PREFIX}{}{LOG_FILE_SUFFIX}", now.format("%Y%m%dT%H%M%SZ")),
            }
        } else {
            LogSink::Stderr
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        match self {
            LogSink::File { dir, file_name } => Some(dir.join(file_name)),
            LogSink::Stderr => None,
        }
    }
}

/// Kept alive by `main`; dropping it flushes buffered file output
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,
    pub log_file_path: Option<PathBuf>,
    /// Filter directive that did not parse; `info` was used instead
    pub rejected_level: Option<String>,
    /// Old log files removed while opening this one
    pub pruned: usize,
}

/// Filter directive: `RUST_LOG` first, then `--debug`, then the config
fn filter_directive(config: &Config, debug_override: bool, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ if debug_override => "debug".to_string(),
        _ => config.logging.level.trim().to_string(),
    }
}

/// Parses the directive, falling back to `info` when it is malformed
fn build_filter(directive: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(_) => (EnvFilter::new(FALLBACK_LEVEL), Some(directive.to_string())),
    }
}

fn is_log_file(name: &str) -> bool {
    name.starts_with(LOG_FILE_PREFIX) && name.ends_with(LOG_FILE_SUFFIX)
}

/// Removes the oldest timeconv log files so that at most `keep` remain.
///
/// File names embed a UTC timestamp, so name order is age order. Other
/// files in the directory are left alone.
pub fn prune_logs(dir: &Path, keep: usize) -> std::io::Result<usize> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_log_file(name))
        .collect();
    if names.len() <= keep {
        return Ok(0);
    }
    names.sort_unstable();
    let excess = names.len() - keep;
    for name in &names[..excess] {
        std::fs::remove_file(dir.join(name))?;
    }
    Ok(excess)
}

/// Installs the global subscriber.
///
/// `interactive` is true when prompts will draw on the terminal.
/// `debug_override` comes from `--debug`.
pub fn init_logging(config: &Config, interactive: bool, debug_override: bool) -> Result<LoggingHandle> {
    let directive = filter_directive(config, debug_override, std::env::var("RUST_LOG").ok());
    let (filter, rejected_level) = build_filter(&directive);

    let sink = LogSink::choose(config, interactive, chrono::Utc::now());
    let log_file_path = sink.path();

    let (writer, ansi, guard, pruned) = match &sink {
        LogSink::File { dir, file_name } => {
            std::fs::create_dir_all(dir)?;
            // One slot is reserved for the file about to be opened
            let pruned = prune_logs(dir, KEEP_LOG_FILES.saturating_sub(1))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            (BoxMakeWriter::new(non_blocking), false, Some(guard), pruned)
        }
        LogSink::Stderr => (BoxMakeWriter::new(std::io::stderr), std::io::stderr().is_terminal(), None, 0),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .init();

    Ok(LoggingHandle {
        _guard: guard,
        log_file_path,
        rejected_level,
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.logging.dir = Some(temp_dir.path().join("logs").to_string_lossy().to_string());
        config
    }

    fn at() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
    }

    #[test]
    fn test_interactive_sink_is_timestamped_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let sink = LogSink::choose(&config, true, at());
        assert_eq!(
            sink,
            LogSink::File {
                dir: temp_dir.path().join("logs"),
                file_name: "timeconv-20231114T221320Z.log".to_string(),
            }
        );
        assert_eq!(sink.path(), Some(temp_dir.path().join("logs").join("timeconv-20231114T221320Z.log")));
    }

    #[test]
    fn test_stderr_sink() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        assert_eq!(LogSink::choose(&config, false, at()), LogSink::Stderr);

        config.logging.to_file = false;
        assert_eq!(LogSink::choose(&config, true, at()), LogSink::Stderr);
        assert_eq!(LogSink::Stderr.path(), None);
    }

    #[test]
    fn test_default_logs_path() {
        let config = Config::default();
        assert!(config.logs_path().ends_with("timeconv/logs"));
    }

    #[test]
    fn test_filter_directive_precedence() {
        let mut config = Config::default();
        config.logging.level = " warn ".to_string();

        assert_eq!(filter_directive(&config, false, None), "warn");
        assert_eq!(filter_directive(&config, true, None), "debug");
        assert_eq!(filter_directive(&config, true, Some("timeconv=trace".to_string())), "timeconv=trace");
        assert_eq!(filter_directive(&config, false, Some("  ".to_string())), "warn");
    }

    #[test]
    fn test_malformed_level_falls_back() {
        let (_, rejected) = build_filter("timeconv::flow=debug");
        assert_eq!(rejected, None);

        let (_, rejected) = build_filter("timeconv=loud");
        assert_eq!(rejected.as_deref(), Some("timeconv=loud"));
    }

    #[test]
    fn test_prune_keeps_newest_log_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for day in 10..15 {
            std::fs::write(dir.join(format!("timeconv-202311{day}T000000Z.log")), "").unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.join("timeconv-archive.log")).unwrap();

        assert_eq!(prune_logs(dir, 2).unwrap(), 3);

        let mut left: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "notes.txt",
                "timeconv-20231113T000000Z.log",
                "timeconv-20231114T000000Z.log",
                "timeconv-archive.log",
            ]
        );

        assert_eq!(prune_logs(dir, 2).unwrap(), 0);
    }
}
