use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use crate::convert::EpochUnit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Custom formats offered by the format choice (moment-style tokens)
    #[serde(default = "default_custom_formats")]
    pub custom_formats: Vec<String>,

    /// Replace the selection with the converted time instead of copying it
    #[serde(default)]
    pub insert_converted_time: bool,

    /// Keep prompts open when they lose focus
    #[serde(default = "default_ignore_focus_out")]
    pub ignore_focus_out: bool,

    #[serde(default)]
    pub hover: HoverConfig,

    #[serde(default)]
    pub clipboard: ClipboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_custom_formats() -> Vec<String> {
    vec![
        "YYYY-MM-DD HH:mm:ss".to_string(),
        "DD.MM.YYYY HH:mm:ss".to_string(),
        "MM/DD/YYYY h:mm:ss A".to_string(),
    ]
}

fn default_ignore_focus_out() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HoverConfig {
    #[serde(default)]
    pub timestamp: TimestampHoverConfig,
    #[serde(default)]
    pub duration: DurationHoverConfig,
}

/// Tooltip for integers that look like epoch timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimestampHoverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `utc`, `local`, `iso8601` or a custom format, one line each
    #[serde(default = "default_target_formats")]
    pub target_formats: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_target_formats() -> Vec<String> {
    vec!["utc".to_string(), "local".to_string()]
}

impl Default for TimestampHoverConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            target_formats: default_target_formats(),
        }
    }
}

/// Tooltip rendering integers as durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DurationHoverConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_duration_unit")]
    pub source_unit: EpochUnit,
    /// ISO 8601 (`P1DT2H`) instead of the readable `1d 2h`
    #[serde(default)]
    pub use_iso_target: bool,
}

fn default_duration_unit() -> EpochUnit {
    EpochUnit::Ms
}

impl Default for DurationHoverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source_unit: default_duration_unit(),
            use_iso_target: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipboardConfig {
    /// Use the clipboard as input when nothing is selected
    #[serde(default)]
    pub reading_enabled: bool,
    /// Copy results to the clipboard when they are not inserted
    #[serde(default = "default_true")]
    pub writing_enabled: bool,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            reading_enabled: false,
            writing_enabled: default_true(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file instead of stderr; interactive prompts draw on
    /// the terminal so this defaults on
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,

    /// Directory for log files (default: the platform data directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
            dir: None,
        }
    }
}

impl Config {
    /// `~/.config/timeconv/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("timeconv").join("config.toml"))
    }

    /// Directory for log files
    pub fn logs_path(&self) -> PathBuf {
        if let Some(dir) = &self.logging.dir {
            return PathBuf::from(dir);
        }
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("timeconv")
            .join("logs")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_layers(Self::user_config_path().as_deref(), config_path.map(Path::new))
    }

    /// Layer embedded defaults, the user config, an explicit file and
    /// `TIMECONV__*` environment variables, later layers winning
    pub fn load_layers(user_config: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(user_config) = user_config.filter(|p| p.exists()) {
            builder = builder.add_source(config::File::from(user_config));
        }

        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TIMECONV")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save to the user config file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::user_config_path().context("No user config directory available")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// JSON schema of the settings, pretty-printed
    pub fn json_schema() -> Result<String> {
        let schema = schema_for!(Config);
        serde_json::to_string_pretty(&schema).context("Failed to serialize config schema")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            custom_formats: default_custom_formats(),
            insert_converted_time: false,
            ignore_focus_out: default_ignore_focus_out(),
            hover: HoverConfig::default(),
            clipboard: ClipboardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Reports changes to a config file
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<Result<Event, notify::Error>>,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Watch the directory holding `path` so that editors replacing the
    /// file are noticed too
    pub fn new(path: PathBuf) -> Result<Self> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain pending events (non-blocking); true if any touched the file
    pub fn changed(&self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.receiver.try_recv() {
            if let Ok(event) = event {
                changed |= self.is_relevant(&event);
            }
        }
        changed
    }

    fn is_relevant(&self, event: &Event) -> bool {
        use notify::EventKind;

        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.file_name() == self.path.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.custom_formats.len(), 3);
        assert!(!config.insert_converted_time);
        assert!(config.ignore_focus_out);
        assert!(config.hover.timestamp.enabled);
        assert!(!config.hover.duration.enabled);
        assert_eq!(config.hover.duration.source_unit, EpochUnit::Ms);
        assert!(!config.clipboard.reading_enabled);
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
custom_formats = ["DD/MM/YYYY"]
insert_converted_time = true

[hover.duration]
enabled = true
source_unit = "s"
"#,
        )
        .unwrap();

        let config = Config::load_layers(None, Some(&path)).unwrap();
        assert_eq!(config.custom_formats, vec!["DD/MM/YYYY".to_string()]);
        assert!(config.insert_converted_time);
        assert!(config.hover.duration.enabled);
        assert_eq!(config.hover.duration.source_unit, EpochUnit::S);
        // Untouched sections keep their defaults
        assert_eq!(config.hover.timestamp.target_formats, default_target_formats());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_explicit_file_wins_over_user_config() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        let explicit = temp_dir.path().join("explicit.toml");
        std::fs::write(&user, "insert_converted_time = true\nignore_focus_out = false\n").unwrap();
        std::fs::write(&explicit, "insert_converted_time = false\n").unwrap();

        let config = Config::load_layers(Some(&user), Some(&explicit)).unwrap();
        assert!(!config.insert_converted_time);
        assert!(!config.ignore_focus_out);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.custom_formats.push("HH:mm".to_string());
        config.clipboard.reading_enabled = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_layers(None, Some(&path)).unwrap();
        assert_eq!(loaded.custom_formats, config.custom_formats);
        assert!(loaded.clipboard.reading_enabled);
    }

    #[test]
    fn test_json_schema_lists_settings() {
        let schema = Config::json_schema().unwrap();
        assert!(schema.contains("custom_formats"));
        assert!(schema.contains("insert_converted_time"));
        assert!(schema.contains("source_unit"));
    }

    #[test]
    fn test_watcher_reports_file_changes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "insert_converted_time = false\n").unwrap();

        let watcher = ConfigWatcher::new(path.clone()).unwrap();
        assert!(!watcher.changed());

        std::fs::write(&path, "insert_converted_time = true\n").unwrap();
        let mut seen = false;
        for _ in 0..50 {
            if watcher.changed() {
                seen = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        assert!(seen);
    }
}
