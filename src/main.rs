use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use timeconv::commands::{CommandError, CommandId, CommandOptions, CommandRegistry};
use timeconv::config::{Config, ConfigWatcher};
use timeconv::convert::Converter;
use timeconv::host::{install_panic_hook, ChoiceItem, ChoicePrompt, PromptEvent, PromptHost, TerminalHost};
use timeconv::hover::HoverProvider;
use timeconv::logging;

#[derive(Parser)]
#[command(name = "timeconv")]
#[command(about = "Convert between epoch, ISO 8601 and custom time formats")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the command palette (default)
    Run,

    /// Run one command, e.g. `convert epochToIsoUtc epoch=1700000000 unit=s`
    Convert {
        /// Command id, with or without the `timeconv.` prefix
        command: String,

        /// Pre-supplied arguments as name=value; missing ones are prompted
        options: Vec<String>,

        /// Text treated as the editor selection
        #[arg(short, long)]
        selection: Option<String>,
    },

    /// Show the hover tooltip for an integer
    Hover {
        /// Line of text
        text: String,

        /// Byte column of the hovered integer (default: whole text)
        #[arg(long)]
        column: Option<usize>,
    },

    /// List command ids and titles
    List,

    /// Flip `insert_converted_time` and save the config
    ToggleInsert,

    /// Print the JSON schema of the config file
    Schema,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    // Prompts own the terminal while running or converting
    let interactive = matches!(cli.command, None | Some(Commands::Run) | Some(Commands::Convert { .. }));

    let logging_handle = logging::init_logging(&config, interactive, cli.debug)?;
    if let Some(path) = &logging_handle.log_file_path {
        tracing::debug!(path = %path.display(), pruned = logging_handle.pruned, "logging to file");
    }
    if let Some(directive) = &logging_handle.rejected_level {
        tracing::warn!(directive = %directive, "ignoring malformed log filter, using info");
    }

    match cli.command {
        None | Some(Commands::Run) => {
            cmd_run(config, cli.config.as_deref()).await?;
        }
        Some(Commands::Convert {
            command,
            options,
            selection,
        }) => {
            return cmd_convert(config, &command, &options, selection).await;
        }
        Some(Commands::Hover { text, column }) => {
            cmd_hover(&config, &text, column);
        }
        Some(Commands::List) => {
            cmd_list();
        }
        Some(Commands::ToggleInsert) => {
            cmd_toggle_insert(config, cli.config.as_deref())?;
        }
        Some(Commands::Schema) => {
            println!("{}", Config::json_schema()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn terminal_registry(config: Config, host: &Arc<TerminalHost>) -> CommandRegistry {
    CommandRegistry::new(config, host.clone(), host.clone(), Converter::new())
}

/// Report a failed command unless the host already showed it
fn report(err: &CommandError) {
    tracing::warn!(error = %err, "command failed");
    if !matches!(err, CommandError::Conversion(_)) {
        eprintln!("error: {}", err);
    }
}

async fn cmd_run(config: Config, config_path: Option<&str>) -> Result<()> {
    install_panic_hook();

    let host = Arc::new(TerminalHost::default());
    let registry = terminal_registry(config, &host);

    let watched = config_path.map(PathBuf::from).or_else(Config::user_config_path);
    let watcher = watched.and_then(|path| match ConfigWatcher::new(path) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            tracing::warn!(error = %err, "config changes will not be picked up");
            None
        }
    });

    let ids = registry.command_ids();
    let palette_id = uuid::Uuid::new_v4();
    let mut last = None;

    loop {
        if let Some(watcher) = &watcher {
            if watcher.changed() {
                match Config::load(config_path) {
                    Ok(config) => {
                        tracing::info!(path = %watcher.path().display(), "config reloaded");
                        registry.update_config(config);
                    }
                    Err(err) => tracing::warn!(error = %err, "ignoring invalid config"),
                }
            }
        }

        let prompt = ChoicePrompt {
            id: palette_id,
            title: "timeconv".to_string(),
            placeholder: "Type to filter commands".to_string(),
            items: ids
                .iter()
                .map(|id| ChoiceItem::new(id.title()).with_description(id.id()))
                .collect(),
            active: last,
            step: 1,
            total_steps: 1,
            show_back: false,
            ignore_focus_out: true,
        };

        let PromptEvent::Accepted(index) = host.prompt_choice(&prompt).await? else {
            break;
        };
        let Some(id) = ids.get(index).copied() else {
            continue;
        };
        last = Some(index);

        if let Err(err) = registry.execute(id, &CommandOptions::new()).await {
            report(&err);
        }
    }

    registry.dispose().await;
    Ok(())
}

async fn cmd_convert(
    config: Config,
    command: &str,
    options: &[String],
    selection: Option<String>,
) -> Result<ExitCode> {
    install_panic_hook();

    let options = CommandOptions::parse_pairs(options)?;
    let host = Arc::new(TerminalHost::new(selection));
    let registry = terminal_registry(config, &host);

    let outcome = registry.execute_id(command, &options).await;
    registry.dispose().await;

    match outcome {
        Ok(Some(result)) => {
            tracing::debug!(%result, "command finished");
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            report(&err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_hover(config: &Config, text: &str, column: Option<usize>) {
    let provider = HoverProvider::new(config.hover.clone(), Converter::new());
    let lines = match column {
        Some(column) => provider
            .hover_at(text, column)
            .map(|hover| hover.lines)
            .unwrap_or_default(),
        None => provider.describe(text.trim()),
    };

    if lines.is_empty() {
        eprintln!("Nothing to show");
        return;
    }
    for line in lines {
        println!("{}", line);
    }
}

fn cmd_list() {
    let ids = CommandId::all();
    let width = ids.iter().map(|id| id.id().len()).max().unwrap_or(0);
    for id in ids {
        let parameters = id.parameters().join(", ");
        println!("{:width$}  {}  [{}]", id.id(), id.title(), parameters, width = width);
    }
}

fn cmd_toggle_insert(mut config: Config, config_path: Option<&str>) -> Result<()> {
    config.insert_converted_time = !config.insert_converted_time;

    let path = match config_path {
        Some(path) => {
            config.save_to(Path::new(path))?;
            PathBuf::from(path)
        }
        None => config.save().context("Failed to save config")?,
    };

    println!(
        "insert_converted_time = {} ({})",
        config.insert_converted_time,
        path.display()
    );
    Ok(())
}
