//! All palette commands, dispatched by id

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::command::ConversionCommand;
use super::steps::StepFactory;
use super::{CommandError, CommandId, CommandOptions};
use crate::config::Config;
use crate::convert::{Conversion, Converter};
use crate::host::{EditorHost, PromptHost};

/// Owns every command and the configuration they read
pub struct CommandRegistry {
    config: Arc<RwLock<Config>>,
    editor: Arc<dyn EditorHost>,
    commands: BTreeMap<Conversion, ConversionCommand>,
}

impl CommandRegistry {
    pub fn new(
        config: Config,
        prompts: Arc<dyn PromptHost>,
        editor: Arc<dyn EditorHost>,
        converter: Converter,
    ) -> Self {
        let config = Arc::new(RwLock::new(config));
        let factory = StepFactory::new(prompts, converter);
        let commands = Conversion::all()
            .iter()
            .map(|conversion| {
                let command = ConversionCommand::new(
                    *conversion,
                    factory.clone(),
                    converter,
                    Arc::clone(&editor),
                    Arc::clone(&config),
                );
                (*conversion, command)
            })
            .collect();

        Self {
            config,
            editor,
            commands,
        }
    }

    /// Every command id, in palette order
    pub fn command_ids(&self) -> Vec<CommandId> {
        CommandId::all()
    }

    pub fn command(&self, conversion: Conversion) -> Option<&ConversionCommand> {
        self.commands.get(&conversion)
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run the command registered under `id` (full or bare name)
    pub async fn execute_id(
        &self,
        id: &str,
        options: &CommandOptions,
    ) -> Result<Option<String>, CommandError> {
        self.execute(id.parse()?, options).await
    }

    pub async fn execute(
        &self,
        id: CommandId,
        options: &CommandOptions,
    ) -> Result<Option<String>, CommandError> {
        match id {
            CommandId::Convert(conversion) => {
                let command = self
                    .commands
                    .get(&conversion)
                    .ok_or_else(|| CommandError::UnknownCommand(id.id()))?;
                command.execute(options).await
            }
            CommandId::ToggleInsertConvertedTime => {
                options.check(id)?;
                let enabled = self.toggle_insert_converted_time();
                Ok(Some(enabled.to_string()))
            }
        }
    }

    /// Flip `insert_converted_time`; returns the new value
    pub fn toggle_insert_converted_time(&self) -> bool {
        let enabled = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            config.insert_converted_time = !config.insert_converted_time;
            config.insert_converted_time
        };
        let message = if enabled {
            "Converted times will be inserted"
        } else {
            "Converted times will be copied"
        };
        tracing::info!(enabled, "insert converted time toggled");
        self.editor.show_info(message);
        enabled
    }

    /// Adopt a reloaded configuration and refresh the format choices
    pub fn update_config(&self, config: Config) {
        let formats_changed = self.config().custom_formats != config.custom_formats;
        let formats = config.custom_formats.clone();
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;

        if formats_changed {
            tracing::info!(count = formats.len(), "custom formats changed");
            for command in self.commands.values() {
                command.update_formats(&formats);
            }
        }
    }

    /// Dispose every command's steps
    pub async fn dispose(&self) {
        for command in self.commands.values() {
            command.dispose().await;
        }
    }
}
