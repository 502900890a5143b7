//! One conversion command: gathers arguments, converts, delivers

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::Mutex as AsyncMutex;

use super::steps::StepFactory;
use super::{CommandError, CommandId, CommandOptions};
use crate::config::Config;
use crate::convert::{Conversion, Converter};
use crate::flow::{ChoiceStep, StartPosition, Step, StepSequencer};
use crate::host::{EditorHost, ResultAction, ResultView};

/// Sequencer and the parameter steps it was built from
struct CommandState {
    sequencer: StepSequencer,
    /// One step per parameter, in parameter order
    parameter_steps: Vec<Arc<dyn Step>>,
}

impl CommandState {
    /// Restore the registered step list and pre-supply `options`
    fn prepare(&mut self, parameters: &[&str], choices: &[Arc<ChoiceStep>], options: &CommandOptions) {
        // An "other" alternative left over from the previous run would
        // otherwise follow its choice even when the choice is pre-supplied
        for choice in choices {
            if let Some(alternative) = choice.alternative() {
                self.sequencer.unregister_step(alternative);
            }
        }

        self.sequencer.clear_given_results();
        for (parameter, step) in parameters.iter().zip(&self.parameter_steps) {
            let Some(index) = self.sequencer.position(step) else {
                continue;
            };
            let value = options.get(parameter).map(str::to_string);
            self.sequencer.set_step_result(value, index);
        }
    }
}

/// Palette command running one conversion
pub struct ConversionCommand {
    id: CommandId,
    conversion: Conversion,
    factory: StepFactory,
    converter: Converter,
    editor: Arc<dyn EditorHost>,
    config: Arc<RwLock<Config>>,
    /// Created on first execution and reused; the lock also keeps a single
    /// run in flight
    state: AsyncMutex<Option<CommandState>>,
    format_choices: Mutex<Vec<Arc<ChoiceStep>>>,
}

impl ConversionCommand {
    pub fn new(
        conversion: Conversion,
        factory: StepFactory,
        converter: Converter,
        editor: Arc<dyn EditorHost>,
        config: Arc<RwLock<Config>>,
    ) -> Self {
        Self {
            id: CommandId::Convert(conversion),
            conversion,
            factory,
            converter,
            editor,
            config,
            state: AsyncMutex::new(None),
            format_choices: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn conversion(&self) -> Conversion {
        self.conversion
    }

    fn settings(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn format_choices(&self) -> Vec<Arc<ChoiceStep>> {
        self.format_choices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refresh the items of the format choices, if already built
    pub fn update_formats(&self, formats: &[String]) {
        let items = self.factory.format_items(formats);
        for choice in self.format_choices() {
            if choice.is_dynamic() {
                choice.update_items(items.clone());
            }
        }
    }

    fn create_state(&self, settings: &Config) -> CommandState {
        let built = self
            .factory
            .build(self.conversion, self.id.title(), &settings.custom_formats);
        *self
            .format_choices
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = built.format_choices;

        let mut sequencer = StepSequencer::new();
        for step in &built.steps {
            sequencer.register_step(Arc::clone(step), None);
        }
        tracing::debug!(command = %self.id, steps = sequencer.len(), "sequencer created");
        CommandState {
            sequencer,
            parameter_steps: built.steps,
        }
    }

    /// Selected text, falling back to the clipboard when enabled
    async fn user_selection(&self, settings: &Config) -> Result<String, CommandError> {
        if let Some(selection) = self.editor.selection().filter(|s| !s.trim().is_empty()) {
            return Ok(selection.trim().to_string());
        }
        if settings.clipboard.reading_enabled {
            if let Some(text) = self.editor.read_clipboard().await? {
                return Ok(text.trim().to_string());
            }
        }
        Ok(String::new())
    }

    /// Run the command. Returns the delivered result, or `None` when the
    /// user cancelled.
    pub async fn execute(&self, options: &CommandOptions) -> Result<Option<String>, CommandError> {
        options.check(self.id)?;
        let settings = self.settings();
        tracing::info!(command = %self.id, "executing");

        if self.conversion.arity() == 0 {
            let output = self.convert(&[])?;
            return match self.present(&output, false, &settings).await? {
                ResultAction::Accept => self.deliver(output, &settings).await.map(Some),
                ResultAction::Back | ResultAction::Dismissed => Ok(None),
            };
        }

        let selection = self.user_selection(&settings).await?;
        let mut guard = self.state.lock().await;
        let state = guard.get_or_insert_with(|| self.create_state(&settings));
        let choices = self.format_choices();
        state.prepare(self.conversion.parameters(), &choices, options);

        let mut results = state
            .sequencer
            .run(settings.ignore_focus_out, &selection, StartPosition::default())
            .await?;

        loop {
            if results.is_empty() {
                tracing::debug!(command = %self.id, "cancelled");
                return Ok(None);
            }

            let output = self.convert(&results)?;
            let show_back = state.sequencer.has_interactive_steps();
            match self.present(&output, show_back, &settings).await? {
                ResultAction::Accept => return self.deliver(output, &settings).await.map(Some),
                ResultAction::Dismissed => return Ok(None),
                ResultAction::Back => {
                    results = state
                        .sequencer
                        .run(settings.ignore_focus_out, &selection, StartPosition::Last)
                        .await?;
                }
            }
        }
    }

    fn convert(&self, results: &[String]) -> Result<String, CommandError> {
        self.converter
            .convert(self.conversion, results)
            .map_err(|err| {
                tracing::warn!(command = %self.id, error = %err, "conversion failed");
                self.editor.show_error(&err.to_string());
                CommandError::from(err)
            })
    }

    async fn present(
        &self,
        output: &str,
        show_back: bool,
        settings: &Config,
    ) -> Result<ResultAction, CommandError> {
        let accept_hint = if settings.insert_converted_time {
            "insert"
        } else {
            "copy"
        };
        let view = ResultView {
            title: self.id.title().to_string(),
            result: output.to_string(),
            accept_hint: accept_hint.to_string(),
            show_back,
            ignore_focus_out: settings.ignore_focus_out,
        };
        Ok(self.editor.show_result(&view).await?)
    }

    /// Insert or copy an accepted result
    async fn deliver(&self, output: String, settings: &Config) -> Result<String, CommandError> {
        if settings.insert_converted_time {
            self.editor.replace_selection(&output).await?;
        } else if settings.clipboard.writing_enabled {
            self.editor.write_clipboard(&output).await?;
            self.editor
                .show_info(&format!("Copied '{}' to the clipboard", output));
        } else {
            self.editor.show_info(&output);
        }
        Ok(output)
    }

    /// Dispose the sequencer's steps, if built
    pub async fn dispose(&self) {
        if let Some(state) = self.state.lock().await.take() {
            state.sequencer.dispose();
        }
        self.format_choices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
