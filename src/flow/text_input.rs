//! Free-text input step with validation

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::result::StepResult;
use super::sequencer::StepSequencer;
use super::step::{Step, StepContext};
use crate::host::{HostError, PromptEvent, PromptHost, TextPrompt};

/// Placeholder replaced by the previous step's result when rendering
pub const PRIOR_RESULT_TOKEN: &str = "$(prior-result)";

/// Predicate over (input, previous result)
pub type Validator = Arc<dyn Fn(&str, Option<&str>) -> bool + Send + Sync>;

/// Prompts for a line of text and accepts it once the validator agrees
pub struct TextInputStep {
    id: Uuid,
    name: String,
    host: Arc<dyn PromptHost>,
    title: String,
    prompt: String,
    placeholder: String,
    validator: Validator,
    validation_message: String,
    skip: bool,
    unregister_on_back: bool,
    value: Mutex<Option<String>>,
}

impl TextInputStep {
    pub fn builder(name: impl Into<String>, host: Arc<dyn PromptHost>) -> TextInputStepBuilder {
        TextInputStepBuilder {
            name: name.into(),
            host,
            title: String::new(),
            prompt: String::new(),
            placeholder: String::new(),
            validator: Arc::new(|_, _| true),
            validation_message: "Invalid input".to_string(),
            skip: false,
            unregister_on_back: false,
        }
    }

    /// Value remembered from the last accepted or rejected input
    pub fn current_value(&self) -> Option<String> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember(&self, value: Option<String>) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

/// Builder for `TextInputStep`
pub struct TextInputStepBuilder {
    name: String,
    host: Arc<dyn PromptHost>,
    title: String,
    prompt: String,
    placeholder: String,
    validator: Validator,
    validation_message: String,
    skip: bool,
    unregister_on_back: bool,
}

impl TextInputStepBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.validator = Arc::new(validator);
        self
    }

    pub fn validation_message(mut self, message: impl Into<String>) -> Self {
        self.validation_message = message.into();
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn unregister_on_back(mut self, unregister: bool) -> Self {
        self.unregister_on_back = unregister;
        self
    }

    pub fn build(self) -> Arc<TextInputStep> {
        Arc::new(TextInputStep {
            id: Uuid::new_v4(),
            name: self.name,
            host: self.host,
            title: self.title,
            prompt: self.prompt,
            placeholder: self.placeholder,
            validator: self.validator,
            validation_message: self.validation_message,
            skip: self.skip,
            unregister_on_back: self.unregister_on_back,
            value: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Step for TextInputStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, input: &str, previous: Option<&str>) -> bool {
        (self.validator)(input, previous)
    }

    fn skip(&self) -> bool {
        self.skip
    }

    fn unregister_on_back(&self) -> bool {
        self.unregister_on_back
    }

    async fn execute(
        &self,
        sequencer: &mut StepSequencer,
        ctx: StepContext,
    ) -> Result<StepResult, HostError> {
        // Rendered per execution: the previous result may have changed since
        // the last visit.
        let previous = sequencer.previous_result_at(ctx.index).map(str::to_string);
        let render = |template: &str| {
            template.replace(PRIOR_RESULT_TOKEN, previous.as_deref().unwrap_or_default())
        };
        let invalid_message = render(&self.validation_message);

        let mut prompt = TextPrompt {
            id: self.id,
            title: render(&self.title),
            prompt: render(&self.prompt),
            placeholder: render(&self.placeholder),
            value: self.current_value().unwrap_or_default(),
            validation_message: None,
            step: ctx.display_index,
            total_steps: ctx.display_total,
            show_back: ctx.show_back(),
            ignore_focus_out: ctx.ignore_focus_out,
        };

        let validator = Arc::clone(&self.validator);
        let live_previous = previous.clone();
        let live_message = invalid_message.clone();
        let live = move |input: &str| {
            if validator(input, live_previous.as_deref()) {
                None
            } else {
                Some(live_message.clone())
            }
        };

        loop {
            match self.host.prompt_text(&prompt, &live).await? {
                PromptEvent::Accepted(text) => {
                    self.remember(Some(text.clone()));
                    if self.validate(&text, previous.as_deref()) {
                        return Ok(StepResult::proceed(text));
                    }
                    tracing::debug!(step = %self.name, input = %text, "input rejected");
                    prompt.value = text;
                    prompt.validation_message = Some(invalid_message.clone());
                }
                PromptEvent::Back => return Ok(StepResult::back()),
                PromptEvent::Dismissed => return Ok(StepResult::cancel()),
            }
        }
    }

    fn reset(&self) {
        self.remember(None);
    }

    fn dispose(&self) {
        self.host.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::StartPosition;
    use crate::host::{MockPromptHost, MockResponse};

    fn digits_step(host: &MockPromptHost) -> Arc<TextInputStep> {
        TextInputStep::builder("digits", Arc::new(host.clone()))
            .title("Digits")
            .prompt("Enter digits after $(prior-result)")
            .validator(|input, _| !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()))
            .validation_message("'$(prior-result)' must be followed by digits")
            .build()
    }

    fn plain_step(host: &MockPromptHost, name: &str) -> Arc<TextInputStep> {
        TextInputStep::builder(name, Arc::new(host.clone()))
            .title(name)
            .build()
    }

    #[tokio::test]
    async fn test_prior_result_substituted_at_render_time() {
        let host = MockPromptHost::scripted([
            MockResponse::text("first"),
            MockResponse::text("1"),
            MockResponse::text("second"),
            MockResponse::text("2"),
        ]);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(plain_step(&host, "prefix"), None);
        sequencer.register_step(digits_step(&host), None);

        let first = sequencer.run(false, "", StartPosition::default()).await.unwrap();
        let second = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(first, vec!["first", "1"]);
        assert_eq!(second, vec!["second", "2"]);
        let prompts: Vec<String> = host.shown_prompts().into_iter().map(|p| p.prompt).collect();
        assert_eq!(prompts[1], "Enter digits after first");
        assert_eq!(prompts[3], "Enter digits after second");
    }

    #[tokio::test]
    async fn test_prior_result_empty_for_first_step() {
        let host = MockPromptHost::scripted([MockResponse::text("7")]);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(digits_step(&host), None);

        sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(host.shown_prompts()[0].prompt, "Enter digits after ");
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts_with_message() {
        let host = MockPromptHost::scripted([
            MockResponse::text("base"),
            MockResponse::text("abc"),
            MockResponse::text("42"),
        ]);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(plain_step(&host, "prefix"), None);
        sequencer.register_step(digits_step(&host), None);

        let results = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(results, vec!["base", "42"]);
        let shown = host.shown_prompts();
        assert_eq!(shown.len(), 3);
        assert_eq!(shown[2].value, "abc");
        assert_eq!(
            shown[2].validation_message.as_deref(),
            Some("'base' must be followed by digits")
        );
        let diagnostics = host.diagnostics.lock().unwrap().clone();
        assert_eq!(diagnostics[1].as_deref(), Some("'base' must be followed by digits"));
        assert_eq!(diagnostics[2], None);
    }

    #[tokio::test]
    async fn test_back_and_dismiss_map_to_actions() {
        let host = MockPromptHost::scripted([MockResponse::Back, MockResponse::Dismiss]);
        let step = digits_step(&host);
        let mut sequencer = StepSequencer::new();
        let ctx = StepContext {
            index: 0,
            display_index: 2,
            display_total: 2,
            ignore_focus_out: false,
        };

        let back = step.execute(&mut sequencer, ctx).await.unwrap();
        let cancel = step.execute(&mut sequencer, ctx).await.unwrap();

        assert_eq!(back, StepResult::back());
        assert_eq!(cancel, StepResult::cancel());
        assert!(host.shown_prompts()[0].show_back);
    }

    #[tokio::test]
    async fn test_value_redisplayed_on_back_and_cleared_by_reset() {
        let host = MockPromptHost::scripted([
            MockResponse::text("a"),
            MockResponse::text("b"),
            MockResponse::Back,
            MockResponse::text("a2"),
            MockResponse::text("b2"),
        ]);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(plain_step(&host, "one"), None);
        sequencer.register_step(plain_step(&host, "two"), None);
        sequencer.register_step(plain_step(&host, "three"), None);

        let results = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(results, vec!["a", "a2", "b2"]);
        let shown = host.shown_prompts();
        // Re-entering "two" shows the value typed on the first visit
        assert_eq!(shown[3].title, "two");
        assert_eq!(shown[3].value, "b");

        host.push_responses([
            MockResponse::text("x"),
            MockResponse::text("y"),
            MockResponse::text("z"),
        ]);
        sequencer.run(false, "", StartPosition::default()).await.unwrap();
        let shown = host.shown_prompts();
        assert!(shown[5..].iter().all(|p| p.value.is_empty()));
    }

    #[tokio::test]
    async fn test_dispose_releases_prompt() {
        let host = MockPromptHost::new();
        let step = digits_step(&host);
        step.dispose();
        assert_eq!(host.released.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_default_validator_accepts_anything() {
        let host = MockPromptHost::new();
        let step = plain_step(&host, "any");
        assert!(step.validate("", None));
        assert!(!step.skip());
        assert!(!step.unregister_on_back());
    }
}
