//! Host collaborator abstraction layer.
//!
//! The conversion flows never render anything themselves. They talk to a
//! host through two traits:
//! - `PromptHost`: shows one interactive prompt and reports exactly one
//!   terminal event (accept, back or dismiss)
//! - `EditorHost`: selection, clipboard and result-view access
//!
//! Implementations exist for a ratatui terminal (used by the CLI) and for
//! scripted mocks (used by tests).

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod mock;
pub mod terminal;

pub use mock::{MockEditorHost, MockPromptHost, MockResponse, ShownPrompt};
pub use terminal::{install_panic_hook, TerminalHost};

/// Errors raised by a host while showing a prompt or touching the editor
#[derive(Error, Debug)]
pub enum HostError {
    #[error("host is not available: {0}")]
    NotAvailable(String),

    #[error("prompt '{0}' failed: {1}")]
    PromptFailed(String, String),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The single terminal event of one prompt interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent<T> {
    /// The user accepted the prompt
    Accepted(T),
    /// The user triggered the back affordance
    Back,
    /// The prompt was closed without accepting (escape, focus loss)
    Dismissed,
}

/// One selectable entry of a choice prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceItem {
    pub label: String,
    pub description: Option<String>,
    pub detail: Option<String>,
    /// Value recorded when this item is picked; falls back to the label
    pub value: Option<String>,
}

impl ChoiceItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            detail: None,
            value: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// The value recorded in the step results
    pub fn result_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.label)
    }
}

/// Free-text prompt as handed to the host
#[derive(Debug, Clone)]
pub struct TextPrompt {
    /// Identity of the owning step's prompt widget
    pub id: Uuid,
    pub title: String,
    pub prompt: String,
    pub placeholder: String,
    /// Pre-filled value (kept from a previous visit of the same step)
    pub value: String,
    /// Diagnostic shown under the input, if any
    pub validation_message: Option<String>,
    /// 1-based progress indicator
    pub step: usize,
    pub total_steps: usize,
    pub show_back: bool,
    pub ignore_focus_out: bool,
}

/// Selection-list prompt as handed to the host
#[derive(Debug, Clone)]
pub struct ChoicePrompt {
    pub id: Uuid,
    pub title: String,
    pub placeholder: String,
    pub items: Vec<ChoiceItem>,
    /// Index of the item highlighted when the prompt opens
    pub active: Option<usize>,
    pub step: usize,
    pub total_steps: usize,
    pub show_back: bool,
    pub ignore_focus_out: bool,
}

/// Live validation callback: returns the diagnostic for invalid input
pub type LiveValidator<'a> = &'a (dyn Fn(&str) -> Option<String> + Send + Sync);

/// Renders interactive prompts
///
/// Each call resolves exactly once with the event that closed the prompt.
#[async_trait]
pub trait PromptHost: Send + Sync {
    /// Show a free-text prompt. `validate` may be called on every edit to
    /// refresh the diagnostic.
    async fn prompt_text(
        &self,
        prompt: &TextPrompt,
        validate: LiveValidator<'_>,
    ) -> Result<PromptEvent<String>, HostError>;

    /// Show a selection list; accepts with the index of the picked item
    async fn prompt_choice(&self, prompt: &ChoicePrompt) -> Result<PromptEvent<usize>, HostError>;

    /// Release the widget identified by `prompt_id`
    fn release(&self, _prompt_id: Uuid) {}
}

/// Outcome of the result view shown after a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAction {
    /// Use the result (insert or copy)
    Accept,
    /// Reopen the last input step
    Back,
    Dismissed,
}

/// Result view as handed to the host
#[derive(Debug, Clone)]
pub struct ResultView {
    pub title: String,
    pub result: String,
    /// Hint describing what accepting does ("insert" / "copy")
    pub accept_hint: String,
    pub show_back: bool,
    pub ignore_focus_out: bool,
}

/// Editor-side bindings: selection, clipboard and messages
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Text selected when the command was invoked
    fn selection(&self) -> Option<String>;

    /// Replace the current selection (or insert at the cursor)
    async fn replace_selection(&self, text: &str) -> Result<(), HostError>;

    async fn read_clipboard(&self) -> Result<Option<String>, HostError>;

    async fn write_clipboard(&self, text: &str) -> Result<(), HostError>;

    /// Present a conversion result and wait for the user's decision
    async fn show_result(&self, view: &ResultView) -> Result<ResultAction, HostError>;

    fn show_info(&self, message: &str);

    fn show_error(&self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_item_result_value_falls_back_to_label() {
        let item = ChoiceItem::new("YYYY");
        assert_eq!(item.result_value(), "YYYY");

        let item = ChoiceItem::new("Milliseconds").with_value("ms");
        assert_eq!(item.result_value(), "ms");
    }

    #[test]
    fn test_host_error_display() {
        let err = HostError::PromptFailed("epoch".to_string(), "closed".to_string());
        assert_eq!(err.to_string(), "prompt 'epoch' failed: closed");
    }
}
