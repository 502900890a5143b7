//! Scripted host implementations for testing.
//!
//! `MockPromptHost` answers prompts from a queue of `MockResponse`s and
//! records every prompt it was asked to show. `MockEditorHost` keeps the
//! selection, clipboard and result-view decisions in memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    ChoicePrompt, EditorHost, HostError, LiveValidator, PromptEvent, PromptHost, ResultAction,
    ResultView, TextPrompt,
};

/// One scripted answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Accept a text prompt with this input
    Text(String),
    /// Accept a choice prompt by item label
    Pick(String),
    /// Accept a choice prompt by item index
    PickIndex(usize),
    Back,
    Dismiss,
}

impl MockResponse {
    pub fn text(value: impl Into<String>) -> Self {
        MockResponse::Text(value.into())
    }

    pub fn pick(label: impl Into<String>) -> Self {
        MockResponse::Pick(label.into())
    }
}

/// Kind of prompt that was shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Text,
    Choice,
}

/// Snapshot of a prompt as the host saw it
#[derive(Debug, Clone)]
pub struct ShownPrompt {
    pub kind: PromptKind,
    pub id: Uuid,
    pub title: String,
    pub prompt: String,
    pub placeholder: String,
    pub value: String,
    pub validation_message: Option<String>,
    pub step: usize,
    pub total_steps: usize,
    pub show_back: bool,
    pub labels: Vec<String>,
    pub active_label: Option<String>,
}

/// Prompt host answering from a script
#[derive(Default, Clone)]
pub struct MockPromptHost {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Every prompt shown, in order
    pub shown: Arc<Mutex<Vec<ShownPrompt>>>,
    /// Diagnostics produced by live validation, in order
    pub diagnostics: Arc<Mutex<Vec<Option<String>>>>,
    /// Prompt ids released through `release`
    pub released: Arc<Mutex<Vec<Uuid>>>,
}

impl MockPromptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host that answers with `responses` in order
    pub fn scripted(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        let host = Self::new();
        host.push_responses(responses);
        host
    }

    pub fn push_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        self.responses.lock().unwrap().extend(responses);
    }

    /// Responses not consumed yet
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    pub fn shown_prompts(&self) -> Vec<ShownPrompt> {
        self.shown.lock().unwrap().clone()
    }

    /// Titles of all prompts shown so far
    pub fn shown_titles(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.title.clone())
            .collect()
    }

    fn next_response(&self, title: &str) -> Result<MockResponse, HostError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| HostError::PromptFailed(title.to_string(), "script exhausted".into()))
    }
}

#[async_trait]
impl PromptHost for MockPromptHost {
    async fn prompt_text(
        &self,
        prompt: &TextPrompt,
        validate: LiveValidator<'_>,
    ) -> Result<PromptEvent<String>, HostError> {
        self.shown.lock().unwrap().push(ShownPrompt {
            kind: PromptKind::Text,
            id: prompt.id,
            title: prompt.title.clone(),
            prompt: prompt.prompt.clone(),
            placeholder: prompt.placeholder.clone(),
            value: prompt.value.clone(),
            validation_message: prompt.validation_message.clone(),
            step: prompt.step,
            total_steps: prompt.total_steps,
            show_back: prompt.show_back,
            labels: Vec::new(),
            active_label: None,
        });

        match self.next_response(&prompt.title)? {
            MockResponse::Text(text) => {
                self.diagnostics.lock().unwrap().push(validate(&text));
                Ok(PromptEvent::Accepted(text))
            }
            MockResponse::Back => Ok(PromptEvent::Back),
            MockResponse::Dismiss => Ok(PromptEvent::Dismissed),
            other => Err(HostError::PromptFailed(
                prompt.title.clone(),
                format!("unexpected response for text prompt: {:?}", other),
            )),
        }
    }

    async fn prompt_choice(&self, prompt: &ChoicePrompt) -> Result<PromptEvent<usize>, HostError> {
        let labels: Vec<String> = prompt.items.iter().map(|i| i.label.clone()).collect();
        self.shown.lock().unwrap().push(ShownPrompt {
            kind: PromptKind::Choice,
            id: prompt.id,
            title: prompt.title.clone(),
            prompt: String::new(),
            placeholder: prompt.placeholder.clone(),
            value: String::new(),
            validation_message: None,
            step: prompt.step,
            total_steps: prompt.total_steps,
            show_back: prompt.show_back,
            active_label: prompt.active.and_then(|i| labels.get(i).cloned()),
            labels: labels.clone(),
        });

        match self.next_response(&prompt.title)? {
            MockResponse::Pick(label) => labels
                .iter()
                .position(|l| *l == label)
                .map(PromptEvent::Accepted)
                .ok_or_else(|| {
                    HostError::PromptFailed(prompt.title.clone(), format!("no item '{}'", label))
                }),
            MockResponse::PickIndex(index) if index < labels.len() => {
                Ok(PromptEvent::Accepted(index))
            }
            MockResponse::Back => Ok(PromptEvent::Back),
            MockResponse::Dismiss => Ok(PromptEvent::Dismissed),
            other => Err(HostError::PromptFailed(
                prompt.title.clone(),
                format!("unexpected response for choice prompt: {:?}", other),
            )),
        }
    }

    fn release(&self, prompt_id: Uuid) {
        self.released.lock().unwrap().push(prompt_id);
    }
}

/// Editor host keeping everything in memory
#[derive(Default, Clone)]
pub struct MockEditorHost {
    pub selection: Arc<Mutex<Option<String>>>,
    pub clipboard: Arc<Mutex<Option<String>>>,
    /// Texts written through `replace_selection`
    pub inserted: Arc<Mutex<Vec<String>>>,
    /// Result views shown, in order
    pub results: Arc<Mutex<Vec<ResultView>>>,
    /// Scripted result-view decisions; `Accept` once exhausted
    result_actions: Arc<Mutex<VecDeque<ResultAction>>>,
    pub infos: Arc<Mutex<Vec<String>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl MockEditorHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(selection: impl Into<String>) -> Self {
        let host = Self::new();
        *host.selection.lock().unwrap() = Some(selection.into());
        host
    }

    pub fn set_clipboard(&self, text: impl Into<String>) {
        *self.clipboard.lock().unwrap() = Some(text.into());
    }

    pub fn push_result_actions(&self, actions: impl IntoIterator<Item = ResultAction>) {
        self.result_actions.lock().unwrap().extend(actions);
    }

    pub fn shown_results(&self) -> Vec<String> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.result.clone())
            .collect()
    }

    pub fn inserted_texts(&self) -> Vec<String> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

#[async_trait]
impl EditorHost for MockEditorHost {
    fn selection(&self) -> Option<String> {
        self.selection.lock().unwrap().clone()
    }

    async fn replace_selection(&self, text: &str) -> Result<(), HostError> {
        self.inserted.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn read_clipboard(&self) -> Result<Option<String>, HostError> {
        Ok(self.clipboard.lock().unwrap().clone())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), HostError> {
        *self.clipboard.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    async fn show_result(&self, view: &ResultView) -> Result<ResultAction, HostError> {
        self.results.lock().unwrap().push(view.clone());
        Ok(self
            .result_actions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ResultAction::Accept))
    }

    fn show_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ChoiceItem;

    fn choice_prompt(labels: &[&str]) -> ChoicePrompt {
        ChoicePrompt {
            id: Uuid::new_v4(),
            title: "Pick".to_string(),
            placeholder: String::new(),
            items: labels.iter().map(|l| ChoiceItem::new(*l)).collect(),
            active: Some(1),
            step: 1,
            total_steps: 1,
            show_back: false,
            ignore_focus_out: false,
        }
    }

    #[tokio::test]
    async fn test_mock_prompt_host_picks_by_label() {
        let host = MockPromptHost::scripted([MockResponse::pick("b")]);
        let event = host.prompt_choice(&choice_prompt(&["a", "b"])).await.unwrap();

        assert_eq!(event, PromptEvent::Accepted(1));
        assert_eq!(host.remaining(), 0);
        let shown = host.shown_prompts();
        assert_eq!(shown[0].active_label.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_mock_prompt_host_unknown_label_fails() {
        let host = MockPromptHost::scripted([MockResponse::pick("zzz")]);
        let result = host.prompt_choice(&choice_prompt(&["a", "b"])).await;
        assert!(matches!(result, Err(HostError::PromptFailed(_, _))));
    }

    #[tokio::test]
    async fn test_mock_prompt_host_exhausted_script() {
        let host = MockPromptHost::new();
        let result = host.prompt_choice(&choice_prompt(&["a"])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_editor_host_defaults_to_accept() {
        let host = MockEditorHost::new();
        host.push_result_actions([ResultAction::Back]);
        let view = ResultView {
            title: "t".to_string(),
            result: "r".to_string(),
            accept_hint: String::new(),
            show_back: true,
            ignore_focus_out: false,
        };

        assert_eq!(host.show_result(&view).await.unwrap(), ResultAction::Back);
        assert_eq!(host.show_result(&view).await.unwrap(), ResultAction::Accept);
        assert_eq!(host.shown_results(), vec!["r", "r"]);
    }
}
