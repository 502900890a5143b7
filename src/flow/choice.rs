//! Selection-list step with an optional "other" escape hatch.
//!
//! Picking the other item registers an alternative step right after the
//! choice step and records nothing for the choice step itself, so the
//! alternative's answer takes the choice's place in the final results.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::result::StepResult;
use super::sequencer::StepSequencer;
use super::step::{Step, StepContext};
use crate::host::{ChoiceItem, ChoicePrompt, HostError, PromptEvent, PromptHost};

/// Sentinel item plus the step it opens
struct OtherItem {
    item: ChoiceItem,
    alternative: Arc<dyn Step>,
}

/// Prompts the user to pick one of a list of items
pub struct ChoiceStep {
    id: Uuid,
    name: String,
    host: Arc<dyn PromptHost>,
    title: String,
    placeholder: String,
    items: RwLock<Vec<ChoiceItem>>,
    dynamic_items: bool,
    other: Option<OtherItem>,
    skip: bool,
    last_selected: Mutex<Option<String>>,
}

impl ChoiceStep {
    pub fn new(
        name: impl Into<String>,
        host: Arc<dyn PromptHost>,
        title: impl Into<String>,
        items: Vec<ChoiceItem>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            host,
            title: title.into(),
            placeholder: String::new(),
            items: RwLock::new(items),
            dynamic_items: false,
            other: None,
            skip: false,
            last_selected: Mutex::new(None),
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Append a sentinel item that opens `alternative` when picked
    pub fn with_other(mut self, item: ChoiceItem, alternative: Arc<dyn Step>) -> Self {
        self.other = Some(OtherItem { item, alternative });
        self
    }

    /// Mark the items as fed from configuration and refreshed through
    /// `update_items`
    pub fn with_dynamic_items(mut self) -> Self {
        self.dynamic_items = true;
        self
    }

    /// Only skip when the user's selection is one of the items
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic_items
    }

    /// Snapshot of the regular items (without the other item)
    pub fn items(&self) -> Vec<ChoiceItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_items(&self, items: Vec<ChoiceItem>) {
        tracing::debug!(step = %self.name, count = items.len(), "choice items updated");
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
    }

    /// Label of the item picked last, if any
    pub fn last_selected(&self) -> Option<String> {
        self.last_selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn alternative(&self) -> Option<&Arc<dyn Step>> {
        self.other.as_ref().map(|o| &o.alternative)
    }

    fn set_last_selected(&self, label: Option<String>) {
        *self
            .last_selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = label;
    }

    /// Items as displayed: regular items followed by the other item
    fn displayed_items(&self) -> Vec<ChoiceItem> {
        let mut items = self.items();
        if let Some(other) = &self.other {
            items.push(other.item.clone());
        }
        items
    }
}

#[async_trait]
impl Step for ChoiceStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, input: &str, _previous: Option<&str>) -> bool {
        // Any listed item is structurally valid; membership only matters
        // for deciding whether a pre-selection can stand in for the prompt.
        !self.skip
            || self
                .items()
                .iter()
                .any(|item| item.label == input || item.result_value() == input)
    }

    fn skip(&self) -> bool {
        self.skip
    }

    /// A selection naming an item by its label records the item's value
    fn selection_value(&self, input: &str) -> String {
        self.items()
            .iter()
            .find(|item| item.label == input || item.result_value() == input)
            .map_or_else(|| input.to_string(), |item| item.result_value().to_string())
    }

    async fn execute(
        &self,
        sequencer: &mut StepSequencer,
        ctx: StepContext,
    ) -> Result<StepResult, HostError> {
        let items = self.displayed_items();
        let active = self
            .last_selected()
            .and_then(|label| items.iter().position(|item| item.label == label));

        let prompt = ChoicePrompt {
            id: self.id,
            title: self.title.clone(),
            placeholder: self.placeholder.clone(),
            items: items.clone(),
            active,
            step: ctx.display_index,
            total_steps: ctx.display_total,
            show_back: ctx.show_back(),
            ignore_focus_out: ctx.ignore_focus_out,
        };

        match self.host.prompt_choice(&prompt).await? {
            PromptEvent::Accepted(index) => {
                let item = items.get(index).ok_or_else(|| {
                    HostError::PromptFailed(
                        self.name.clone(),
                        format!("selection {} out of range", index),
                    )
                })?;
                self.set_last_selected(Some(item.label.clone()));

                if let Some(other) = &self.other {
                    if item.label == other.item.label {
                        tracing::debug!(step = %self.name, "other item picked");
                        sequencer.register_step(Arc::clone(&other.alternative), Some(ctx.index + 1));
                        return Ok(StepResult::proceed_empty());
                    }
                    // A regular pick supersedes an earlier escape
                    sequencer.unregister_step(&other.alternative);
                }
                Ok(StepResult::proceed(item.result_value()))
            }
            PromptEvent::Back => Ok(StepResult::back()),
            PromptEvent::Dismissed => Ok(StepResult::cancel()),
        }
    }

    fn reset(&self) {
        self.set_last_selected(None);
        if let Some(other) = &self.other {
            other.alternative.reset();
        }
    }

    fn dispose(&self) {
        self.host.release(self.id);
        if let Some(other) = &self.other {
            other.alternative.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{StartPosition, TextInputStep};
    use crate::host::{MockPromptHost, MockResponse};

    fn formats() -> Vec<ChoiceItem> {
        vec![
            ChoiceItem::new("YYYY"),
            ChoiceItem::new("DD.MM.YYYY").with_description("German date"),
        ]
    }

    fn format_choice(host: &MockPromptHost) -> (Arc<ChoiceStep>, Arc<TextInputStep>) {
        let alternative = TextInputStep::builder("custom format", Arc::new(host.clone()))
            .title("Custom format")
            .validator(|input, _| input.contains("YYYY"))
            .unregister_on_back(true)
            .build();
        let choice = ChoiceStep::new("format", Arc::new(host.clone()), "Format", formats())
            .with_other(
                ChoiceItem::new("Other format..."),
                Arc::clone(&alternative) as Arc<dyn Step>,
            );
        (Arc::new(choice), alternative)
    }

    #[tokio::test]
    async fn test_pick_regular_item_records_value() {
        let host = MockPromptHost::scripted([MockResponse::pick("DD.MM.YYYY")]);
        let (choice, _) = format_choice(&host);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(choice.clone(), None);

        let results = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(results, vec!["DD.MM.YYYY"]);
        assert_eq!(choice.last_selected().as_deref(), Some("DD.MM.YYYY"));
        let shown = host.shown_prompts();
        assert_eq!(shown[0].labels, vec!["YYYY", "DD.MM.YYYY", "Other format..."]);
    }

    #[tokio::test]
    async fn test_item_value_overrides_label() {
        let host = MockPromptHost::scripted([MockResponse::pick("Milliseconds")]);
        let choice = ChoiceStep::new(
            "unit",
            Arc::new(host.clone()),
            "Unit",
            vec![
                ChoiceItem::new("Seconds").with_value("s"),
                ChoiceItem::new("Milliseconds").with_value("ms"),
            ],
        );
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(Arc::new(choice), None);

        let results = sequencer.run(false, "", StartPosition::default()).await.unwrap();
        assert_eq!(results, vec!["ms"]);
    }

    #[tokio::test]
    async fn test_selection_naming_item_records_its_value() {
        let host = MockPromptHost::new();
        let choice = ChoiceStep::new(
            "unit",
            Arc::new(host.clone()),
            "Unit",
            vec![
                ChoiceItem::new("Seconds").with_value("s"),
                ChoiceItem::new("Milliseconds").with_value("ms"),
            ],
        )
        .with_skip(true);
        assert_eq!(choice.selection_value("Seconds"), "s");
        assert_eq!(choice.selection_value("ms"), "ms");

        let mut sequencer = StepSequencer::new();
        sequencer.register_step(Arc::new(choice), None);

        let results = sequencer.run(false, "Seconds", StartPosition::default()).await.unwrap();
        assert_eq!(results, vec!["s"]);
        assert!(host.shown_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_other_item_inserts_alternative_and_records_nothing() {
        let host = MockPromptHost::scripted([
            MockResponse::pick("Other format..."),
            MockResponse::text("DD/MM/YYYY"),
        ]);
        let (choice, alternative) = format_choice(&host);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(choice.clone(), None);

        let results = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(results, vec!["DD/MM/YYYY"]);
        assert_eq!(sequencer.position(&(alternative as Arc<dyn Step>)), Some(1));
    }

    #[tokio::test]
    async fn test_back_from_alternative_reopens_choice_with_sentinel_active() {
        let host = MockPromptHost::scripted([
            MockResponse::pick("Other format..."),
            MockResponse::Back,
            MockResponse::pick("YYYY"),
        ]);
        let (choice, alternative) = format_choice(&host);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(choice.clone(), None);

        let results = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(results, vec!["YYYY"]);
        assert_eq!(sequencer.len(), 1);
        assert!(!sequencer.contains(&(alternative as Arc<dyn Step>)));
        let shown = host.shown_prompts();
        assert_eq!(shown[2].title, "Format");
        assert_eq!(shown[2].active_label.as_deref(), Some("Other format..."));
    }

    #[tokio::test]
    async fn test_regular_pick_removes_previous_alternative() {
        let host = MockPromptHost::scripted([
            MockResponse::pick("Other format..."),
            MockResponse::text("YYYY/MM"),
            MockResponse::pick("YYYY"),
        ]);
        let (choice, _) = format_choice(&host);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(choice.clone(), None);

        let first = sequencer.run(false, "", StartPosition::default()).await.unwrap();
        let second = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert_eq!(first, vec!["YYYY/MM"]);
        assert_eq!(second, vec!["YYYY"]);
        assert_eq!(sequencer.len(), 1);
        assert_eq!(host.remaining(), 0);
    }

    #[tokio::test]
    async fn test_dynamic_items_refresh_between_runs() {
        let host = MockPromptHost::scripted([
            MockResponse::pick("YYYY"),
            MockResponse::pick("HH:mm"),
        ]);
        let choice = Arc::new(
            ChoiceStep::new("format", Arc::new(host.clone()), "Format", formats())
                .with_dynamic_items(),
        );
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(choice.clone(), None);

        sequencer.run(false, "", StartPosition::default()).await.unwrap();
        choice.update_items(vec![ChoiceItem::new("HH:mm")]);
        let results = sequencer.run(false, "", StartPosition::default()).await.unwrap();

        assert!(choice.is_dynamic());
        assert_eq!(results, vec!["HH:mm"]);
    }

    #[tokio::test]
    async fn test_reset_clears_last_selection() {
        let host = MockPromptHost::scripted([MockResponse::pick("YYYY")]);
        let (choice, _) = format_choice(&host);
        let mut sequencer = StepSequencer::new();
        sequencer.register_step(choice.clone(), None);

        sequencer.run(false, "", StartPosition::default()).await.unwrap();
        assert!(choice.last_selected().is_some());
        choice.reset();
        assert!(choice.last_selected().is_none());
    }

    #[test]
    fn test_validate_without_skip_accepts_anything() {
        let host = MockPromptHost::new();
        let step = ChoiceStep::new("c", Arc::new(host), "C", formats());
        assert!(step.validate("not listed", None));
    }

    #[test]
    fn test_validate_with_skip_checks_membership() {
        let host = MockPromptHost::new();
        let step = ChoiceStep::new("c", Arc::new(host), "C", formats()).with_skip(true);
        assert!(step.validate("YYYY", None));
        assert!(!step.validate("not listed", None));
    }

    #[test]
    fn test_dispose_releases_alternative_too() {
        let host = MockPromptHost::new();
        let (choice, _) = format_choice(&host);
        choice.dispose();
        assert_eq!(host.released.lock().unwrap().len(), 2);
    }
}
