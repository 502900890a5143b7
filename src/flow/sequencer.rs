//! Step sequencer: runs an ordered list of steps with back/forward navigation.
//!
//! The sequencer keeps three index-aligned pieces of state:
//! - `steps`: the registered steps, in order
//! - `step_results`: one slot per step, filled as the user advances
//! - `given_results`: pre-supplied answers keyed by step index
//!
//! Steps can be inserted while a run is in progress (a choice step's
//! "other" item registers an alternative step right after itself), so every
//! insertion or removal re-keys `given_results` and moves the matching
//! result slot together with its step.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use super::result::{InputFlowAction, StepResult};
use super::step::{Step, StepContext};
use crate::host::HostError;

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("no steps registered")]
    Empty,

    #[error("start index {0} is out of range for {1} steps")]
    StartOutOfRange(usize, usize),

    #[error("step '{0}' requested back navigation from the first step")]
    BackFromFirstStep(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Where `run` begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Fresh forward run from this index; results and steps are reset
    At(usize),
    /// Re-open the last step as a backward entry, keeping collected results
    Last,
}

impl Default for StartPosition {
    fn default() -> Self {
        StartPosition::At(0)
    }
}

/// Orchestrates an ordered list of steps
#[derive(Default)]
pub struct StepSequencer {
    steps: Vec<Arc<dyn Step>>,
    step_results: Vec<Option<String>>,
    given_results: BTreeMap<usize, String>,
    user_selection: String,
}

impl StepSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Position of `step` by identity
    pub fn position(&self, step: &Arc<dyn Step>) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(step)))
    }

    pub fn contains(&self, step: &Arc<dyn Step>) -> bool {
        self.position(step).is_some()
    }

    /// Text the user had selected when the run started
    pub fn user_selection(&self) -> &str {
        &self.user_selection
    }

    /// Pre-supplied answers, keyed by step index
    pub fn given_results(&self) -> &BTreeMap<usize, String> {
        &self.given_results
    }

    /// Whether at least one step would be shown interactively
    pub fn has_interactive_steps(&self) -> bool {
        (0..self.steps.len()).any(|i| !self.given_results.contains_key(&i))
    }

    /// Append `step`, or insert it at `index`. Registering a step that is
    /// already present does nothing.
    pub fn register_step(&mut self, step: Arc<dyn Step>, index: Option<usize>) {
        if self.contains(&step) {
            tracing::trace!(step = step.name(), "step already registered");
            return;
        }

        let index = index.map_or(self.steps.len(), |i| i.min(self.steps.len()));
        tracing::debug!(step = step.name(), index, "registering step");

        self.steps.insert(index, step);
        if self.step_results.len() >= index {
            self.step_results.insert(index, None);
        }
        self.given_results = std::mem::take(&mut self.given_results)
            .into_iter()
            .map(|(k, v)| if k >= index { (k + 1, v) } else { (k, v) })
            .collect();
    }

    /// Remove `step` if registered. Returns whether it was found.
    pub fn unregister_step(&mut self, step: &Arc<dyn Step>) -> bool {
        let Some(index) = self.position(step) else {
            return false;
        };
        tracing::debug!(step = step.name(), index, "unregistering step");

        self.steps.remove(index);
        if index < self.step_results.len() {
            self.step_results.remove(index);
        }
        self.given_results = std::mem::take(&mut self.given_results)
            .into_iter()
            .filter_map(|(k, v)| match k.cmp(&index) {
                std::cmp::Ordering::Less => Some((k, v)),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some((k - 1, v)),
            })
            .collect();
        true
    }

    /// Pre-supply the answer for the step at `index`; `None` or an empty
    /// value clears it
    pub fn set_step_result(&mut self, value: Option<String>, index: usize) {
        match value.filter(|v| !v.is_empty()) {
            Some(value) => {
                self.given_results.insert(index, value);
            }
            None => {
                self.given_results.remove(&index);
            }
        }
    }

    pub fn clear_given_results(&mut self) {
        self.given_results.clear();
    }

    /// Effective result of the step preceding `step`
    pub fn previous_result(&self, step: &Arc<dyn Step>) -> Option<&str> {
        self.previous_result_at(self.position(step)?)
    }

    /// Effective result of the step preceding position `index`, preferring
    /// a given result over the collected one
    pub fn previous_result_at(&self, index: usize) -> Option<&str> {
        let previous = index.checked_sub(1)?;
        self.given_results
            .get(&previous)
            .map(String::as_str)
            .or_else(|| self.step_results.get(previous)?.as_deref())
    }

    /// 1-based position and total as shown to the user; steps answered by
    /// given results do not count
    fn display_position(&self, index: usize) -> (usize, usize) {
        let hidden_before = self.given_results.range(..=index).count();
        let hidden_total = self.given_results.range(..self.steps.len()).count();
        (
            (index + 1).saturating_sub(hidden_before),
            self.steps.len().saturating_sub(hidden_total),
        )
    }

    /// Run the steps and return the collected, non-empty values in step
    /// order. A cancelled run returns an empty vector.
    pub async fn run(
        &mut self,
        ignore_focus_out: bool,
        user_selection: &str,
        start: StartPosition,
    ) -> Result<Vec<String>, SequencerError> {
        if self.steps.is_empty() {
            return Err(SequencerError::Empty);
        }
        self.user_selection = user_selection.to_string();

        let (mut index, mut on_back) = match start {
            StartPosition::Last => {
                self.step_results.resize(self.steps.len(), None);
                (self.steps.len() - 1, true)
            }
            StartPosition::At(index) => {
                if index >= self.steps.len() {
                    return Err(SequencerError::StartOutOfRange(index, self.steps.len()));
                }
                self.step_results = vec![None; self.steps.len()];
                for step in &self.steps {
                    step.reset();
                }
                (index, false)
            }
        };

        loop {
            let step = Arc::clone(&self.steps[index]);
            let (result, interactive) = self
                .resolve(&step, index, on_back, ignore_focus_out)
                .await?;
            // Executing may have inserted steps; follow the step itself
            index = self.position(&step).unwrap_or(index);

            match result.action() {
                InputFlowAction::Continue => {
                    tracing::debug!(step = step.name(), index, "step continued");
                    self.step_results[index] = result.into_value();
                    if index + 1 >= self.steps.len() {
                        break;
                    }
                    index += 1;
                    on_back = false;
                }
                InputFlowAction::Back => {
                    tracing::debug!(step = step.name(), index, "step went back");
                    if interactive && step.unregister_on_back() {
                        self.unregister_step(&step);
                    }
                    if index == 0 {
                        return Err(SequencerError::BackFromFirstStep(step.name().to_string()));
                    }
                    index -= 1;
                    on_back = true;
                }
                InputFlowAction::Cancel => {
                    tracing::debug!(step = step.name(), index, "run cancelled");
                    self.step_results.iter_mut().for_each(|slot| *slot = None);
                    return Ok(Vec::new());
                }
            }
        }

        Ok(self
            .step_results
            .iter()
            .flatten()
            .filter(|v| !v.is_empty())
            .cloned()
            .collect())
    }

    /// Decide the outcome for the step at `index`. The flag reports whether
    /// the step was actually shown.
    async fn resolve(
        &mut self,
        step: &Arc<dyn Step>,
        index: usize,
        on_back: bool,
        ignore_focus_out: bool,
    ) -> Result<(StepResult, bool), HostError> {
        if !on_back
            && step.skip()
            && step.validate(&self.user_selection, self.previous_result_at(index))
        {
            tracing::debug!(step = step.name(), index, "answered by user selection");
            let value = step.selection_value(&self.user_selection);
            return Ok((StepResult::proceed(value), false));
        }

        if let Some(given) = self.given_results.get(&index) {
            let result = if on_back {
                StepResult::back()
            } else {
                StepResult::proceed(given.clone())
            };
            return Ok((result, false));
        }

        let (display_index, display_total) = self.display_position(index);
        let ctx = StepContext {
            index,
            display_index,
            display_total,
            ignore_focus_out,
        };
        let result = step.execute(self, ctx).await?;
        Ok((result, true))
    }

    /// Dispose every registered step
    pub fn dispose(&self) {
        for step in &self.steps {
            step.dispose();
        }
    }
}
