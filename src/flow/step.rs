//! The step contract shared by every kind of prompt

use async_trait::async_trait;

use super::result::StepResult;
use super::sequencer::StepSequencer;
use crate::host::HostError;

/// Where a step sits in the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContext {
    /// 0-based position in the sequencer
    pub index: usize,
    /// 1-based progress number shown to the user
    pub display_index: usize,
    pub display_total: usize,
    pub ignore_focus_out: bool,
}

impl StepContext {
    /// Back is offered on every visible step except the first one
    pub fn show_back(&self) -> bool {
        self.display_index > 1
    }
}

/// One unit of interactive input
///
/// The sequencer only ever talks to steps through this trait.
#[async_trait]
pub trait Step: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Whether `input` is an acceptable answer given the previous result
    fn validate(&self, input: &str, previous: Option<&str>) -> bool;

    /// Bypass the prompt when the user's pre-selection already validates
    fn skip(&self) -> bool;

    /// Value recorded when the pre-selection `input` answers this step
    fn selection_value(&self, input: &str) -> String {
        input.to_string()
    }

    /// Remove this step from the sequencer when the user backs out of it
    fn unregister_on_back(&self) -> bool {
        false
    }

    /// Render the prompt and resolve once with the user's decision
    async fn execute(
        &self,
        sequencer: &mut StepSequencer,
        ctx: StepContext,
    ) -> Result<StepResult, HostError>;

    /// Clear the value or selection remembered from a previous run
    fn reset(&self);

    /// Release the prompt resource owned by this step
    fn dispose(&self);
}
