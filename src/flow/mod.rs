//! Multi-step interactive input engine.
//!
//! A `StepSequencer` drives an ordered list of `Step`s, handling
//! Continue/Back/Cancel transitions, pre-supplied answers and steps that
//! are inserted while a run is in progress.

pub mod choice;
pub mod result;
pub mod sequencer;
pub mod step;
pub mod text_input;

pub use choice::ChoiceStep;
pub use result::{InputFlowAction, StepResult};
pub use sequencer::{SequencerError, StartPosition, StepSequencer};
pub use step::{Step, StepContext};
pub use text_input::{TextInputStep, TextInputStepBuilder, Validator, PRIOR_RESULT_TOKEN};
