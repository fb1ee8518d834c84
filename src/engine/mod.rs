//! Test orchestration engine.
//!
//! [`OutcomeClassifier`] turns one group's console output into a single
//! [`GroupOutcome`]; [`RunCoordinator`] sequences groups, device resets and
//! report rows; [`execute`] wires both to a configuration and a case list.

mod classifier;
mod coordinator;
mod outcome;

pub use classifier::{
    classify_transcript, Classification, ClassifierSettings, CommandTemplate, OutcomeClassifier,
    Signals,
};
pub use coordinator::{
    default_output_dir, execute, suggestions, RunCoordinator, RunOutput, RunPlan, MAX_SUGGESTIONS,
};
pub use outcome::{GroupOutcome, RunState, RunStats};
