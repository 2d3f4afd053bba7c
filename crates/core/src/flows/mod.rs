pub mod engine;
pub mod states;

pub use engine::{FlowTransitionError, SubmissionFlow};
pub use states::{FlowAction, SubmissionEvent, SubmissionState, TransitionOutcome};
