use serde::{Deserialize, Serialize};

/// Lifecycle of one form submission. `Result` is terminal until a reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    #[default]
    Idle,
    Loading,
    Result,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionEvent {
    SubmitAccepted,
    PersistenceSucceeded,
    PersistenceFailed,
    ResetRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    HideForm,
    ShowProgress,
    ShowResult,
    ShowForm,
    SurfaceError,
    ClearForm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: SubmissionState,
    pub to: SubmissionState,
    pub event: SubmissionEvent,
    pub actions: Vec<FlowAction>,
}
