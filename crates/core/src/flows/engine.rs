use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{FlowAction, SubmissionEvent, SubmissionState, TransitionOutcome};

#[derive(Clone, Debug, Default)]
pub struct SubmissionFlow;

impl SubmissionFlow {
    pub fn initial_state(&self) -> SubmissionState {
        SubmissionState::Idle
    }

    pub fn apply(
        &self,
        current: SubmissionState,
        event: SubmissionEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_submission(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: SubmissionState,
        event: SubmissionEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                tracing::debug!(
                    event_name = "flow.transition_applied",
                    correlation_id = %audit.correlation_id,
                    from = ?outcome.from,
                    to = ?outcome.to,
                    "submission state changed"
                );
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_applied",
                        AuditCategory::Flow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", outcome.from))
                    .with_metadata("to", format!("{:?}", outcome.to))
                    .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "flow.transition_rejected",
                    correlation_id = %audit.correlation_id,
                    error = %error,
                    "submission transition rejected"
                );
                sink.emit(
                    AuditEvent::new(
                        audit,
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: SubmissionState, event: SubmissionEvent },
}

fn transition_submission(
    current: SubmissionState,
    event: SubmissionEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{ClearForm, HideForm, ShowForm, ShowProgress, ShowResult, SurfaceError};
    use SubmissionEvent::{
        PersistenceFailed, PersistenceSucceeded, ResetRequested, SubmitAccepted,
    };
    use SubmissionState::{Idle, Loading, Result as Done};

    // Loading has no reset edge: the form is hidden while a request is in flight.
    let (to, actions) = match (current, event) {
        (Idle, SubmitAccepted) => (Loading, vec![HideForm, ShowProgress]),
        (Loading, PersistenceSucceeded) => (Done, vec![ShowResult]),
        (Loading, PersistenceFailed) => (Idle, vec![ShowForm, SurfaceError]),
        (Idle, ResetRequested) | (Done, ResetRequested) => (Idle, vec![ClearForm, ShowForm]),
        _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
