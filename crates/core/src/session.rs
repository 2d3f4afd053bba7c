//! Session-scoped submission controller.
//!
//! One [`Session`] owns everything a single form instance needs: selections,
//! the trip store, the submission state machine, the presenter state and any
//! record left partially persisted. Nothing here is process-global.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
use crate::domain::record::{
    CompanyProfileDraft, Draft, PartialRecord, PersistedRecord, QuotationDraft, RecordStatus,
    ResourceKind,
};
use crate::errors::{
    ApplicationError, DomainError, InterfaceError, PersistenceError, ValidationError,
};
use crate::flows::{FlowAction, SubmissionEvent, SubmissionFlow, SubmissionState};
use crate::persistence::{CancelToken, RecordStore, TwoPhasePersister};
use crate::presenter::{render_form, Clipboard, CopyButton, CopyOutcome, ResultView, ViewState};
use crate::pricing::{compute_totals, Totals};
use crate::trips::TripCollection;

const ACTOR: &str = "submission-controller";

pub struct Session<S> {
    output_type: Option<ResourceKind>,
    target_company: String,
    trips: TripCollection,
    state: SubmissionState,
    last_actions: Vec<FlowAction>,
    flow: SubmissionFlow,
    persister: TwoPhasePersister<S>,
    origin: String,
    result: Option<ResultView>,
    copy_button: CopyButton,
    partial: Option<PartialRecord>,
    audit_sink: Arc<dyn AuditSink>,
}

impl<S> Session<S>
where
    S: RecordStore,
{
    pub fn new(persister: TwoPhasePersister<S>, origin: impl Into<String>) -> Self {
        Self {
            output_type: None,
            target_company: String::new(),
            trips: TripCollection::new(),
            state: SubmissionState::Idle,
            last_actions: Vec::new(),
            flow: SubmissionFlow,
            persister,
            origin: origin.into(),
            result: None,
            copy_button: CopyButton::default(),
            partial: None,
            audit_sink: Arc::new(InMemoryAuditSink::default()),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    pub fn with_copy_button(mut self, copy_button: CopyButton) -> Self {
        self.copy_button = copy_button;
        self
    }

    /// Switching to a quotation seeds one blank row if none was ever added.
    pub fn select_output_type(&mut self, kind: ResourceKind) {
        self.output_type = Some(kind);
        if kind == ResourceKind::Quotation && !self.trips.has_added_any() {
            self.trips.add_trip();
        }
    }

    pub fn set_target_company(&mut self, company: impl Into<String>) {
        self.target_company = company.into();
    }

    pub fn output_type(&self) -> Option<ResourceKind> {
        self.output_type
    }

    pub fn target_company(&self) -> &str {
        &self.target_company
    }

    pub fn trips(&self) -> &TripCollection {
        &self.trips
    }

    pub fn trips_mut(&mut self) -> &mut TripCollection {
        &mut self.trips
    }

    /// Live totals, including rows that would be dropped at submission.
    pub fn totals(&self) -> Totals {
        self.trips.totals()
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// View actions requested by the most recent state transition.
    pub fn last_actions(&self) -> &[FlowAction] {
        &self.last_actions
    }

    pub fn view(&self) -> ViewState {
        ViewState::from(self.state)
    }

    pub fn result(&self) -> Option<&ResultView> {
        self.result.as_ref()
    }

    pub fn partial(&self) -> Option<&PartialRecord> {
        self.partial.as_ref()
    }

    pub fn render(&self) -> String {
        render_form(self.output_type, &self.target_company, &self.trips)
    }

    pub fn persister(&self) -> &TwoPhasePersister<S> {
        &self.persister
    }

    /// Builds the draft that would be submitted, without touching state.
    pub fn build_draft(&self) -> Result<Draft, ValidationError> {
        let kind = self.output_type.ok_or(ValidationError::MissingOutputType)?;
        let target_company = self.target_company.trim();
        if target_company.is_empty() {
            return Err(ValidationError::MissingTargetCompany);
        }

        let created_at = Utc::now();
        match kind {
            ResourceKind::CompanyProfile => Ok(Draft::CompanyProfile(CompanyProfileDraft {
                target_company: target_company.to_owned(),
                created_at,
                status: RecordStatus::Active,
            })),
            ResourceKind::Quotation => {
                let trips = self.trips.submittable_lines();
                if trips.is_empty() {
                    return Err(ValidationError::NoValidTrips);
                }
                let totals = compute_totals(trips.iter().map(|line| line.price));
                Ok(Draft::Quotation(QuotationDraft {
                    target_company: target_company.to_owned(),
                    trips,
                    subtotal: totals.subtotal,
                    final_total: totals.final_total,
                    created_at,
                    status: RecordStatus::Active,
                }))
            }
        }
    }

    /// Validates, persists in two phases and moves to `Result` on success.
    /// Validation failures leave the state untouched and issue no request;
    /// persistence failures return the session to `Idle`.
    pub async fn submit(&mut self, cancel: &CancelToken) -> Result<ResultView, InterfaceError> {
        let correlation_id = Uuid::new_v4().to_string();
        let draft = self
            .build_draft()
            .map_err(|error| ApplicationError::from(error).into_interface(&correlation_id))?;
        let audit = AuditContext::new(&correlation_id, ACTOR).with_kind(draft.kind());

        self.transition(SubmissionEvent::SubmitAccepted, &audit)
            .map_err(|error| error.into_interface(&correlation_id))?;

        let outcome =
            self.persister.persist(&draft, cancel, self.audit_sink.as_ref(), &audit).await;
        self.finish(outcome, &audit).map_err(|error| error.into_interface(&correlation_id))
    }

    /// Attaches the url to a record a previous submission left partial.
    pub async fn resume_partial(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<ResultView, InterfaceError> {
        let correlation_id = Uuid::new_v4().to_string();
        let partial = match self.partial.clone() {
            Some(partial) => partial,
            None => {
                return Err(ApplicationError::from(ValidationError::NothingToResume)
                    .into_interface(&correlation_id))
            }
        };
        self.resume(partial, cancel, &correlation_id).await
    }

    /// Resumes a partial record known from elsewhere, e.g. a previous run.
    pub async fn resume(
        &mut self,
        partial: PartialRecord,
        cancel: &CancelToken,
        correlation_id: &str,
    ) -> Result<ResultView, InterfaceError> {
        let audit = AuditContext::new(correlation_id, ACTOR)
            .with_kind(partial.kind)
            .with_record(partial.id.clone());
        self.transition(SubmissionEvent::SubmitAccepted, &audit)
            .map_err(|error| error.into_interface(correlation_id))?;

        let outcome =
            self.persister.resume(&partial, cancel, self.audit_sink.as_ref(), &audit).await;
        self.finish(outcome, &audit).map_err(|error| error.into_interface(correlation_id))
    }

    pub fn copy_link<C>(&mut self, clipboard: &mut C, now: Instant) -> Option<CopyOutcome>
    where
        C: Clipboard + ?Sized,
    {
        let result = self.result.as_ref()?;
        let url = result.absolute_url.clone();
        let audit = AuditContext::new(Uuid::new_v4().to_string(), ACTOR)
            .with_kind(result.kind)
            .with_record(result.record_id.clone());

        let outcome = self.copy_button.press(clipboard, &url, now);
        let (event_type, audit_outcome) = match outcome {
            CopyOutcome::Copied { .. } => ("presentation.link_copied", AuditOutcome::Success),
            CopyOutcome::ManualCopy { .. } => ("presentation.copy_fallback", AuditOutcome::Failed),
        };
        self.audit_sink.emit(
            AuditEvent::new(&audit, event_type, AuditCategory::Presentation, audit_outcome)
                .with_metadata("url", url),
        );
        Some(outcome)
    }

    pub fn copy_label(&self, now: Instant) -> &'static str {
        self.copy_button.label(now)
    }

    /// Clears selections, trips, result and any partial record.
    ///
    /// Starts a new form lifetime: trip ids restart at 1 afterwards, so an id
    /// seen before the reset may name a different row after it.
    pub fn reset(&mut self) -> Result<(), InterfaceError> {
        let correlation_id = Uuid::new_v4().to_string();
        let audit = AuditContext::new(&correlation_id, ACTOR);
        self.transition(SubmissionEvent::ResetRequested, &audit)
            .map_err(|error| error.into_interface(&correlation_id))?;

        self.output_type = None;
        self.target_company.clear();
        self.trips = TripCollection::new();
        self.result = None;
        self.partial = None;
        self.copy_button.reset();
        Ok(())
    }

    fn finish(
        &mut self,
        outcome: Result<PersistedRecord, ApplicationError>,
        audit: &AuditContext,
    ) -> Result<ResultView, ApplicationError> {
        let failure = match outcome {
            Ok(record) => match ResultView::from_record(&self.origin, &record) {
                Some(view) => {
                    self.transition(SubmissionEvent::PersistenceSucceeded, audit)?;
                    self.partial = None;
                    self.result = Some(view.clone());
                    return Ok(view);
                }
                None => ApplicationError::Persistence(PersistenceError::MalformedResponse(
                    format!("record {} has no url", record.id),
                )),
            },
            Err(error) => error,
        };

        if let ApplicationError::PartialPersistence(partial) = &failure {
            self.partial = Some(partial.clone());
        }
        tracing::warn!(
            event_name = "submission.failed",
            correlation_id = %audit.correlation_id,
            error = %failure,
            "submission failed; form shown again"
        );
        self.transition(SubmissionEvent::PersistenceFailed, audit)?;
        Err(failure)
    }

    fn transition(
        &mut self,
        event: SubmissionEvent,
        audit: &AuditContext,
    ) -> Result<(), ApplicationError> {
        let outcome = self
            .flow
            .apply_with_audit(self.state, event, self.audit_sink.as_ref(), audit)
            .map_err(DomainError::from)?;
        tracing::debug!(
            event_name = "session.view_actions",
            correlation_id = %audit.correlation_id,
            state = ?outcome.to,
            actions = ?outcome.actions,
            "applying view actions"
        );
        self.state = outcome.to;
        self.last_actions = outcome.actions;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use rust_decimal::Decimal;

    use crate::audit::{AuditCategory, AuditOutcome, InMemoryAuditSink};
    use crate::domain::record::{Draft, RecordId, ResourceKind};
    use crate::errors::{InterfaceError, PersistenceError, GENERIC_FAILURE_MESSAGE};
    use crate::flows::{FlowAction, SubmissionState};
    use crate::links::parse_link;
    use crate::persistence::testing::{FakeStore, Scripted};
    use crate::persistence::{CancelToken, RetryPolicy, TwoPhasePersister};
    use crate::presenter::{Clipboard, ClipboardError, CopyOutcome, ViewState};

    use super::Session;

    const ORIGIN: &str = "https://collateral.example";

    fn session(store: FakeStore) -> Session<FakeStore> {
        let retry = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            backoff_multiplier: 2,
        };
        Session::new(TwoPhasePersister::new(store, retry, Duration::from_secs(5)), ORIGIN)
    }

    fn quotation_session(store: FakeStore) -> Session<FakeStore> {
        let mut session = session(store);
        session.set_target_company("Acme Travel");
        session.select_output_type(ResourceKind::Quotation);
        let first = session.trips().entries()[0].id;
        session.trips_mut().set_name(first, "City Tour").expect("row exists");
        session.trips_mut().set_price_input(first, "100.00").expect("row exists");
        let second = session.trips_mut().add_trip();
        session.trips_mut().set_name(second, "Beach Day").expect("row exists");
        session.trips_mut().set_price_input(second, "50.00").expect("row exists");
        session
    }

    struct NoClipboard;

    impl Clipboard for NoClipboard {
        fn write_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError("no clipboard".to_owned()))
        }
    }

    #[test]
    fn selecting_quotation_seeds_a_single_row() {
        let mut session = session(FakeStore::default());
        session.select_output_type(ResourceKind::Quotation);
        session.select_output_type(ResourceKind::CompanyProfile);
        session.select_output_type(ResourceKind::Quotation);

        assert_eq!(session.trips().len(), 1);
    }

    #[tokio::test]
    async fn empty_company_never_reaches_the_network() {
        let mut session = session(FakeStore::default());
        session.select_output_type(ResourceKind::CompanyProfile);
        session.set_target_company("   ");

        let error = session.submit(&CancelToken::never()).await.expect_err("company missing");

        assert!(matches!(error, InterfaceError::BadRequest { .. }));
        assert_eq!(error.user_message(), "Please fill in all required fields");
        assert_eq!(session.persister().store().calls(), 0);
        assert_eq!(session.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn missing_output_type_is_rejected() {
        let mut session = session(FakeStore::default());
        session.set_target_company("Acme");

        let error = session.submit(&CancelToken::never()).await.expect_err("type missing");
        assert!(matches!(error, InterfaceError::BadRequest { .. }));
        assert_eq!(session.persister().store().calls(), 0);
    }

    #[tokio::test]
    async fn quotation_with_only_invalid_rows_never_reaches_the_network() {
        let mut session = session(FakeStore::default());
        session.set_target_company("Acme");
        session.select_output_type(ResourceKind::Quotation);
        let row = session.trips().entries()[0].id;
        session.trips_mut().set_price_input(row, "80").expect("row exists");
        let unpriced = session.trips_mut().add_trip();
        session.trips_mut().set_name(unpriced, "Free Walk").expect("row exists");

        assert_eq!(session.totals().subtotal, Decimal::new(80, 0));
        let error = session.submit(&CancelToken::never()).await.expect_err("no valid trips");

        assert_eq!(error.user_message(), "Please add at least one trip with a valid price");
        assert_eq!(session.persister().store().calls(), 0);
        assert_eq!(session.view(), ViewState::Form);
    }

    #[tokio::test]
    async fn quotation_submission_reaches_result() {
        let mut session = quotation_session(FakeStore::starting_at(42));
        let invalid = session.trips_mut().add_trip();
        session.trips_mut().set_price_input(invalid, "999").expect("row exists");

        let view = session.submit(&CancelToken::never()).await.expect("submission succeeds");

        assert_eq!(session.state(), SubmissionState::Result);
        assert_eq!(view.record_id, RecordId("42".to_owned()));
        assert!(view.absolute_url.starts_with("https://collateral.example/quotation.html?"));

        let parsed = parse_link(&view.relative_url).expect("link parses");
        assert_eq!(parsed.target_company, "Acme Travel");
        assert_eq!(parsed.id, RecordId("42".to_owned()));

        let created = session.persister().store().created.lock().expect("lock").clone();
        let Draft::Quotation(draft) = &created[0] else {
            panic!("expected a quotation draft");
        };
        assert_eq!(draft.trips.len(), 2);
        assert_eq!(draft.subtotal, Decimal::new(15_000, 2));
        assert_eq!(draft.final_total, Decimal::new(16_500, 2));
    }

    #[tokio::test]
    async fn create_failure_returns_to_form_with_generic_message() {
        let store = FakeStore::default();
        store.script_create(Scripted::Fail(PersistenceError::Status {
            operation: "create",
            status: 500,
        }));
        let mut session = quotation_session(store);

        let error = session.submit(&CancelToken::never()).await.expect_err("create fails");

        assert_eq!(error.user_message(), GENERIC_FAILURE_MESSAGE);
        assert_eq!(session.state(), SubmissionState::Idle);
        assert!(session.partial().is_none());
        assert_eq!(session.persister().store().patches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_patch_keeps_record_recoverable() {
        let store = FakeStore::starting_at(42);
        for _ in 0..2 {
            store.script_patch(Scripted::Fail(PersistenceError::Status {
                operation: "patch",
                status: 502,
            }));
        }
        let sink = InMemoryAuditSink::default();
        let mut session = quotation_session(store).with_audit_sink(Arc::new(sink.clone()));

        let error = session.submit(&CancelToken::never()).await.expect_err("patch fails");
        assert!(matches!(error, InterfaceError::Recoverable { .. }));
        assert_eq!(session.state(), SubmissionState::Idle);
        let partial = session.partial().cloned().expect("partial record recorded");
        assert_eq!(partial.id, RecordId("42".to_owned()));

        let view = session.resume_partial(&CancelToken::never()).await.expect("resume succeeds");
        assert_eq!(view.record_id, RecordId("42".to_owned()));
        assert_eq!(session.state(), SubmissionState::Result);
        assert!(session.partial().is_none());
        assert_eq!(session.persister().store().creates.load(Ordering::SeqCst), 1);
        assert!(sink.events().iter().any(|event| event.event_type == "persistence.partial"));
    }

    #[tokio::test]
    async fn reset_returns_to_empty_form() {
        let mut session = quotation_session(FakeStore::default());
        session.submit(&CancelToken::never()).await.expect("submission succeeds");

        session.reset().expect("reset from result");

        assert_eq!(session.view(), ViewState::Form);
        assert!(session.trips().is_empty());
        assert!(session.result().is_none());
        assert_eq!(session.output_type(), None);
        assert_eq!(session.target_company(), "");
        assert_eq!(session.totals().final_total, Decimal::ZERO);
        assert!(session.last_actions().contains(&FlowAction::ClearForm));
    }

    #[tokio::test]
    async fn reset_restarts_trip_ids() {
        let mut session = quotation_session(FakeStore::default());
        let before = session.trips_mut().add_trip();
        assert_eq!(before.0, 3);

        session.reset().expect("reset from idle");
        session.select_output_type(ResourceKind::Quotation);

        assert_eq!(session.trips().entries()[0].id.0, 1);
    }

    #[tokio::test]
    async fn successful_submit_requests_result_view() {
        let mut session = quotation_session(FakeStore::default());
        session.submit(&CancelToken::never()).await.expect("submission succeeds");

        assert!(session.last_actions().contains(&FlowAction::ShowResult));
    }

    #[tokio::test]
    async fn copy_without_clipboard_prompts_manual_copy() {
        let mut session = quotation_session(FakeStore::default());
        let view = session.submit(&CancelToken::never()).await.expect("submission succeeds");

        let outcome = session.copy_link(&mut NoClipboard, Instant::now()).expect("result shown");
        assert_eq!(
            outcome,
            CopyOutcome::ManualCopy {
                prompt: format!("Could not copy URL. Please copy manually: {}", view.absolute_url)
            }
        );
    }

    struct RecordingClipboard(Vec<String>);

    impl Clipboard for RecordingClipboard {
        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            self.0.push(text.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn copying_the_link_is_audited_as_presentation() {
        let sink = InMemoryAuditSink::default();
        let mut session =
            quotation_session(FakeStore::default()).with_audit_sink(Arc::new(sink.clone()));
        let view = session.submit(&CancelToken::never()).await.expect("submission succeeds");

        let mut clipboard = RecordingClipboard(Vec::new());
        session.copy_link(&mut clipboard, Instant::now()).expect("result shown");
        session.copy_link(&mut NoClipboard, Instant::now()).expect("result shown");

        let presentation: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|event| event.category == AuditCategory::Presentation)
            .collect();
        assert_eq!(presentation.len(), 2);
        assert_eq!(presentation[0].event_type, "presentation.link_copied");
        assert_eq!(presentation[0].outcome, AuditOutcome::Success);
        assert_eq!(presentation[0].record_id, Some(view.record_id.clone()));
        assert_eq!(presentation[1].event_type, "presentation.copy_fallback");
        assert_eq!(presentation[1].outcome, AuditOutcome::Failed);
        assert_eq!(clipboard.0, vec![view.absolute_url]);
    }
}
