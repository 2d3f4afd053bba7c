//! Two-phase persistence of collateral records.
//!
//! Phase one creates the record and learns its server id. Phase two derives
//! the shareable link from that id and patches it onto the record. A record
//! whose patch never lands is reported as [`PartialRecord`] so the caller can
//! resume it instead of losing it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::record::{
    Draft, PartialRecord, PersistedRecord, RecordId, ResourceKind, SagaStatus,
};
use crate::errors::{ApplicationError, PersistenceError};
use crate::links::relative_link;

/// Backend port. Implementations talk to `/tables/<collection>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// `POST` the draft; the returned id is server assigned.
    async fn create(&self, draft: &Draft) -> Result<RecordId, PersistenceError>;

    /// `PATCH` only the url field of an existing record.
    async fn attach_url(
        &self,
        kind: ResourceKind,
        id: &RecordId,
        url: &str,
    ) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T> RecordStore for std::sync::Arc<T>
where
    T: RecordStore + ?Sized,
{
    async fn create(&self, draft: &Draft) -> Result<RecordId, PersistenceError> {
        (**self).create(draft).await
    }

    async fn attach_url(
        &self,
        kind: ResourceKind,
        id: &RecordId,
        url: &str,
    ) -> Result<(), PersistenceError> {
        (**self).attach_url(kind, id, url).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra patch attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay: Duration::from_millis(250), backoff_multiplier: 2 }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(self.backoff_multiplier.saturating_pow(retry))
    }
}

/// Cancellation side held by whoever may abort the in-flight submission.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelToken { receiver })
}

impl CancelToken {
    /// A token nobody can trigger.
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

pub struct TwoPhasePersister<S> {
    store: S,
    retry: RetryPolicy,
    timeout: Duration,
}

impl<S> TwoPhasePersister<S>
where
    S: RecordStore,
{
    pub fn new(store: S, retry: RetryPolicy, timeout: Duration) -> Self {
        Self { store, retry, timeout }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn persist(
        &self,
        draft: &Draft,
        cancel: &CancelToken,
        sink: &dyn AuditSink,
        audit: &AuditContext,
    ) -> Result<PersistedRecord, ApplicationError> {
        let kind = draft.kind();
        let audit = audit.clone().with_kind(kind);

        let id = match self.guarded(cancel, self.store.create(draft)).await {
            Ok(id) => id,
            Err(error) => {
                tracing::warn!(
                    event_name = "persistence.create_failed",
                    correlation_id = %audit.correlation_id,
                    resource = kind.collection(),
                    error = %error,
                    "record create failed; no patch attempted"
                );
                sink.emit(
                    AuditEvent::new(
                        &audit,
                        "persistence.create_failed",
                        AuditCategory::Persistence,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("error", error.to_string()),
                );
                return Err(error.into());
            }
        };

        let audit = audit.with_record(id.clone());
        tracing::info!(
            event_name = "persistence.record_created",
            correlation_id = %audit.correlation_id,
            resource = kind.collection(),
            record_id = %id,
            "record created"
        );
        sink.emit(AuditEvent::new(
            &audit,
            "persistence.record_created",
            AuditCategory::Persistence,
            AuditOutcome::Success,
        ));

        let created = PersistedRecord {
            kind,
            id: id.clone(),
            target_company: draft.target_company().to_owned(),
            url: None,
            status: SagaStatus::Created,
        };
        let pending_url = relative_link(kind, draft.target_company(), &id);
        self.link(created, pending_url, cancel, sink, &audit).await
    }

    /// Re-runs only the patch phase for a record left partial earlier.
    pub async fn resume(
        &self,
        partial: &PartialRecord,
        cancel: &CancelToken,
        sink: &dyn AuditSink,
        audit: &AuditContext,
    ) -> Result<PersistedRecord, ApplicationError> {
        let audit = audit.clone().with_kind(partial.kind).with_record(partial.id.clone());
        tracing::info!(
            event_name = "persistence.resume_started",
            correlation_id = %audit.correlation_id,
            resource = partial.kind.collection(),
            record_id = %partial.id,
            "resuming partial record"
        );
        self.link(partial.as_persisted(), partial.pending_url.clone(), cancel, sink, &audit).await
    }

    async fn link(
        &self,
        mut record: PersistedRecord,
        pending_url: String,
        cancel: &CancelToken,
        sink: &dyn AuditSink,
        audit: &AuditContext,
    ) -> Result<PersistedRecord, ApplicationError> {
        let mut retry = 0;
        let last_error = loop {
            let attempt =
                self.guarded(cancel, self.store.attach_url(record.kind, &record.id, &pending_url));
            let error = match attempt.await {
                Ok(()) => {
                    record.url = Some(pending_url);
                    record.status = SagaStatus::Linked;
                    tracing::info!(
                        event_name = "persistence.url_attached",
                        correlation_id = %audit.correlation_id,
                        resource = record.kind.collection(),
                        record_id = %record.id,
                        retries = retry,
                        "record linked"
                    );
                    sink.emit(
                        AuditEvent::new(
                            audit,
                            "persistence.url_attached",
                            AuditCategory::Persistence,
                            AuditOutcome::Success,
                        )
                        .with_metadata("retries", retry.to_string()),
                    );
                    return Ok(record);
                }
                Err(error) => error,
            };

            if matches!(error, PersistenceError::Cancelled) || retry >= self.retry.max_retries {
                break error;
            }

            let delay = self.retry.delay_for(retry);
            retry += 1;
            tracing::warn!(
                event_name = "persistence.patch_retry",
                correlation_id = %audit.correlation_id,
                resource = record.kind.collection(),
                record_id = %record.id,
                retry,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "url patch failed; retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => break PersistenceError::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        };

        let partial = PartialRecord {
            kind: record.kind,
            id: record.id,
            target_company: record.target_company,
            pending_url,
            reason: last_error.to_string(),
        };
        tracing::error!(
            event_name = "persistence.partial",
            correlation_id = %audit.correlation_id,
            resource = partial.kind.collection(),
            record_id = %partial.id,
            error = %last_error,
            "record persisted without its url"
        );
        sink.emit(
            AuditEvent::new(
                audit,
                "persistence.partial",
                AuditCategory::Persistence,
                AuditOutcome::Failed,
            )
            .with_metadata("error", last_error.to_string()),
        );
        Err(ApplicationError::PartialPersistence(partial))
    }

    async fn guarded<T, F>(&self, cancel: &CancelToken, request: F) -> Result<T, PersistenceError>
    where
        F: Future<Output = Result<T, PersistenceError>>,
    {
        if cancel.is_cancelled() {
            return Err(PersistenceError::Cancelled);
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(PersistenceError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, request) => match outcome {
                Ok(result) => result,
                Err(_) => Err(PersistenceError::Timeout { secs: self.timeout.as_secs() }),
            },
        }
    }
}
