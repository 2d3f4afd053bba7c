pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod links;
pub mod persistence;
pub mod presenter;
pub mod pricing;
pub mod session;
pub mod trips;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::record::{
    CompanyProfileDraft, Draft, PartialRecord, PersistedRecord, QuotationDraft, RecordId,
    RecordStatus, ResourceKind, SagaStatus, TripLine,
};
pub use domain::trip::{TripEntry, TripId};
pub use errors::{
    ApplicationError, DomainError, InterfaceError, PersistenceError, ValidationError,
    GENERIC_FAILURE_MESSAGE,
};
pub use flows::engine::SubmissionFlow;
pub use flows::states::SubmissionState;
pub use links::{absolute_link, parse_link, relative_link, ParsedLink};
pub use persistence::{
    cancel_pair, CancelHandle, CancelToken, RecordStore, RetryPolicy, TwoPhasePersister,
};
pub use presenter::{Clipboard, ClipboardError, CopyButton, CopyOutcome, ResultView, ViewState};
pub use pricing::{compute_totals, Totals, TAX_RATE};
pub use session::Session;
pub use trips::TripCollection;
