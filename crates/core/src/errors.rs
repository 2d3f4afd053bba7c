use thiserror::Error;

use crate::domain::record::PartialRecord;
use crate::domain::trip::TripId;
use crate::flows::FlowTransitionError;

pub const GENERIC_FAILURE_MESSAGE: &str =
    "An error occurred while generating the marketing material. Please try again.";

/// Form problems caught locally, before any network call is issued.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("output type is required")]
    MissingOutputType,
    #[error("target company is required")]
    MissingTargetCompany,
    #[error("no valid trips: at least one trip needs a name and a positive price")]
    NoValidTrips,
    #[error("no partially persisted record to resume")]
    NothingToResume,
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingOutputType | Self::MissingTargetCompany => {
                "Please fill in all required fields"
            }
            Self::NoValidTrips => "Please add at least one trip with a valid price",
            Self::NothingToResume => "There is no saved record waiting for its link.",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("trip {0} is not part of the collection")]
    UnknownTrip(TripId),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("{operation} request failed: {message}")]
    Transport { operation: &'static str, message: String },
    #[error("{operation} request returned status {status}")]
    Status { operation: &'static str, status: u16 },
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
    #[error("backend did not answer within {secs}s")]
    Timeout { secs: u64 },
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
    #[error(
        "{} record {} was created but its url could not be attached: {}",
        .0.kind, .0.id, .0.reason
    )]
    PartialPersistence(PartialRecord),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<ValidationError> for ApplicationError {
    fn from(value: ValidationError) -> Self {
        Self::Domain(DomainError::Validation(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("recoverable failure: {message}")]
    Recoverable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text that is safe to show to the person filling in the form.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } => message,
            Self::ServiceUnavailable { .. } => GENERIC_FAILURE_MESSAGE,
            Self::Recoverable { .. } => {
                "The record was saved but its link could not be attached. Resume it to finish."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Recoverable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Recoverable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(DomainError::Validation(validation)) => Self::BadRequest {
                message: validation.user_message().to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Domain(other) => Self::BadRequest {
                message: other.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(error) => Self::ServiceUnavailable {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            error @ ApplicationError::PartialPersistence(_) => Self::Recoverable {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
