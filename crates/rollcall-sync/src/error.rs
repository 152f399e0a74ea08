use thiserror::Error;

use rollcall_sources::SourceUnavailable;
use rollcall_types::VerificationRecord;

/// Failures of the attendance store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A record already exists for the key. Carries that record.
    #[error("{} already verified for {} on {}", .0.email, .0.event_id, .0.day)]
    AlreadyVerified(Box<VerificationRecord>),
    /// The persistence layer failed. Safe to retry.
    #[error("attendance store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures of the reconciliation engine and the search facade.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("event already registered: {0}")]
    DuplicateEvent(String),
    #[error("no guest {email} in event {event_id}")]
    GuestNotFound { event_id: String, email: String },
    #[error(transparent)]
    Source(#[from] SourceUnavailable),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of a check-in.
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Not a fault: the guest is already checked in. Carries the existing record.
    #[error("{} already verified for {} on {}", .0.email, .0.event_id, .0.day)]
    AlreadyVerified(Box<VerificationRecord>),
    #[error("attendance store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for VerifyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyVerified(record) => Self::AlreadyVerified(record),
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}
