//! One error type for every handler, rendered as `{ code, message }`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use rollcall_sync::{StoreError, SyncError, VerifyError};
use rollcall_types::api::ErrorResponse;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.into(),
                verified_at: None,
            },
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    fn store_unavailable(message: String) -> Self {
        warn!("Attendance store unavailable: {}", message);
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            "attendance store unavailable, retry shortly",
        )
    }

    fn already_verified(record: &rollcall_types::VerificationRecord) -> Self {
        let mut err = Self::new(
            StatusCode::CONFLICT,
            "already_verified",
            format!("{} is already checked in for {}", record.email, record.day),
        );
        err.body.verified_at = Some(record.verified_at);
        err
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidRequest(msg) => Self::invalid_request(msg),
            VerifyError::AlreadyVerified(record) => Self::already_verified(&record),
            VerifyError::StoreUnavailable(msg) => Self::store_unavailable(msg),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::UnknownEvent(id) => {
                Self::new(StatusCode::NOT_FOUND, "unknown_event", format!("unknown event: {}", id))
            }
            SyncError::DuplicateEvent(id) => Self::new(
                StatusCode::CONFLICT,
                "duplicate_event",
                format!("event already registered: {}", id),
            ),
            e @ SyncError::GuestNotFound { .. } => Self::not_found(e.to_string()),
            SyncError::Source(e) => {
                error!("Guest source failed: {}", e);
                Self::new(StatusCode::BAD_GATEWAY, "source_unavailable", e.to_string())
            }
            SyncError::Store(StoreError::AlreadyVerified(record)) => Self::already_verified(&record),
            SyncError::Store(StoreError::Unavailable(msg)) => Self::store_unavailable(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}
