use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Guest, VerificationRecord};

// -- Verification --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyRequest {
    pub email: String,
    pub event_id: String,
    /// Defaults to today's UTC date when omitted.
    pub day: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    pub verified_at: DateTime<Utc>,
    /// Whether the email was present in the event's current guest snapshot.
    pub listed: bool,
    pub record: VerificationRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyStatusResponse {
    pub email: String,
    pub event_id: String,
    pub day: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

// -- Tracker / listing --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerResponse {
    pub event_id: String,
    pub day: String,
    pub registered_count: usize,
    pub verified_count: usize,
    /// Verified emails the current snapshot does not list.
    pub unlisted_verified_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub truncated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestListResponse {
    pub event_id: String,
    pub total: usize,
    pub guests: Vec<Guest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatus {
    pub event_id: String,
    pub source: String,
    pub registered_count: usize,
    pub polling: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

// -- Errors --

/// Uniform error body. `code` is stable, `message` is for humans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// Set on `already_verified` so the UI can show the existing check-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}
