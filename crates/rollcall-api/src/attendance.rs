use axum::{
    Json,
    extract::{Query, State, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use rollcall_types::api::{VerifyRequest, VerifyResponse, VerifyStatusResponse};

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn verify(
    State(state): State<AppState>,
    req: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req?;

    let verification = state
        .verifier
        .verify(&req.email, &req.event_id, req.day.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(VerifyResponse {
            verified: true,
            verified_at: verification.record.verified_at,
            listed: verification.listed,
            record: verification.record,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub event: String,
    pub email: String,
    pub day: Option<String>,
}

pub async fn verify_status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<VerifyStatusResponse>, ApiError> {
    let Query(q) = query?;

    let status = state
        .verifier
        .status(&q.email, &q.event, q.day.as_deref())
        .await?;

    Ok(Json(VerifyStatusResponse {
        verified: status.verified(),
        verified_at: status.verified_at,
        email: status.email,
        event_id: status.event_id,
        day: status.day,
    }))
}
