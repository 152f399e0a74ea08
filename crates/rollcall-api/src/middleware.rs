use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::auth::AppState;
use crate::error::ApiError;

/// Require `Authorization: Bearer <operator key>`.
pub async fn require_operator(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing operator key"))?;

    if !state.operator_key_matches(token.trim()) {
        warn!("Rejected operator key on {} {}", req.method(), req.uri().path());
        return Err(ApiError::unauthorized("invalid operator key"));
    }

    Ok(next.run(req).await)
}
