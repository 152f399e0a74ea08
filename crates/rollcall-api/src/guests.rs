use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use rollcall_sync::resolve_day;
use rollcall_types::Guest;
use rollcall_types::api::{EventStatus, GuestListResponse, TrackerResponse};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct EventDayQuery {
    pub event: String,
    pub day: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub event: String,
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct GuestQuery {
    pub event: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub event: String,
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

pub async fn tracker(
    State(state): State<AppState>,
    query: Result<Query<EventDayQuery>, QueryRejection>,
) -> Result<Json<TrackerResponse>, ApiError> {
    let Query(q) = query?;
    let day = resolve_day(q.day.as_deref());
    Ok(Json(state.directory.tracker(&q.event, &day).await?))
}

pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Guest>>, ApiError> {
    let Query(q) = query?;
    Ok(Json(state.directory.search(&q.event, &q.q, q.limit)?))
}

pub async fn find_guest(
    State(state): State<AppState>,
    query: Result<Query<GuestQuery>, QueryRejection>,
) -> Result<Json<Guest>, ApiError> {
    let Query(q) = query?;
    Ok(Json(state.directory.find_by_email(&q.event, &q.email)?))
}

pub async fn list_guests(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<GuestListResponse>, ApiError> {
    let Query(q) = query?;
    let (total, guests) = state.directory.list(&q.event, q.offset, q.limit)?;
    Ok(Json(GuestListResponse {
        event_id: q.event,
        total,
        guests,
    }))
}

/// Operator-triggered refetch. Joins a refresh already in flight.
pub async fn refresh(
    State(state): State<AppState>,
    query: Result<Query<EventDayQuery>, QueryRejection>,
) -> Result<Json<TrackerResponse>, ApiError> {
    let Query(q) = query?;
    let day = resolve_day(q.day.as_deref());

    info!("Manual refresh requested for {}", q.event);
    let view = state.engine.refresh(&q.event, &day).await?;
    Ok(Json(view.tracker()))
}

pub async fn list_events(State(state): State<AppState>) -> Json<Vec<EventStatus>> {
    Json(state.engine.statuses())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
