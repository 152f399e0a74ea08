//! Server-sent event feed for operator dashboards.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    /// Only forward events for this event id.
    pub event: Option<String>,
}

/// The stream ends when the broadcast channel closes or the server starts
/// shutting down, whichever comes first.
pub async fn live(
    State(state): State<AppState>,
    query: Result<Query<LiveQuery>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Query(q) = query?;
    let mut rx = state.engine.subscribe();
    let shutdown = state.shutdown.clone();
    debug!("Live subscriber attached (filter: {:?})", q.event);

    let stream = async_stream::stream! {
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Live subscriber detached for shutdown");
                    break;
                }
                received = rx.recv() => received,
            };

            let event = match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Live subscriber lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if q.event.as_deref().is_some_and(|id| id != event.event_id()) {
                continue;
            }

            match Event::default().event(event.kind()).json_data(&event) {
                Ok(sse) => yield Ok::<Event, Infallible>(sse),
                Err(e) => warn!("Dropping unserializable live event: {}", e),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
