//! HTTP surface of the attendance service.

pub mod attendance;
pub mod auth;
pub mod error;
pub mod guests;
pub mod live;
pub mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::middleware::require_operator;

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(guests::health));

    let protected_routes = Router::new()
        .route("/verify", post(attendance::verify))
        .route("/verify-status", get(attendance::verify_status))
        .route("/tracker", get(guests::tracker))
        .route("/search", get(guests::search))
        .route("/guest", get(guests::find_guest))
        .route("/guests/list", get(guests::list_guests))
        .route("/refresh", post(guests::refresh))
        .route("/events", get(guests::list_events))
        .route("/live", get(live::live))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_operator))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
