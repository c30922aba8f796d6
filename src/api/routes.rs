use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{cards, health, sessions};
use super::state::AppState;

/// Origins allowed to call the sidecar; it only serves local tools
fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    ["http://localhost", "http://127.0.0.1"].iter().any(|base| {
        origin == *base
            || origin
                .strip_prefix(base)
                .and_then(|rest| rest.strip_prefix(':'))
                .is_some_and(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
    })
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _| is_local_origin(origin)))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:session_id", axum::routing::delete(sessions::close_session))
        .route("/sessions/:session_id/snapshot", post(sessions::recapture))
        .route("/sessions/:session_id/navigate", post(sessions::navigate))
        .route("/sessions/:session_id/match", post(cards::match_cards))
        .route("/sessions/:session_id/extract", post(cards::extract))
        .route("/sessions/:session_id/export", post(cards::export_contacts))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
