use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::{middleware as mw, Router};
use tower_http::trace::TraceLayer;

use crate::server::endpoints::{sections, stats, status, sync, tracking, ws};
use crate::server::middleware::*;
use crate::types::AppState;

mod endpoints;
mod middleware;
mod types;

/// Builds the HTTP API: public read routes, user tracking routes and the
/// admin routes behind the bearer token check.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Router whose endpoints require the admin token
    let admin_router = Router::new()
        .route("/sync", post(sync::post_sync))
        .route("/stats/email", get(stats::get_email_stats))
        .layer(mw::from_fn_with_state(
            app_state.clone(),
            admin_validator::require_admin,
        ));

    let user_router = Router::new()
        .route("/users", post(tracking::post_user))
        .route("/users/:user_id/tracking", get(tracking::get_user_tracking))
        .route(
            "/users/:user_id/track/:section_id",
            post(tracking::post_track).delete(tracking::delete_track),
        )
        .route(
            "/users/:user_id/track/:section_id/interval",
            put(tracking::put_interval),
        );

    Router::new()
        .route("/health", get(status::get_health))
        .route("/ws", get(ws::get_ws))
        .route("/stats", get(stats::get_stats))
        .route("/sections/:section_id/slots", get(sections::get_section_slots))
        .merge(user_router)
        .merge(admin_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
