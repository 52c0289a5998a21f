use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// GET /stats
pub async fn get_stats(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /stats");

    match s.stats.current() {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch stats",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}

/// GET /stats/email
/// Email attempt counts; `today` is the current UTC day
pub async fn get_email_stats(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /stats/email");

    let day_start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    match s.store.email_stats(day_start) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch email stats",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}
