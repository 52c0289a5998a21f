//! User and tracking endpoints.
//!
//! The caller's identity is taken from the path as-is; authentication is
//! handled in front of this service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::server::endpoints::sections::slot_json;
use crate::server::types::ApiErrorType;
use crate::store::DbTracking;
use crate::tracking::{TrackedSection, TrackingError};
use crate::types::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserBody {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalBody {
    pub interval_minutes: u32,
}

fn tracking_error_to_response(error: TrackingError) -> Response {
    let (status, message) = match &error {
        TrackingError::SectionNotFound(_) => (StatusCode::NOT_FOUND, "Section not found"),
        TrackingError::UserNotFound(_) => (StatusCode::NOT_FOUND, "User not found"),
        TrackingError::TrackingNotFound => (StatusCode::NOT_FOUND, "Tracking not found"),
        TrackingError::InvalidInterval(_) => (StatusCode::BAD_REQUEST, "Invalid interval"),
        TrackingError::Store(e) => {
            error!("Tracking store error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    };

    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}

fn tracking_json(tracking: &DbTracking) -> serde_json::Value {
    json!({
        "trackingId": tracking.tracking_id,
        "userId": tracking.user_id,
        "sectionId": tracking.section_id,
        "active": tracking.active,
        "notifyIntervalMinutes": tracking.notify_interval_minutes,
        "lastNotifiedAt": tracking.last_notified_at,
        "createdAt": tracking.created_at,
    })
}

fn tracked_section_json(tracked: &TrackedSection) -> serde_json::Value {
    let section = &tracked.section;
    json!({
        "tracking": tracking_json(&tracked.tracking),
        "section": {
            "sectionId": section.section_id,
            "courseCode": section.course_code,
            "sectionNumber": section.section_number,
            "capacity": section.capacity,
            "enrolled": section.enrolled,
            "available": section.available(),
            "status": section.status,
            "faculty": section.faculty,
            "examDate": section.exam_date,
            "slots": tracked.slots.iter().map(slot_json).collect::<Vec<_>>(),
        },
    })
}

/// POST /users
pub async fn post_user(State(s): State<Arc<AppState>>, Json(body): Json<NewUserBody>) -> Response {
    info!("POST /users ({})", body.user_id);

    if body.user_id.trim().is_empty() {
        return ApiErrorType::from((StatusCode::BAD_REQUEST, "userId must not be empty", None))
            .into_response();
    }

    match s.store.upsert_user(&body.user_id, body.email.as_deref()) {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save user",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}

/// GET /users/:user_id/tracking
pub async fn get_user_tracking(
    Path(user_id): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /users/{}/tracking", user_id);

    match s.tracking.user_tracks(&user_id) {
        Ok(tracks) => {
            let response: Vec<_> = tracks.iter().map(tracked_section_json).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => tracking_error_to_response(e),
    }
}

/// POST /users/:user_id/track/:section_id
pub async fn post_track(
    Path((user_id, section_id)): Path<(String, String)>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("POST /users/{}/track/{}", user_id, section_id);

    match s.tracking.track_section(&user_id, &section_id) {
        Ok(tracking) => (StatusCode::CREATED, Json(tracking_json(&tracking))).into_response(),
        Err(e) => tracking_error_to_response(e),
    }
}

/// DELETE /users/:user_id/track/:section_id
pub async fn delete_track(
    Path((user_id, section_id)): Path<(String, String)>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("DELETE /users/{}/track/{}", user_id, section_id);

    match s.tracking.untrack_section(&user_id, &section_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => tracking_error_to_response(e),
    }
}

/// PUT /users/:user_id/track/:section_id/interval
pub async fn put_interval(
    Path((user_id, section_id)): Path<(String, String)>,
    State(s): State<Arc<AppState>>,
    Json(body): Json<IntervalBody>,
) -> Response {
    info!(
        "PUT /users/{}/track/{}/interval ({} min)",
        user_id, section_id, body.interval_minutes
    );

    match s
        .tracking
        .update_notify_interval(&user_id, &section_id, body.interval_minutes)
    {
        Ok(tracking) => (StatusCode::OK, Json(tracking_json(&tracking))).into_response(),
        Err(e) => tracking_error_to_response(e),
    }
}
