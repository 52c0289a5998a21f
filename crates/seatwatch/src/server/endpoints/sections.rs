use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::server::types::ApiErrorType;
use crate::store::DbSlot;
use crate::types::AppState;

pub(crate) fn slot_json(slot: &DbSlot) -> serde_json::Value {
    json!({
        "day": slot.day,
        "startTime": slot.start_time,
        "endTime": slot.end_time,
        "room": slot.room,
        "building": slot.building,
        "type": slot.slot_type,
    })
}

/// GET /sections/:section_id/slots
/// Returns the stored weekly slots of one section
pub async fn get_section_slots(
    Path(section_id): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("GET /sections/{}/slots", section_id);

    match s.store.get_section(&section_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return ApiErrorType::from((
                StatusCode::NOT_FOUND,
                "Section not found",
                Some(section_id),
            ))
            .into_response()
        }
        Err(e) => {
            return ApiErrorType::from((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch section",
                Some(e.to_string()),
            ))
            .into_response()
        }
    }

    match s.store.slots_for_section(&section_id) {
        Ok(slots) => {
            let response: Vec<_> = slots.iter().map(slot_json).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch slots",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}
