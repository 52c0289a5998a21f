use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::server::types::ApiErrorType;
use crate::sync::SyncOutcome;
use crate::types::AppState;

/// POST /sync
/// Runs one sync cycle and waits for it
pub async fn post_sync(State(s): State<Arc<AppState>>) -> Response {
    info!("POST /sync");

    match s.sync.run_sync().await {
        Ok(SyncOutcome::Completed(summary)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": summary.total_sections,
                "updatedSections": summary.updated_sections,
            })),
        )
            .into_response(),
        Ok(SyncOutcome::Skipped) => (
            StatusCode::OK,
            Json(json!({
                "success": false,
                "message": "Sync already in progress",
            })),
        )
            .into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::BAD_GATEWAY,
            "Synchronization failed",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}
