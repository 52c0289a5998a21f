use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// Requires `Authorization: Bearer <admin_token>`.
///
/// Without a configured token every admin route is refused.
pub async fn require_admin(State(s): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(expected) = s.config.admin_token.as_deref() else {
        return ApiErrorType::from((
            StatusCode::FORBIDDEN,
            "Admin access is not configured",
            None,
        ))
        .into_response();
    };

    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided != Some(expected) {
        warn!("Rejected admin request to {}", req.uri().path());
        return ApiErrorType::from((
            StatusCode::UNAUTHORIZED,
            "Invalid or missing admin token",
            None,
        ))
        .into_response();
    }

    next.run(req).await
}
