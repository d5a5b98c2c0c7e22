use crate::controller::ApiResponse;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub subscribers: usize,
    pub max_subscribers: usize,
}

/// GET report liveness along with the current SSE subscriber count
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let manager = &app_state.sse_manager;
    let (status_code, status) = if manager.is_shut_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else {
        (StatusCode::OK, "healthy")
    };

    let health = HealthStatus {
        status,
        subscribers: manager.count(),
        max_subscribers: manager.config().max_subscribers,
    };

    (
        status_code,
        Json(ApiResponse::new(status_code.as_u16(), health)),
    )
}
