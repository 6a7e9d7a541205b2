use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{info, warn};

use super::ApiResponse;
use crate::server::AppState;

/// GET /api/v1/monitors
/// 当前正在监听的任务 ID
pub async fn list_monitors(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    Json(ApiResponse::success(state.registry.active_jobs()))
}

/// DELETE /api/v1/monitors/:id
/// 停止监听，任务状态保持不变
pub async fn cancel_monitor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    if state.registry.cancel(&id) {
        info!("API: 已停止监听: job_id={}", id);
        Ok(Json(ApiResponse::success(id)))
    } else {
        warn!("API: 停止监听失败，任务未在监听中: job_id={}", id);
        Ok(Json(ApiResponse::error(
            404,
            "Job is not being monitored".to_string(),
        )))
    }
}
