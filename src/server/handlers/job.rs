use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info};

use super::ApiResponse;
use crate::persistence::Job;
use crate::server::AppState;

/// GET /api/v1/jobs
/// 列出所有已提交但未结束的任务
pub async fn list_jobs(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Job>>>, StatusCode> {
    match state.store.list_incomplete_jobs() {
        Ok(jobs) => Ok(Json(ApiResponse::success(jobs))),
        Err(e) => {
            error!("查询未完成任务失败: {}", e);
            Ok(Json(ApiResponse::error(
                500,
                format!("Failed to list jobs: {}", e),
            )))
        }
    }
}

/// GET /api/v1/jobs/:id
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Job>>, StatusCode> {
    info!("API: 查询任务: id={}", id);

    match state.store.get_job(&id) {
        Ok(Some(job)) => Ok(Json(ApiResponse::success(job))),
        Ok(None) => Ok(Json(ApiResponse::error(404, "Job not found".to_string()))),
        Err(e) => {
            error!("查询任务失败: id={}, 错误: {}", id, e);
            Ok(Json(ApiResponse::error(
                500,
                format!("Failed to load job: {}", e),
            )))
        }
    }
}
