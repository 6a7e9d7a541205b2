// API处理器模块

pub mod job;
pub mod monitor;

use axum::{extract::State, response::Json};
use chrono::Utc;
use serde::Serialize;

use crate::server::AppState;

pub use job::*;
pub use monitor::*;

/// 统一API响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub uptime_secs: i64,
    pub active_monitors: usize,
}

/// GET /api/v1/health
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "ok".to_string(),
        service: "nzb-beacon".to_string(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        active_monitors: state.registry.active_jobs().len(),
    }))
}
