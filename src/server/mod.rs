// 管理接口服务器模块

pub mod handlers;
pub mod state;

pub use state::AppState;

use axum::{
    routing::{delete, get},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::ServerConfig;

/// 构建管理接口路由
pub fn build_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        // 任务API
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/:id", get(handlers::get_job))
        // 监听API
        .route("/monitors", get(handlers::list_monitors))
        .route("/monitors/:id", delete(handlers::cancel_monitor))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes).layer(middleware)
}

/// 启动管理接口，收到取消信号后优雅关闭
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("管理接口启动在: http://{}", addr);
    info!("API 基础路径: http://{}/api/v1", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    info!("管理接口已关闭");
    Ok(())
}
