// 应用状态

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::monitor::MonitorRegistry;
use crate::persistence::JobStore;

/// 管理接口共享状态
#[derive(Clone)]
pub struct AppState {
    /// 任务存储
    pub store: Arc<dyn JobStore>,
    /// 活跃监听注册表
    pub registry: Arc<MonitorRegistry>,
    /// 启动时间
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<MonitorRegistry>) -> Self {
        Self {
            store,
            registry,
            started_at: Utc::now(),
        }
    }
}
