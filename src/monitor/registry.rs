//! 监听注册表
//!
//! 保证同一个任务同一时刻最多只有一个监听器在运行，
//! 同时为每个监听器保存取消令牌，供管理接口停止监听。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 监听注册表
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    /// 任务 ID -> 取消令牌
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记监听器，已有监听器时返回 false
    pub fn acquire(&self, job_id: &str) -> bool {
        self.register(job_id).is_some()
    }

    fn register(&self, job_id: &str) -> Option<CancellationToken> {
        let mut active = self.active.lock();
        if active.contains_key(job_id) {
            return None;
        }
        let token = CancellationToken::new();
        active.insert(job_id.to_string(), token.clone());
        Some(token)
    }

    /// 注销监听器（可重复调用）
    pub fn release(&self, job_id: &str) {
        if self.active.lock().remove(job_id).is_some() {
            debug!("已释放监听: job_id={}", job_id);
        }
    }

    /// 登记监听器并返回守卫，守卫析构时自动注销
    pub fn try_acquire(self: &Arc<Self>, job_id: &str) -> Option<MonitorGuard> {
        let token = self.register(job_id)?;
        Some(MonitorGuard {
            registry: Arc::clone(self),
            job_id: job_id.to_string(),
            token,
        })
    }

    /// 通知监听器停止，返回是否存在该监听器
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.active.lock().get(job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.active.lock().contains_key(job_id)
    }

    /// 当前正在监听的任务 ID（已排序）
    pub fn active_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.active.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// 监听守卫
#[derive(Debug)]
pub struct MonitorGuard {
    registry: Arc<MonitorRegistry>,
    job_id: String,
    token: CancellationToken,
}

impl MonitorGuard {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        self.registry.release(&self.job_id);
    }
}
