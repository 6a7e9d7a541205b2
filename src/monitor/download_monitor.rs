//! 下载进度监听
//!
//! 每个已提交的任务对应一个 tokio 任务，循环执行：
//! 读取任务 -> 探测下载状态 -> 写回状态 -> 编辑进度消息 -> 休眠。
//!
//! ## 结束条件
//! - 下载完成或失败（终态）
//! - 探测失败：标记为 Failed 后退出，不重试
//! - 队列和历史中都找不到，且超过宽限期：通知用户并删除任务
//! - 管理接口取消：保留当前状态，下次启动时重新监听

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::registry::MonitorRegistry;
use crate::config::MonitorConfig;
use crate::messaging::Messenger;
use crate::persistence::{Job, JobStatus, JobStore};
use crate::sabnzbd::{ProbeReport, StatusProbe};

/// 监听参数
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 任务消失后的宽限期（秒）
    pub grace_period_secs: i64,
    /// 终态任务是否从存储中删除
    pub purge_finished_jobs: bool,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            grace_period_secs: config.grace_period_secs as i64,
            purge_finished_jobs: config.purge_finished_jobs,
        }
    }
}

impl MonitorSettings {
    #[cfg(test)]
    pub fn fast_for_testing() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            grace_period_secs: 150,
            purge_finished_jobs: false,
        }
    }
}

/// 一次监听的结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// 已有监听器在运行
    Duplicate,
    /// 任务记录不存在
    JobMissing,
    /// 读写存储失败
    StoreFailed,
    /// 探测失败，任务已标记为 Failed
    ProbeFailed,
    /// 任务从下载队列中消失且超过宽限期
    Vanished,
    Completed,
    Failed,
    /// 被管理接口停止
    Cancelled,
}

/// 下载进度监听器
#[derive(Clone)]
pub struct DownloadMonitor {
    store: Arc<dyn JobStore>,
    probe: Arc<dyn StatusProbe>,
    messenger: Messenger,
    registry: Arc<MonitorRegistry>,
    settings: MonitorSettings,
}

impl DownloadMonitor {
    pub fn new(
        store: Arc<dyn JobStore>,
        probe: Arc<dyn StatusProbe>,
        messenger: Messenger,
        registry: Arc<MonitorRegistry>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            probe,
            messenger,
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<MonitorRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// 在后台启动监听
    pub fn spawn(&self, job_id: String) -> JoinHandle<MonitorOutcome> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.run(&job_id).await })
    }

    /// 监听指定任务直到结束
    pub async fn run(&self, job_id: &str) -> MonitorOutcome {
        let Some(guard) = self.registry.try_acquire(job_id) else {
            debug!("任务已在监听中，跳过: job_id={}", job_id);
            return MonitorOutcome::Duplicate;
        };
        let token = guard.token().clone();

        info!("开始监听下载进度: job_id={}", job_id);
        let outcome = loop {
            if token.is_cancelled() {
                break MonitorOutcome::Cancelled;
            }

            let job = match self.store.get_job(job_id) {
                Ok(Some(job)) => job,
                Ok(None) => {
                    warn!("任务不存在，停止监听: job_id={}", job_id);
                    break MonitorOutcome::JobMissing;
                }
                Err(e) => {
                    error!("读取任务失败，停止监听: job_id={}, 错误: {}", job_id, e);
                    break MonitorOutcome::StoreFailed;
                }
            };

            let probed = tokio::select! {
                result = self.probe.probe(job.external_id_str()) => result,
                _ = token.cancelled() => break MonitorOutcome::Cancelled,
            };

            let report = match probed {
                Ok(report) => report,
                Err(e) => {
                    error!("探测下载状态失败: job_id={}, 错误: {}", job_id, e);
                    let text = format!("Error monitoring '{}': {}", job.display_name, e);
                    self.finish(&job, &JobStatus::Failed, &text).await;
                    break MonitorOutcome::ProbeFailed;
                }
            };

            if let Some(outcome) = self
                .apply_report(&job, report, Utc::now().timestamp())
                .await
            {
                break outcome;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = token.cancelled() => break MonitorOutcome::Cancelled,
            }
        };

        info!("监听结束: job_id={}, 结果={:?}", job_id, outcome);
        outcome
    }

    /// 处理一次探测结果，返回 Some 表示监听应结束
    async fn apply_report(
        &self,
        job: &Job,
        report: ProbeReport,
        now: i64,
    ) -> Option<MonitorOutcome> {
        if report.status == JobStatus::Deleted {
            let elapsed = now - job.last_updated;
            if elapsed <= self.settings.grace_period_secs {
                debug!(
                    "任务暂时不在队列中，继续等待: job_id={}, 已过去 {} 秒",
                    job.id, elapsed
                );
                return None;
            }

            info!("任务已从下载队列移除: job_id={}, name={}", job.id, job.display_name);
            let text = format!("{} download has been removed from queue.", job.display_name);
            self.notify(job, &text).await;
            self.forget_message(job);
            if let Err(e) = self.store.delete_job(&job.id) {
                error!("删除任务失败: job_id={}, 错误: {}", job.id, e);
            }
            return Some(MonitorOutcome::Vanished);
        }

        match self.store.update_status(&job.id, &report.status, now) {
            Ok(true) => {}
            Ok(false) => {
                warn!("更新状态时任务已不存在: job_id={}", job.id);
                return Some(MonitorOutcome::JobMissing);
            }
            Err(e) => {
                error!("更新任务状态失败: job_id={}, 错误: {}", job.id, e);
                return Some(MonitorOutcome::StoreFailed);
            }
        }

        let text = format!(
            "NZB: {}\nStatus: {}\n{}",
            job.display_name, report.status, report.progress
        );
        self.notify(job, &text).await;

        match report.status {
            JobStatus::Completed => {
                self.retire(job);
                Some(MonitorOutcome::Completed)
            }
            JobStatus::Failed => {
                self.retire(job);
                Some(MonitorOutcome::Failed)
            }
            _ => None,
        }
    }

    /// 写入终态并发送最终消息
    async fn finish(&self, job: &Job, status: &JobStatus, text: &str) {
        if let Err(e) = self
            .store
            .update_status(&job.id, status, Utc::now().timestamp())
        {
            error!("更新任务状态失败: job_id={}, 错误: {}", job.id, e);
        }
        self.notify(job, text).await;
        self.retire(job);
    }

    /// 终态任务：释放消息缓存，按配置删除记录
    fn retire(&self, job: &Job) {
        self.forget_message(job);
        if !self.settings.purge_finished_jobs {
            return;
        }
        if let Err(e) = self.store.delete_job(&job.id) {
            error!("删除已结束任务失败: job_id={}, 错误: {}", job.id, e);
        }
    }

    fn forget_message(&self, job: &Job) {
        if let Some(message_id) = job.message_id {
            self.messenger.forget(job.chat_id, message_id);
        }
    }

    /// 编辑进度消息，失败只记录日志
    async fn notify(&self, job: &Job, text: &str) {
        let Some(message_id) = job.message_id else {
            debug!("任务没有进度消息，跳过编辑: job_id={}", job.id);
            return;
        };

        if let Err(e) = self
            .messenger
            .edit_if_changed(job.chat_id, message_id, text)
            .await
        {
            warn!("编辑进度消息失败: job_id={}, 错误: {}", job.id, e);
        }
    }
}
