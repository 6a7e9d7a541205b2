//! 下载状态探测
//!
//! 先查询实时队列，再查询历史记录，把两种响应归一化为 [`ProbeReport`]。
//! 两处都找不到时返回合成的 `Deleted` 状态（不是错误）。

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::client::SabnzbdClient;
use super::types::{elapsed_seconds, HistoryResponse, QueueResponse};
use crate::error::{BeaconError, BeaconResult};
use crate::persistence::JobStatus;

/// 任务不在队列和历史中时的固定说明
pub const REMOVED_FROM_QUEUE: &str = "Download has been removed from queue";

/// 进度描述
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeProgress {
    /// 队列中的传输进度
    Transfer {
        downloaded_mb: f64,
        total_mb: f64,
        percent: f64,
    },
    /// 历史中的完成记录，耗时无法解析时为 None
    Completed {
        size_mb: f64,
        elapsed: Option<i64>,
        storage: String,
    },
    /// 固定文本
    Marker(String),
}

impl fmt::Display for ProbeProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer {
                downloaded_mb,
                total_mb,
                percent,
            } => write!(
                f,
                "Progress: {:.2} MB / {:.2} MB ({:.1}%)",
                downloaded_mb, total_mb, percent
            ),
            Self::Completed {
                size_mb,
                elapsed: Some(secs),
                storage,
            } => write!(
                f,
                "Progress: {:.2} MB / {:.2} MB (100%)\nTotal time: {} seconds\nStorage: {}",
                size_mb, size_mb, secs, storage
            ),
            Self::Completed { elapsed: None, .. } => f.write_str("100% (Total time: Unknown)"),
            Self::Marker(text) => f.write_str(text),
        }
    }
}

/// 一次探测的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub status: JobStatus,
    pub progress: ProbeProgress,
}

impl ProbeReport {
    pub fn deleted() -> Self {
        Self {
            status: JobStatus::Deleted,
            progress: ProbeProgress::Marker(REMOVED_FROM_QUEUE.to_string()),
        }
    }
}

/// 下载状态探测接口
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// 查询指定下载队列 ID 的当前状态
    async fn probe(&self, external_id: &str) -> BeaconResult<ProbeReport>;
}

/// 从队列响应中提取下载中/排队中的任务
pub fn report_from_queue(resp: &QueueResponse) -> Option<ProbeReport> {
    resp.queue
        .slots
        .iter()
        .find(|slot| {
            slot.status.eq_ignore_ascii_case("downloading")
                || slot.status.eq_ignore_ascii_case("queued")
        })
        .map(|slot| ProbeReport {
            status: JobStatus::parse(&slot.status),
            progress: ProbeProgress::Transfer {
                downloaded_mb: slot.mb - slot.mbleft,
                total_mb: slot.mb,
                percent: slot.percent(),
            },
        })
}

/// 从历史响应中提取指定任务
pub fn report_from_history(resp: &HistoryResponse, external_id: &str) -> Option<ProbeReport> {
    let slot = resp
        .history
        .slots
        .iter()
        .find(|slot| slot.nzo_id == external_id)?;

    let status = JobStatus::parse(&slot.status);
    if status != JobStatus::Completed {
        return Some(ProbeReport {
            status,
            progress: ProbeProgress::Marker("100%".to_string()),
        });
    }

    let elapsed = match elapsed_seconds(&slot.download_time, &slot.postproc_time) {
        Ok(secs) => Some(secs),
        Err(e) => {
            warn!("计算下载耗时失败: nzo_id={}, 错误: {}", external_id, e);
            None
        }
    };

    Some(ProbeReport {
        status,
        progress: ProbeProgress::Completed {
            size_mb: slot.bytes / 1024.0 / 1024.0,
            elapsed,
            storage: slot.storage.clone(),
        },
    })
}

#[async_trait]
impl StatusProbe for SabnzbdClient {
    async fn probe(&self, external_id: &str) -> BeaconResult<ProbeReport> {
        if external_id.trim().is_empty() {
            return Err(BeaconError::InvalidInput(
                "download queue id not provided".to_string(),
            ));
        }

        let queue = self.queue(external_id).await?;
        if let Some(report) = report_from_queue(&queue) {
            return Ok(report);
        }

        debug!("队列中未找到任务，查询历史: nzo_id={}", external_id);
        let history = self.history(external_id).await?;
        Ok(report_from_history(&history, external_id).unwrap_or_else(ProbeReport::deleted))
    }
}
