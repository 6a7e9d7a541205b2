//! 启动时恢复未完成任务的监听

use tokio::task::JoinHandle;
use tracing::info;

use super::download_monitor::{DownloadMonitor, MonitorOutcome};
use crate::error::BeaconResult;

/// 为所有已提交且未结束的任务启动监听
///
/// 上次退出时正在提交的候选项会先被释放，避免该聊天无法再选择。
/// 返回每个监听任务的句柄，调用方通常直接丢弃
pub fn resume_monitoring(monitor: &DownloadMonitor) -> BeaconResult<Vec<JoinHandle<MonitorOutcome>>> {
    info!("恢复下载监听...");

    monitor.store().reset_pending_picks()?;
    let jobs = monitor.store().list_incomplete_jobs()?;
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            info!(
                "恢复监听: job_id={}, name={}, status={}",
                job.id, job.display_name, job.status
            );
            monitor.spawn(job.id)
        })
        .collect();

    info!("已恢复 {} 个下载监听", handles.len());
    Ok(handles)
}
