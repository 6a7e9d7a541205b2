//! 下载生命周期监听
//!
//! - registry: 每个任务最多一个监听器，并持有取消令牌
//! - download_monitor: 轮询状态机
//! - recovery: 启动时恢复未完成任务

pub mod download_monitor;
pub mod recovery;
pub mod registry;

pub use download_monitor::{DownloadMonitor, MonitorOutcome, MonitorSettings};
pub use recovery::resume_monitoring;
pub use registry::{MonitorGuard, MonitorRegistry};
