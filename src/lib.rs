// NZB Beacon Rust Library
// Telegram 搜索下载机器人核心库

// 配置管理模块
pub mod config;

// 错误类型
pub mod error;

// 日志模块
pub mod logging;

// 任务持久化模块
pub mod persistence;

// SABnzbd 下载队列模块
pub mod sabnzbd;

// 下载监听模块
pub mod monitor;

// 聊天消息模块
pub mod messaging;

// OMDb / newznab 搜索模块
pub mod search;

// 机器人命令与回调模块
pub mod bot;

// 管理接口模块
pub mod server;

#[cfg(test)]
mod test_support;

// 导出常用类型
pub use config::AppConfig;
pub use error::{BeaconError, BeaconResult};
pub use monitor::{resume_monitoring, DownloadMonitor, MonitorOutcome, MonitorRegistry};
pub use persistence::{Job, JobStatus, JobStore, SqliteJobStore};
pub use sabnzbd::{SabnzbdClient, StatusProbe};
pub use server::AppState;
