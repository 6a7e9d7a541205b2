//! SABnzbd 下载队列集成
//!
//! - client: queue / history / addurl 接口调用
//! - probe: 状态探测与进度归一化
//! - types: 响应类型与耗时字段解码

pub mod client;
pub mod probe;
pub mod types;

pub use client::{DownloadSubmitter, SabnzbdClient};
pub use probe::{ProbeProgress, ProbeReport, StatusProbe};
pub use types::{elapsed_seconds, TimeValue};
