//! 错误类型
//!
//! 监听器、存储、消息通道共用的错误分类：
//! - `ProbeUnavailable` / `Store` 会结束当前监听
//! - `Delivery` 只记录日志，不影响状态机
//! - `UnsupportedTimeFormat` 降级为 "Total time: Unknown"

use thiserror::Error;

/// 统一错误类型
#[derive(Debug, Error)]
pub enum BeaconError {
    /// 缺失或非法的标识符
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 下载队列服务网络或解析失败
    #[error("download queue unavailable: {0}")]
    ProbeUnavailable(String),

    /// 无法识别的耗时字段编码
    #[error("unsupported time format: {0}")]
    UnsupportedTimeFormat(String),

    /// 持久化失败
    #[error("store error: {0}")]
    Store(String),

    /// 消息发送/编辑失败
    #[error("delivery error: {0}")]
    Delivery(String),

    /// 提交到下载队列失败
    #[error("submit failed: {0}")]
    Submit(String),

    /// 搜索服务失败（OMDb / newznab）
    #[error("search failed: {0}")]
    Search(String),

    /// 配置缺失或非法
    #[error("config error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for BeaconError {
    fn from(e: rusqlite::Error) -> Self {
        BeaconError::Store(e.to_string())
    }
}

pub type BeaconResult<T> = Result<T, BeaconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusqlite_error_maps_to_store() {
        let err: BeaconError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, BeaconError::Store(_)));
    }
}
