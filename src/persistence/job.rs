//! 下载任务与选择上下文的数据模型

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 下载任务状态
///
/// 除已知状态外，下载队列返回的其它状态（Paused / Extracting / Verifying 等）
/// 原样保存在 `Other` 中
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// 候选项，尚未被选中
    Pending,
    /// 已提交，排队中
    Queued,
    /// 下载中
    Downloading,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 队列和历史中都找不到（仅探测结果使用，不持久化）
    Deleted,
    /// 其它下游状态
    Other(String),
}

impl JobStatus {
    /// 解析状态文本（大小写不敏感）
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "queued" => Self::Queued,
            "downloading" => Self::Downloading,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "deleted" => Self::Deleted,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Queued => "Queued",
            Self::Downloading => "Downloading",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Deleted => "Deleted",
            Self::Other(s) => s,
        }
    }

    /// 是否为终态（完成或失败）
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

/// 下载任务（持久化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// 任务唯一标识（UUID，创建后不可变）
    pub id: String,
    /// NZB 下载地址
    pub source_url: String,
    /// 展示名称，例如 "Heat (1995)"
    pub display_name: String,
    /// 下载分类（movies / tv / kids_movies / kids_tv）
    pub category: String,
    /// 下载队列分配的 ID（提交前为空）
    pub external_id: Option<String>,
    /// 聊天 ID
    pub chat_id: i64,
    /// 进度消息 ID（提交前为空）
    pub message_id: Option<i64>,
    pub status: JobStatus,
    /// 最后更新时间戳（秒）
    pub last_updated: i64,
    /// 是否已被用户选中
    pub selected: bool,
}

impl Job {
    /// 创建待选候选项
    pub fn candidate(
        source_url: impl Into<String>,
        display_name: impl Into<String>,
        category: impl Into<String>,
        chat_id: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_url: source_url.into(),
            display_name: display_name.into(),
            category: category.into(),
            external_id: None,
            chat_id,
            message_id: None,
            status: JobStatus::Pending,
            last_updated: Utc::now().timestamp(),
            selected: false,
        }
    }

    /// 标记为已选中并提交
    pub fn mark_submitted(&mut self, external_id: String, message_id: Option<i64>) {
        self.external_id = Some(external_id);
        self.message_id = message_id;
        self.status = JobStatus::Queued;
        self.selected = true;
        self.last_updated = self.last_updated.max(Utc::now().timestamp());
    }

    /// 下载队列 ID（未提交时为空字符串）
    pub fn external_id_str(&self) -> &str {
        self.external_id.as_deref().unwrap_or("")
    }
}

/// 等待用户选择的上下文（按结果消息索引）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionContext {
    pub chat_id: i64,
    /// 结果消息 ID
    pub message_id: i64,
    pub user_id: i64,
    pub category: String,
    /// 原始搜索词
    pub search: String,
    /// 原始年份（可能为空）
    pub year: String,
    pub created_at: i64,
}
