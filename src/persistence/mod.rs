//! 任务持久化模块
//!
//! 使用单个 SQLite 文件保存：
//! - 下载任务（候选项、已提交任务、状态与更新时间）
//! - 等待用户选择的搜索上下文
//!
//! 程序重启后由监听恢复流程读取未完成任务并重新开始轮询。

pub mod job;
pub mod job_store;

pub use job::{Job, JobStatus, SelectionContext};
pub use job_store::{JobStore, SqliteJobStore};
