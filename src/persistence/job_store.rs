//! 任务 SQLite 存储
//!
//! - jobs: 下载任务（候选项与已提交任务）
//! - selection_contexts: 等待用户选择的搜索上下文

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::job::{Job, JobStatus, SelectionContext};
use crate::error::{BeaconError, BeaconResult};

/// 任务存储接口
///
/// 监听器与提交流程都通过它读写任务，实现必须可被多个任务并发调用
pub trait JobStore: Send + Sync {
    /// 插入或更新任务（last_updated 只增不减）
    fn upsert_job(&self, job: &Job) -> BeaconResult<()>;

    fn get_job(&self, id: &str) -> BeaconResult<Option<Job>>;

    /// 更新状态与时间戳，返回任务是否存在
    fn update_status(&self, id: &str, status: &JobStatus, now: i64) -> BeaconResult<bool>;

    fn delete_job(&self, id: &str) -> BeaconResult<bool>;

    /// 所有已提交且未进入终态的任务（用于重启恢复）
    fn list_incomplete_jobs(&self) -> BeaconResult<Vec<Job>>;

    /// 原子地认领一个候选项
    ///
    /// 同一聊天中已有候选项被认领（正在提交）时返回 None，
    /// 候选项不存在、已提交或不属于该聊天时同样返回 None
    fn claim_pick(&self, job_id: &str, chat_id: i64) -> BeaconResult<Option<Job>>;

    /// 提交失败后释放认领，候选项可以再次被选择
    fn release_pick(&self, job_id: &str) -> BeaconResult<bool>;

    /// 释放所有未完成提交的认领（启动时调用）
    fn reset_pending_picks(&self) -> BeaconResult<usize>;

    /// 删除某个聊天中未被选中的候选项
    fn delete_unselected(&self, chat_id: i64) -> BeaconResult<usize>;

    fn save_selection_context(&self, ctx: &SelectionContext) -> BeaconResult<()>;

    fn get_selection_context(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> BeaconResult<Option<SelectionContext>>;

    fn delete_selection_context(&self, chat_id: i64, message_id: i64) -> BeaconResult<bool>;
}

const JOB_COLUMNS: &str = "id, source_url, display_name, category, external_id, chat_id, \
                           message_id, status, last_updated, selected";

/// SQLite 任务存储
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// 打开（或创建）数据库文件
    pub fn new(db_path: &Path) -> BeaconResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BeaconError::Store(format!("创建数据库目录失败: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> BeaconResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> BeaconResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn lock(&self) -> BeaconResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| BeaconError::Store(format!("获取数据库锁失败: {}", e)))
    }

    fn init_tables(&self) -> BeaconResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                source_url TEXT NOT NULL,
                display_name TEXT NOT NULL,
                category TEXT NOT NULL,
                external_id TEXT,
                chat_id INTEGER NOT NULL,
                message_id INTEGER,
                status TEXT NOT NULL,
                last_updated INTEGER NOT NULL,
                selected INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_jobs_selected_status ON jobs(selected, status)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_jobs_chat ON jobs(chat_id, selected)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS selection_contexts (
                chat_id INTEGER NOT NULL,
                message_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                search TEXT NOT NULL,
                year TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (chat_id, message_id)
            )
            "#,
            [],
        )?;

        info!("任务数据库表初始化完成");
        Ok(())
    }

    fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
        let status: String = row.get(7)?;
        Ok(Job {
            id: row.get(0)?,
            source_url: row.get(1)?,
            display_name: row.get(2)?,
            category: row.get(3)?,
            external_id: row.get(4)?,
            chat_id: row.get(5)?,
            message_id: row.get(6)?,
            status: JobStatus::parse(&status),
            last_updated: row.get(8)?,
            selected: row.get::<_, i64>(9)? != 0,
        })
    }
}

impl JobStore for SqliteJobStore {
    fn upsert_job(&self, job: &Job) -> BeaconResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO jobs (
                id, source_url, display_name, category, external_id,
                chat_id, message_id, status, last_updated, selected
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                source_url = excluded.source_url,
                display_name = excluded.display_name,
                category = excluded.category,
                external_id = excluded.external_id,
                chat_id = excluded.chat_id,
                message_id = excluded.message_id,
                status = excluded.status,
                last_updated = MAX(jobs.last_updated, excluded.last_updated),
                selected = excluded.selected
            "#,
            params![
                job.id,
                job.source_url,
                job.display_name,
                job.category,
                job.external_id,
                job.chat_id,
                job.message_id,
                job.status.as_str(),
                job.last_updated,
                if job.selected { 1 } else { 0 },
            ],
        )?;

        debug!("已保存任务: id={}, status={}", job.id, job.status);
        Ok(())
    }

    fn get_job(&self, id: &str) -> BeaconResult<Option<Job>> {
        let conn = self.lock()?;

        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?;

        Ok(job)
    }

    fn update_status(&self, id: &str, status: &JobStatus, now: i64) -> BeaconResult<bool> {
        let conn = self.lock()?;

        let updated = conn.execute(
            "UPDATE jobs SET status = ?1, last_updated = MAX(last_updated, ?2) WHERE id = ?3",
            params![status.as_str(), now, id],
        )?;

        Ok(updated > 0)
    }

    fn delete_job(&self, id: &str) -> BeaconResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;

        if deleted > 0 {
            debug!("已删除任务: id={}", id);
        }
        Ok(deleted > 0)
    }

    fn list_incomplete_jobs(&self) -> BeaconResult<Vec<Job>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM jobs WHERE selected = 1 AND status NOT IN (?1, ?2, ?3) \
             ORDER BY last_updated",
            JOB_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![
                JobStatus::Pending.as_str(),
                JobStatus::Completed.as_str(),
                JobStatus::Failed.as_str()
            ],
            Self::row_to_job,
        )?;

        let mut jobs = Vec::new();
        for row in rows {
            match row {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("读取任务行失败: {}", e),
            }
        }

        Ok(jobs)
    }

    fn claim_pick(&self, job_id: &str, chat_id: i64) -> BeaconResult<Option<Job>> {
        let conn = self.lock()?;

        // 检查与更新在同一条语句内完成，并发的两次选择只有一次能成功
        let claimed = conn.execute(
            r#"
            UPDATE jobs SET selected = 1
            WHERE id = ?1 AND chat_id = ?2 AND selected = 0 AND status = ?3
              AND NOT EXISTS (
                SELECT 1 FROM jobs AS other
                WHERE other.chat_id = ?2 AND other.selected = 1 AND other.status = ?3
              )
            "#,
            params![job_id, chat_id, JobStatus::Pending.as_str()],
        )?;

        if claimed == 0 {
            return Ok(None);
        }

        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                params![job_id],
                Self::row_to_job,
            )
            .optional()?;

        debug!("已认领候选项: id={}, chat_id={}", job_id, chat_id);
        Ok(job)
    }

    fn release_pick(&self, job_id: &str) -> BeaconResult<bool> {
        let conn = self.lock()?;
        let released = conn.execute(
            "UPDATE jobs SET selected = 0 WHERE id = ?1 AND status = ?2",
            params![job_id, JobStatus::Pending.as_str()],
        )?;

        Ok(released > 0)
    }

    fn reset_pending_picks(&self) -> BeaconResult<usize> {
        let conn = self.lock()?;
        let reset = conn.execute(
            "UPDATE jobs SET selected = 0 WHERE selected = 1 AND status = ?1",
            params![JobStatus::Pending.as_str()],
        )?;

        if reset > 0 {
            info!("已释放 {} 个未完成提交的候选项", reset);
        }
        Ok(reset)
    }

    fn delete_unselected(&self, chat_id: i64) -> BeaconResult<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM jobs WHERE chat_id = ?1 AND selected = 0",
            params![chat_id],
        )?;

        if deleted > 0 {
            debug!("已清理未选中的候选项: chat_id={}, count={}", chat_id, deleted);
        }
        Ok(deleted)
    }

    fn save_selection_context(&self, ctx: &SelectionContext) -> BeaconResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO selection_contexts (
                chat_id, message_id, user_id, category, search, year, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                ctx.chat_id,
                ctx.message_id,
                ctx.user_id,
                ctx.category,
                ctx.search,
                ctx.year,
                ctx.created_at,
            ],
        )?;

        Ok(())
    }

    fn get_selection_context(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> BeaconResult<Option<SelectionContext>> {
        let conn = self.lock()?;

        let ctx = conn
            .query_row(
                r#"
                SELECT chat_id, message_id, user_id, category, search, year, created_at
                FROM selection_contexts
                WHERE chat_id = ?1 AND message_id = ?2
                "#,
                params![chat_id, message_id],
                |row| {
                    Ok(SelectionContext {
                        chat_id: row.get(0)?,
                        message_id: row.get(1)?,
                        user_id: row.get(2)?,
                        category: row.get(3)?,
                        search: row.get(4)?,
                        year: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()?;

        Ok(ctx)
    }

    fn delete_selection_context(&self, chat_id: i64, message_id: i64) -> BeaconResult<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM selection_contexts WHERE chat_id = ?1 AND message_id = ?2",
            params![chat_id, message_id],
        )?;
        Ok(deleted > 0)
    }
}
