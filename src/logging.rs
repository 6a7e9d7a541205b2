//! 日志系统配置
//!
//! 控制台输出 + 按大小滚动的日志文件。文件名带启动时间，
//! 每次启动和每次滚动时按 `retention_days` 清理过期文件。

use crate::config::LogConfig;
use chrono::{Local, NaiveDateTime};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const FILE_PREFIX: &str = "nzb-beacon.";
const FILE_EXT: &str = ".log";
const STAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 滚动日志文件
///
/// 由 tracing-appender 的后台线程独占写入，不需要额外加锁
struct RollingLog {
    dir: PathBuf,
    started: NaiveDateTime,
    /// 滚动序号，0 为本次启动的第一个文件
    part: u32,
    file: File,
    written: u64,
    max_file_size: u64,
    retention_days: u32,
}

impl RollingLog {
    fn open(config: &LogConfig) -> io::Result<Self> {
        fs::create_dir_all(&config.log_dir)?;
        let started = Local::now().naive_local();
        let file = Self::open_part(&config.log_dir, started, 0)?;

        Ok(Self {
            dir: config.log_dir.clone(),
            started,
            part: 0,
            file,
            written: 0,
            max_file_size: config.max_file_size,
            retention_days: config.retention_days,
        })
    }

    fn open_part(dir: &Path, started: NaiveDateTime, part: u32) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(log_file_name(started, part)))
    }

    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.part += 1;
        self.file = Self::open_part(&self.dir, self.started, self.part)?;
        self.written = 0;
        remove_expired_logs(&self.dir, self.retention_days, Local::now().naive_local());
        Ok(())
    }
}

impl Write for RollingLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 单条超过上限的日志直接写入当前空文件
        if self.written > 0 && self.written + buf.len() as u64 > self.max_file_size {
            self.roll()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// nzb-beacon.2026-01-02-101500.log / nzb-beacon.2026-01-02-101500_3.log
fn log_file_name(started: NaiveDateTime, part: u32) -> String {
    let stamp = started.format(STAMP_FORMAT);
    if part == 0 {
        format!("{FILE_PREFIX}{stamp}{FILE_EXT}")
    } else {
        format!("{FILE_PREFIX}{stamp}_{part}{FILE_EXT}")
    }
}

/// 从文件名解析启动时间，非本程序的日志文件返回 None
fn parse_log_file_name(name: &str) -> Option<NaiveDateTime> {
    let stamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_EXT)?;
    let stamp = stamp.split('_').next()?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()
}

/// 删除启动时间早于保留期的日志文件，返回删除数量
fn remove_expired_logs(dir: &Path, retention_days: u32, now: NaiveDateTime) -> usize {
    let cutoff = now - chrono::Duration::days(retention_days as i64);
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(parse_log_file_name)
                .is_some_and(|started| started < cutoff)
        })
        .filter(|entry| fs::remove_file(entry.path()).is_ok())
        .count()
}

/// 日志系统守卫
/// 必须保持存活，否则日志写入线程会终止
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 初始化日志系统，`RUST_LOG` 优先于配置中的级别
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let console_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));

    let rolling = if config.enabled {
        match RollingLog::open(config) {
            Ok(rolling) => Some(rolling),
            Err(e) => {
                eprintln!("创建日志文件失败: {:?}, 错误: {}，仅输出到控制台", config.log_dir, e);
                None
            }
        }
    } else {
        None
    };

    let Some(rolling) = rolling else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        info!("日志系统初始化完成（仅控制台输出）");
        return LogGuard { _file_guard: None };
    };

    let (writer, file_guard) = tracing_appender::non_blocking(rolling);
    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    let removed = remove_expired_logs(
        &config.log_dir,
        config.retention_days,
        Local::now().naive_local(),
    );
    info!(
        "日志系统初始化完成: 目录={:?}, 级别={}, 单文件上限={}MB, 保留{}天, 清理{}个过期文件",
        config.log_dir,
        config.level,
        config.max_file_size / 1024 / 1024,
        config.retention_days,
        removed
    );

    LogGuard {
        _file_guard: Some(file_guard),
    }
}
