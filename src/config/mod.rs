// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 管理接口配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Telegram 机器人配置
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// SABnzbd 下载队列配置
    #[serde(default)]
    pub sabnzbd: SabnzbdConfig,
    /// 搜索服务配置
    #[serde(default)]
    pub search: SearchConfig,
    /// 下载监听配置
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// 持久化配置
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 50MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 管理接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 是否启动管理接口
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    /// 监听地址
    #[serde(default = "default_server_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_enabled() -> bool {
    true
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    18890
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Telegram 机器人配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot Token（可被环境变量 TELEGRAM_BOT_TOKEN 覆盖）
    #[serde(default)]
    pub bot_token: String,
    /// Bot API 地址
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// getUpdates 长轮询超时（秒）
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    60
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

/// SABnzbd 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SabnzbdConfig {
    /// API 地址，例如 http://localhost:8080/sabnzbd（可被 SABNZBD_API_URL 覆盖）
    #[serde(default)]
    pub api_url: String,
    /// API Key（可被 SABNZBD_API_KEY 覆盖）
    #[serde(default)]
    pub api_key: String,
    /// 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SabnzbdConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 搜索服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// OMDb API 地址
    #[serde(default = "default_omdb_base_url")]
    pub omdb_base_url: String,
    /// OMDb API Key（可被 OMDB_API_KEY 覆盖）
    #[serde(default)]
    pub omdb_api_key: String,
    /// newznab API 地址
    #[serde(default = "default_newznab_api_url")]
    pub newznab_api_url: String,
    /// newznab API Key（可被 NZBGEEK_API_KEY 覆盖）
    #[serde(default)]
    pub newznab_api_key: String,
    /// 每次展示的候选数量上限
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// 请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_omdb_base_url() -> String {
    "http://www.omdbapi.com/".to_string()
}

fn default_newznab_api_url() -> String {
    "https://api.nzbgeek.info/api".to_string()
}

fn default_max_results() -> usize {
    9
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            omdb_base_url: default_omdb_base_url(),
            omdb_api_key: String::new(),
            newznab_api_url: default_newznab_api_url(),
            newznab_api_key: String::new(),
            max_results: default_max_results(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 下载监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 轮询间隔（秒，默认 6 秒）
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// 队列中消失后的宽限期（秒，默认 150 秒）
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// 任务完成/失败并更新消息后是否删除记录
    #[serde(default = "default_purge_finished_jobs")]
    pub purge_finished_jobs: bool,
}

fn default_poll_interval_secs() -> u64 {
    6
}

fn default_grace_period_secs() -> u64 {
    150
}

fn default_purge_finished_jobs() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            grace_period_secs: default_grace_period_secs(),
            purge_finished_jobs: default_purge_finished_jobs(),
        }
    }
}

impl MonitorConfig {
    /// 轮询间隔
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// 持久化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite 数据库路径
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/nzbot.db")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                let default_config = Self::default();

                // 首次启动：写出默认配置，方便用户填写密钥
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }

                default_config
            }
        }
    }

    /// 使用环境变量覆盖敏感配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                tracing::debug!("使用环境变量覆盖配置: {}", key);
                *target = value;
            }
        };

        pick("TELEGRAM_BOT_TOKEN", &mut self.telegram.bot_token);
        pick("SABNZBD_API_URL", &mut self.sabnzbd.api_url);
        pick("SABNZBD_API_KEY", &mut self.sabnzbd.api_key);
        pick("OMDB_API_KEY", &mut self.search.omdb_api_key);
        pick("NZBGEEK_API_KEY", &mut self.search.newznab_api_key);
    }

    /// 启动前校验必需配置
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("缺少 Telegram Bot Token（telegram.bot_token 或 TELEGRAM_BOT_TOKEN）");
        }
        if self.sabnzbd.api_url.trim().is_empty() {
            anyhow::bail!("缺少 SABnzbd API 地址（sabnzbd.api_url 或 SABNZBD_API_URL）");
        }
        if self.monitor.poll_interval_secs == 0 {
            anyhow::bail!("monitor.poll_interval_secs 必须大于 0");
        }
        Ok(())
    }
}
