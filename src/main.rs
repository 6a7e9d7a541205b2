use std::sync::Arc;

use anyhow::Context;
use nzb_beacon_rust::{
    bot::{self, BotHandler},
    config::DEFAULT_CONFIG_PATH,
    logging,
    messaging::{Messenger, TelegramClient},
    monitor::MonitorSettings,
    resume_monitoring,
    search::{NewznabClient, OmdbClient},
    server, AppConfig, AppState, DownloadMonitor, MonitorRegistry, SabnzbdClient, SqliteJobStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;
    config.apply_env_overrides();

    // 🔥 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&config.log);

    info!("NZB Beacon v{} 启动中...", env!("CARGO_PKG_VERSION"));
    config.validate().context("配置校验失败")?;

    let store = Arc::new(
        SqliteJobStore::new(&config.persistence.db_path)
            .with_context(|| format!("打开数据库失败: {:?}", config.persistence.db_path))?,
    );
    let sabnzbd = Arc::new(SabnzbdClient::new(&config.sabnzbd).context("创建 SABnzbd 客户端失败")?);
    let telegram = TelegramClient::new(&config.telegram).context("创建 Telegram 客户端失败")?;
    let omdb = OmdbClient::new(&config.search).context("创建 OMDb 客户端失败")?;
    let newznab = NewznabClient::new(&config.search).context("创建 newznab 客户端失败")?;

    let messenger = Messenger::new(Arc::new(telegram.clone()));
    let registry = Arc::new(MonitorRegistry::new());
    let monitor = DownloadMonitor::new(
        store.clone(),
        sabnzbd.clone(),
        messenger.clone(),
        registry.clone(),
        MonitorSettings::from(&config.monitor),
    );
    info!("应用状态初始化完成");

    // 恢复上次退出前未完成的监听，不阻塞启动
    match resume_monitoring(&monitor) {
        Ok(handles) => drop(handles),
        Err(e) => error!("恢复下载监听失败: {}", e),
    }

    let cancel = CancellationToken::new();
    let handler = Arc::new(BotHandler::new(
        store.clone(),
        messenger,
        monitor,
        sabnzbd,
        omdb,
        newznab,
    ));
    let polling = tokio::spawn(bot::run_polling(telegram, handler, cancel.clone()));

    let admin = if config.server.enabled {
        let state = AppState::new(store, registry.clone());
        let server_config = config.server.clone();
        let token = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server::serve(&server_config, state, token).await {
                error!("管理接口错误: {}", e);
            }
        }))
    } else {
        info!("管理接口已禁用");
        None
    };

    tokio::signal::ctrl_c().await.context("监听 Ctrl+C 失败")?;
    info!("收到 Ctrl+C，开始优雅关闭...");
    cancel.cancel();

    // 监听器停止后任务状态保持不变，下次启动时恢复
    for job_id in registry.active_jobs() {
        registry.cancel(&job_id);
    }

    let (polling, admin) = futures::join!(polling, async {
        match admin {
            Some(handle) => handle.await,
            None => Ok(()),
        }
    });
    if let Err(e) = polling {
        warn!("更新拉取任务异常退出: {}", e);
    }
    if let Err(e) = admin {
        warn!("管理接口任务异常退出: {}", e);
    }

    info!("应用已安全退出");
    Ok(())
}
